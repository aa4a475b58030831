use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::core::error::Result;
use crate::core::extractor::AppJson;
use crate::features::accounts::dtos::{
    AccountFilter, AccountResponseDto, ChangeRoleDto, RegisterAccountDto,
};
use crate::features::accounts::services::AccountService;
use crate::features::auth::guards::{RequireAccountValidator, RequireRoleEditor, RequireSession};
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// Register the caller's business account
///
/// The account starts as a pending client until a validator approves it.
#[utoipa::path(
    post,
    path = "/api/accounts/register",
    request_body = RegisterAccountDto,
    responses(
        (status = 201, description = "Account registered, pending validation", body = ApiResponse<AccountResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Account already registered")
    ),
    tag = "accounts",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn register(
    RequireSession(session, _): RequireSession,
    State(service): State<Arc<AccountService>>,
    AppJson(dto): AppJson<RegisterAccountDto>,
) -> Result<(StatusCode, Json<ApiResponse<AccountResponseDto>>)> {
    let profile = service.register(&session, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(profile.into()),
            Some("Account registered, awaiting validation".to_string()),
            None,
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/api/accounts/me",
    responses(
        (status = 200, description = "Caller's account", body = ApiResponse<AccountResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No account registered")
    ),
    tag = "accounts",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    RequireSession(session, _): RequireSession,
    State(service): State<Arc<AccountService>>,
) -> Result<Json<ApiResponse<AccountResponseDto>>> {
    let profile = service.get_me(&session).await?;
    Ok(Json(ApiResponse::success(Some(profile.into()), None, None)))
}

/// List accounts, newest first
#[utoipa::path(
    get,
    path = "/api/admin/accounts",
    params(AccountFilter, PaginationQuery),
    responses(
        (status = 200, description = "Accounts", body = ApiResponse<Vec<AccountResponseDto>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "accounts",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_accounts(
    RequireAccountValidator(viewer): RequireAccountValidator,
    State(service): State<Arc<AccountService>>,
    Query(filter): Query<AccountFilter>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<AccountResponseDto>>>> {
    let (profiles, total) = service.list_profiles(&viewer, &filter, &pagination).await?;
    Ok(Json(ApiResponse::success(
        Some(profiles.into_iter().map(Into::into).collect()),
        None,
        Some(Meta::paged(total, &pagination)),
    )))
}

/// Validate an account and notify Iabako
///
/// A failing webhook does not prevent the validation.
#[utoipa::path(
    post,
    path = "/api/admin/accounts/{id}/validate",
    params(("id" = String, Path, description = "Account ID (authentication subject)")),
    responses(
        (status = 200, description = "Account verified", body = ApiResponse<AccountResponseDto>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Account not found"),
        (status = 503, description = "Backend unavailable, account remains pending")
    ),
    tag = "accounts",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn validate_account(
    RequireAccountValidator(viewer): RequireAccountValidator,
    State(service): State<Arc<AccountService>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AccountResponseDto>>> {
    let profile = service.validate(&viewer, &id).await?;
    Ok(Json(ApiResponse::success(
        Some(profile.into()),
        Some("Account validated".to_string()),
        None,
    )))
}

/// Revoke an account's verification (reversible policy only)
#[utoipa::path(
    post,
    path = "/api/admin/accounts/{id}/block",
    params(("id" = String, Path, description = "Account ID (authentication subject)")),
    responses(
        (status = 200, description = "Account blocked", body = ApiResponse<AccountResponseDto>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Verification is one-way")
    ),
    tag = "accounts",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn block_account(
    RequireAccountValidator(viewer): RequireAccountValidator,
    State(service): State<Arc<AccountService>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AccountResponseDto>>> {
    let profile = service.block(&viewer, &id).await?;
    Ok(Json(ApiResponse::success(
        Some(profile.into()),
        Some("Account blocked".to_string()),
        None,
    )))
}

#[utoipa::path(
    patch,
    path = "/api/admin/accounts/{id}/role",
    params(("id" = String, Path, description = "Account ID (authentication subject)")),
    request_body = ChangeRoleDto,
    responses(
        (status = 200, description = "Role changed", body = ApiResponse<AccountResponseDto>),
        (status = 403, description = "Developer access required"),
        (status = 404, description = "Account not found")
    ),
    tag = "accounts",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_role(
    RequireRoleEditor(viewer): RequireRoleEditor,
    State(service): State<Arc<AccountService>>,
    Path(id): Path<String>,
    AppJson(dto): AppJson<ChangeRoleDto>,
) -> Result<Json<ApiResponse<AccountResponseDto>>> {
    let profile = service.change_role(&viewer, &id, dto.role).await?;
    Ok(Json(ApiResponse::success(Some(profile.into()), None, None)))
}
