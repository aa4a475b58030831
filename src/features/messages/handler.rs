use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::dto::{CreateMessageDto, MessageFilter, MessageResponseDto};
use super::service::MessageService;
use crate::core::error::Result;
use crate::core::extractor::AppJson;
use crate::features::auth::guards::RequireMessageProcessor;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// Submit a contact message (public)
#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = CreateMessageDto,
    responses(
        (status = 201, description = "Message received", body = ApiResponse<MessageResponseDto>),
        (status = 400, description = "Validation error")
    ),
    tag = "messages"
)]
pub async fn create_message(
    State(service): State<Arc<MessageService>>,
    AppJson(dto): AppJson<CreateMessageDto>,
) -> Result<(StatusCode, Json<ApiResponse<MessageResponseDto>>)> {
    let message = service.create(dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(message.into()),
            Some("Message received".to_string()),
            None,
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/messages",
    params(MessageFilter, PaginationQuery),
    responses(
        (status = 200, description = "Messages, newest first", body = ApiResponse<Vec<MessageResponseDto>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    tag = "messages",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_messages(
    RequireMessageProcessor(_viewer): RequireMessageProcessor,
    State(service): State<Arc<MessageService>>,
    Query(filter): Query<MessageFilter>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<MessageResponseDto>>>> {
    let (messages, total) = service.list(&filter, &pagination).await?;
    Ok(Json(ApiResponse::success(
        Some(messages.into_iter().map(Into::into).collect()),
        None,
        Some(Meta::paged(total, &pagination)),
    )))
}

#[utoipa::path(
    post,
    path = "/api/admin/messages/{id}/process",
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Message processed", body = ApiResponse<MessageResponseDto>),
        (status = 404, description = "Message not found"),
        (status = 409, description = "Message already processed")
    ),
    tag = "messages",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn process_message(
    RequireMessageProcessor(_viewer): RequireMessageProcessor,
    State(service): State<Arc<MessageService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MessageResponseDto>>> {
    let message = service.mark_processed(id).await?;
    Ok(Json(ApiResponse::success(Some(message.into()), None, None)))
}
