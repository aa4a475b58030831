//! Capability guards for handlers.
//!
//! Each guard reads the [`Viewer`] that the session middleware stored in the
//! request extensions and checks one capability from
//! [`crate::features::session`]. A missing session is rejected with 401, a
//! session whose role lacks the capability with 403.
//!
//! | Guard | Capability |
//! |---|---|
//! | `RequireSession` | any signed-in subject |
//! | `RequireCatalogEditor` | `can_mutate_catalog` |
//! | `RequireAccountValidator` | `can_validate_accounts` |
//! | `RequireMessageProcessor` | `can_process_messages` |
//! | `RequireRoleEditor` | `can_edit_roles` |

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::core::error::AppError;
use crate::features::auth::model::{Session, Viewer};
use crate::features::session::{
    can_edit_roles, can_mutate_catalog, can_process_messages, can_validate_accounts, Role,
};

fn signed_in(parts: &Parts) -> Result<(Viewer, Session), AppError> {
    let viewer = parts.extensions.get::<Viewer>().cloned().unwrap_or_default();
    match viewer.session.clone() {
        Some(session) => Ok((viewer, session)),
        None => Err(AppError::Unauthorized(
            "User not authenticated".to_string(),
        )),
    }
}

fn require(parts: &Parts, allowed: fn(Role) -> bool, denied: &str) -> Result<Viewer, AppError> {
    let (viewer, _) = signed_in(parts)?;
    if !allowed(viewer.role) {
        return Err(AppError::Forbidden(denied.to_string()));
    }
    Ok(viewer)
}

/// Any signed-in subject, whatever its role.
///
/// # Example
/// ```ignore
/// pub async fn handler(RequireSession(session, role): RequireSession) { ... }
/// ```
pub struct RequireSession(pub Session, pub Role);

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let (viewer, session) = signed_in(parts)?;
        Ok(RequireSession(session, viewer.role))
    }
}

/// Catalog create/update/delete (admin, developer)
pub struct RequireCatalogEditor(pub Viewer);

impl<S> FromRequestParts<S> for RequireCatalogEditor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(parts, can_mutate_catalog, "Catalog editor access required").map(Self)
    }
}

/// Account listing, validation and blocking (admin, developer)
pub struct RequireAccountValidator(pub Viewer);

impl<S> FromRequestParts<S> for RequireAccountValidator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(
            parts,
            can_validate_accounts,
            "Account validation access required",
        )
        .map(Self)
    }
}

/// Contact message triage (admin, developer)
pub struct RequireMessageProcessor(pub Viewer);

impl<S> FromRequestParts<S> for RequireMessageProcessor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(parts, can_process_messages, "Message processing access required").map(Self)
    }
}

/// Role assignment (developer only)
pub struct RequireRoleEditor(pub Viewer);

impl<S> FromRequestParts<S> for RequireRoleEditor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(parts, can_edit_roles, "Developer access required").map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::{admin_viewer, client_viewer, developer_viewer};
    use axum::http::Request;

    fn parts_with(viewer: Option<Viewer>) -> Parts {
        let mut request = Request::builder().uri("/").body(()).unwrap();
        if let Some(viewer) = viewer {
            request.extensions_mut().insert(viewer);
        }
        request.into_parts().0
    }

    #[tokio::test]
    async fn test_anonymous_is_unauthorized() {
        let mut parts = parts_with(None);
        let result = RequireCatalogEditor::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let mut parts = parts_with(Some(Viewer::anonymous()));
        let result = RequireSession::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_client_is_forbidden_from_catalog_edits() {
        let mut parts = parts_with(Some(client_viewer("client-1")));
        let result = RequireCatalogEditor::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let mut parts = parts_with(Some(client_viewer("client-1")));
        let result = RequireSession::from_request_parts(&mut parts, &()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_only_developer_edits_roles() {
        let mut parts = parts_with(Some(admin_viewer("admin-1")));
        let result = RequireRoleEditor::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let mut parts = parts_with(Some(developer_viewer("dev-1")));
        let result = RequireRoleEditor::from_request_parts(&mut parts, &()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_admin_validates_accounts_and_processes_messages() {
        let mut parts = parts_with(Some(admin_viewer("admin-1")));
        assert!(RequireAccountValidator::from_request_parts(&mut parts, &())
            .await
            .is_ok());
        assert!(RequireMessageProcessor::from_request_parts(&mut parts, &())
            .await
            .is_ok());
    }
}
