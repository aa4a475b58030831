use axum::Json;

use super::context::{SessionState, SessionSummary};
use crate::features::auth::Viewer;
use crate::shared::types::ApiResponse;

/// Current session, role and capabilities
///
/// Public: anonymous callers get the client role.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Session of the caller", body = ApiResponse<SessionSummary>)
    ),
    security(
        (),
        ("bearer_auth" = [])
    ),
    tag = "session"
)]
pub async fn get_session(viewer: Viewer) -> Json<ApiResponse<SessionSummary>> {
    let state = SessionState {
        session: viewer.session,
        role: viewer.role,
    };
    Json(ApiResponse::success(Some(state.summary()), None, None))
}

#[cfg(test)]
mod tests {
    use crate::features::session::routes::routes;
    use crate::features::auth::Viewer;
    use crate::features::session::Role;
    use crate::shared::test_helpers::{admin_viewer, with_viewer};
    use axum_test::TestServer;
    use serde_json::Value;

    #[tokio::test]
    async fn test_anonymous_session_summary() {
        let server = TestServer::new(with_viewer(routes(), Viewer::anonymous())).unwrap();

        let response = server.get("/api/session").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["authenticated"], false);
        assert_eq!(body["data"]["role"], "client");
        assert_eq!(body["data"]["capabilities"]["mutateCatalog"], false);
    }

    #[tokio::test]
    async fn test_admin_session_summary() {
        let server = TestServer::new(with_viewer(routes(), admin_viewer("admin-1"))).unwrap();

        let body: Value = server.get("/api/session").await.json();
        assert_eq!(body["data"]["subject"], "admin-1");
        assert_eq!(body["data"]["role"], Role::Admin.as_str());
        assert_eq!(body["data"]["capabilities"]["validateAccounts"], true);
        assert_eq!(body["data"]["capabilities"]["editRoles"], false);
    }
}
