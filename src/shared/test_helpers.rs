#[cfg(test)]
use std::collections::HashMap;

#[cfg(test)]
use async_trait::async_trait;
#[cfg(test)]
use axum::{extract::Request, middleware::Next, response::Response, Router};
#[cfg(test)]
use chrono::{Duration, Utc};

#[cfg(test)]
use crate::core::error::AppError;
#[cfg(test)]
use crate::features::auth::{Session, TokenVerifier, Viewer};
#[cfg(test)]
use crate::features::session::Role;

#[cfg(test)]
pub fn test_session(subject: &str) -> Session {
    Session {
        subject: subject.to_string(),
        session_id: Some(format!("{}-session", subject)),
        expires_at: Utc::now() + Duration::hours(1),
    }
}

#[cfg(test)]
pub fn viewer_with_role(subject: &str, role: Role) -> Viewer {
    Viewer {
        session: Some(test_session(subject)),
        role,
    }
}

#[cfg(test)]
pub fn client_viewer(subject: &str) -> Viewer {
    viewer_with_role(subject, Role::Client)
}

#[cfg(test)]
pub fn admin_viewer(subject: &str) -> Viewer {
    viewer_with_role(subject, Role::Admin)
}

#[cfg(test)]
pub fn developer_viewer(subject: &str) -> Viewer {
    viewer_with_role(subject, Role::Developer)
}

/// Stand in for the session middleware: every request is made by `viewer`
#[cfg(test)]
pub fn with_viewer(router: Router, viewer: Viewer) -> Router {
    router.layer(axum::middleware::from_fn(
        move |mut request: Request, next: Next| {
            let viewer = viewer.clone();
            async move {
                request.extensions_mut().insert(viewer);
                next.run(request).await
            }
        },
    ))
}

/// Accepts a fixed set of opaque tokens, one per subject
#[cfg(test)]
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Session>,
}

#[cfg(test)]
impl StaticTokenVerifier {
    pub fn with_token(mut self, token: &str, subject: &str) -> Self {
        self.tokens
            .insert(token.to_string(), test_session(subject));
        self
    }

    pub fn with_session(mut self, token: &str, session: Session) -> Self {
        self.tokens.insert(token.to_string(), session);
        self
    }
}

#[cfg(test)]
#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Session, AppError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::Auth("Unknown token".to_string()))
    }
}
