use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::features::session::Role;

/// Verified sign-in of a subject at the identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Session {
    /// Authentication subject; also the id of the subject's profile
    pub subject: String,
    /// Session UID (only present for interactive OIDC flows)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Who is making a request: an optional session plus the role resolved for it.
///
/// Anonymous viewers are always [`Role::Client`].
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    pub session: Option<Session>,
    pub role: Role,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self {
            session: None,
            role: Role::Client,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.subject.as_str())
    }
}

impl Default for Viewer {
    fn default() -> Self {
        Self::anonymous()
    }
}
