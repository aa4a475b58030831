//! Role resolution and capability checks.
//!
//! Every privilege decision in the service goes through one of the `can_*`
//! functions below; handlers never compare roles themselves.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::features::auth::Session;
use crate::modules::backend::{Collection, DataBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Client,
    Admin,
    Developer,
}

impl Role {
    /// Lenient parse of a stored role: anything unrecognized is a client
    pub fn from_stored(value: &str) -> Role {
        value.parse().unwrap_or(Role::Client)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Admin => "admin",
            Role::Developer => "developer",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    /// Exact, case-sensitive match
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "admin" => Ok(Role::Admin),
            "developer" => Ok(Role::Developer),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn can_mutate_catalog(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Developer)
}

pub fn can_validate_accounts(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Developer)
}

pub fn can_process_messages(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Developer)
}

pub fn can_edit_roles(role: Role) -> bool {
    role == Role::Developer
}

/// Capability set of a role, as exposed to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub mutate_catalog: bool,
    pub validate_accounts: bool,
    pub process_messages: bool,
    pub edit_roles: bool,
}

impl From<Role> for Capabilities {
    fn from(role: Role) -> Self {
        Self {
            mutate_catalog: can_mutate_catalog(role),
            validate_accounts: can_validate_accounts(role),
            process_messages: can_process_messages(role),
            edit_roles: can_edit_roles(role),
        }
    }
}

/// Resolves the role of a session from the subject's profile record
pub struct RoleGate {
    backend: Arc<dyn DataBackend>,
}

impl RoleGate {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }

    /// Fails closed: no session, no profile or a failed lookup all yield `Client`
    pub async fn resolve(&self, session: Option<&Session>) -> Role {
        let Some(session) = session else {
            return Role::Client;
        };

        match self.backend.get(Collection::Profiles, &session.subject).await {
            Ok(Some(profile)) => profile
                .get("role")
                .and_then(Value::as_str)
                .map(Role::from_stored)
                .unwrap_or_default(),
            Ok(None) => {
                debug!("No profile for subject {}, treating as client", session.subject);
                Role::Client
            }
            Err(e) => {
                warn!(
                    "Role lookup failed for subject {}, treating as client: {}",
                    session.subject, e
                );
                Role::Client
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::backend::{InMemoryBackend, Record};
    use crate::shared::test_helpers::test_session;
    use serde_json::json;

    async fn backend_with_profile(id: &str, role: &str) -> Arc<InMemoryBackend> {
        let backend = Arc::new(InMemoryBackend::new(Vec::new()));
        let mut record = Record::new();
        record.insert("id".into(), json!(id));
        record.insert("role".into(), json!(role));
        record.insert("created_at".into(), json!("2025-03-01T10:00:00Z"));
        backend.insert(Collection::Profiles, record).await.unwrap();
        backend
    }

    #[test]
    fn test_role_parse_is_exact() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("Admin".parse::<Role>().is_err());
        assert!(" admin".parse::<Role>().is_err());
        assert_eq!(Role::from_stored("superuser"), Role::Client);
        assert_eq!(Role::from_stored("developer"), Role::Developer);
    }

    #[test]
    fn test_capabilities() {
        assert_eq!(
            Capabilities::from(Role::Client),
            Capabilities {
                mutate_catalog: false,
                validate_accounts: false,
                process_messages: false,
                edit_roles: false,
            }
        );
        let admin = Capabilities::from(Role::Admin);
        assert!(admin.mutate_catalog && admin.validate_accounts && admin.process_messages);
        assert!(!admin.edit_roles);
        assert!(Capabilities::from(Role::Developer).edit_roles);
    }

    #[tokio::test]
    async fn test_anonymous_is_always_client() {
        let backend = backend_with_profile("admin-1", "admin").await;
        let gate = RoleGate::new(backend);
        assert_eq!(gate.resolve(None).await, Role::Client);
    }

    #[tokio::test]
    async fn test_resolves_profile_role() {
        let backend = backend_with_profile("admin-1", "admin").await;
        let gate = RoleGate::new(backend);
        assert_eq!(
            gate.resolve(Some(&test_session("admin-1"))).await,
            Role::Admin
        );
        assert_eq!(
            gate.resolve(Some(&test_session("nobody"))).await,
            Role::Client
        );
    }

    #[tokio::test]
    async fn test_failed_lookup_is_client() {
        let backend = backend_with_profile("dev-1", "developer").await;
        backend.fail_collection(Collection::Profiles);
        let gate = RoleGate::new(backend);
        assert_eq!(
            gate.resolve(Some(&test_session("dev-1"))).await,
            Role::Client
        );
    }
}
