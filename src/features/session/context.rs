use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use super::gate::{Capabilities, Role, RoleGate};
use crate::features::auth::Session;

/// Snapshot of a long-lived connection's identity
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub session: Option<Session>,
    pub role: Role,
}

impl SessionState {
    pub fn anonymous() -> Self {
        Self {
            session: None,
            role: Role::Client,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            authenticated: self.session.is_some(),
            subject: self.session.as_ref().map(|s| s.subject.clone()),
            role: self.role,
            capabilities: self.role.into(),
        }
    }
}

/// What a client is told about its own session
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub role: Role,
    pub capabilities: Capabilities,
}

/// Session state for a connection that outlives a single request.
///
/// Sign-in publishes the new session as `Client` right away and upgrades the
/// role once the gate answers. Every sign-in/sign-out bumps a generation
/// counter; a role lookup that finishes after a newer transition is dropped.
pub struct SessionContext {
    gate: Arc<RoleGate>,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
}

impl SessionContext {
    pub async fn init(gate: Arc<RoleGate>, session: Option<Session>) -> Self {
        let role = gate.resolve(session.as_ref()).await;
        let (state, _) = watch::channel(SessionState { session, role });
        Self {
            gate,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Returns the role in effect once the call completes
    pub async fn sign_in(&self, session: Session) -> Role {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(SessionState {
            session: Some(session.clone()),
            role: Role::Client,
        });

        let role = self.gate.resolve(Some(&session)).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(
                "Discarding role of superseded sign-in for {}",
                session.subject
            );
            return self.state.borrow().role;
        }

        self.state.send_replace(SessionState {
            session: Some(session),
            role,
        });
        role
    }

    pub fn sign_out(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(SessionState::anonymous());
    }

    /// End the context; subscribers observe the channel closing
    pub fn teardown(self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        drop(self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::backend::{Collection, DataBackend, InMemoryBackend, Record};
    use crate::shared::test_helpers::test_session;
    use serde_json::json;
    use std::time::Duration;

    async fn gate_with(profiles: &[(&str, &str)]) -> (Arc<InMemoryBackend>, Arc<RoleGate>) {
        let backend = Arc::new(InMemoryBackend::new(Vec::new()));
        for (id, role) in profiles {
            let mut record = Record::new();
            record.insert("id".into(), json!(id));
            record.insert("role".into(), json!(role));
            record.insert("created_at".into(), json!("2025-03-01T10:00:00Z"));
            backend.insert(Collection::Profiles, record).await.unwrap();
        }
        let gate = Arc::new(RoleGate::new(backend.clone()));
        (backend, gate)
    }

    #[tokio::test]
    async fn test_init_resolves_role() {
        let (_, gate) = gate_with(&[("admin-1", "admin")]).await;

        let anonymous = SessionContext::init(gate.clone(), None).await;
        assert_eq!(anonymous.current(), SessionState::anonymous());

        let admin = SessionContext::init(gate, Some(test_session("admin-1"))).await;
        assert_eq!(admin.current().role, Role::Admin);
    }

    #[tokio::test]
    async fn test_sign_out_resets_to_client_immediately() {
        let (_, gate) = gate_with(&[("dev-1", "developer")]).await;
        let context = SessionContext::init(gate, None).await;
        let mut updates = context.subscribe();

        assert_eq!(context.sign_in(test_session("dev-1")).await, Role::Developer);
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().role, Role::Developer);

        context.sign_out();
        let state = updates.borrow_and_update().clone();
        assert_eq!(state, SessionState::anonymous());
        assert!(!state.summary().capabilities.mutate_catalog);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_role_lookup_never_raises_privileges() {
        let (backend, gate) = gate_with(&[("admin-1", "admin")]).await;
        backend.set_latency(Some(Duration::from_millis(200)));
        let context = Arc::new(SessionContext::init(gate, None).await);

        let signing_in = {
            let context = context.clone();
            tokio::spawn(async move { context.sign_in(test_session("admin-1")).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(context.current().role, Role::Client);
        context.sign_out();

        assert_eq!(signing_in.await.unwrap(), Role::Client);
        assert_eq!(context.current(), SessionState::anonymous());
    }

    #[tokio::test]
    async fn test_teardown_closes_subscriptions() {
        let (_, gate) = gate_with(&[]).await;
        let context = SessionContext::init(gate, None).await;
        let mut updates = context.subscribe();

        context.teardown();
        assert!(updates.changed().await.is_err());
    }
}
