//! Session/role gate: who the caller is and what it may do.
//!
//! - [`gate`]: role parsing, capability checks and profile-backed [`RoleGate`]
//! - [`context`]: [`SessionContext`] for connections that sign in and out over time

mod context;
mod gate;

pub mod handler;
pub mod routes;

pub use context::{SessionContext, SessionState, SessionSummary};
pub use gate::{
    can_edit_roles, can_mutate_catalog, can_process_messages, can_validate_accounts,
    Capabilities, Role, RoleGate,
};
pub use routes::routes;
