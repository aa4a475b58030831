pub mod accounts;
pub mod auth;
pub mod catalog;
pub mod messages;
pub mod search;
pub mod session;
