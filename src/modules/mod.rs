//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the data backend boundary (records) and blob storage (images).

pub mod backend;
pub mod storage;
