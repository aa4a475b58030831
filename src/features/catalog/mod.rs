//! Three-level catalog: categories own subcategories, subcategories own products.

pub mod dtos;
pub mod handlers;
pub mod hierarchy;
pub mod models;
pub mod routes;
pub mod services;

pub use hierarchy::{relations, CascadePolicy, EntityKind, ParentKind};
pub use services::CatalogService;
