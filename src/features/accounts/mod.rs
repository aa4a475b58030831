pub mod clients;
pub mod dtos;
pub mod handlers;
pub mod model;
pub mod routes;
pub mod services;

pub use model::{UserProfile, VerificationPolicy};
pub use routes::routes;
pub use services::AccountService;
