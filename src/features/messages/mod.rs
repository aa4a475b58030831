pub mod dto;
pub mod handler;
pub mod model;
pub mod routes;
pub mod service;

pub use model::{Message, MessageStatus};
pub use routes::routes;
pub use service::MessageService;
