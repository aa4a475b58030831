mod jwks;
mod validator;

pub mod guards;
pub mod model;

pub use jwks::JwksClient;
pub use model::{Session, Viewer};
pub use validator::{JwtValidator, TokenVerifier};
