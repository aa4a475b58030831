mod live_handler;
mod search_handler;

pub use live_handler::*;
pub use search_handler::*;
