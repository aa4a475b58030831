pub mod dispatcher;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod routes;

pub use dispatcher::{SearchDispatcher, SearchOutcome};
pub use engine::{SearchEngine, SearchHandle, SearchPhase, SearchView};
pub use models::{SearchResult, SearchRow, SearchSection, SearchState};
pub use routes::routes;
