//! HTTP/JSON front end for a lexicon kept consistent by `lexicon-fdo`.

pub mod handlers;

pub use handlers::{ApiError, AppState, router};
