//! Prediction service
//!
//! Serves the most recently published model over HTTP.

pub mod api;
pub mod error;

pub use api::{create_router, serve, AppState};
pub use error::ApiError;
