//! HTTP request handlers

pub mod discovery;
pub mod modules;
pub mod status;

// Re-export AppState (used by all handlers)
pub use status::AppState;
