//! docshare API library
//!
//! HTTP handlers, authentication, the file service facade and application
//! setup for the document-share service.

mod api_doc;
pub mod constants;
mod handlers;
pub mod services;
pub mod setup;
pub mod telemetry;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use services::{FileService, LinkIssuer, LinkOutcome};
pub use state::AppState;
