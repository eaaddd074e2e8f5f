//! Advisory proxy - recent official public health advisories for a location
//!
//! This library validates "State, Country" locations, asks an upstream
//! completion API for recent advisories and maps the outcome to HTTP responses.

pub mod advisory;
pub mod api;
pub mod config;
pub mod error;
pub mod location;
pub mod prompt;
pub mod telemetry;
pub mod upstream;
pub mod web;

// Re-export core types for public API
pub use advisory::{AdvisoryOutcome, AdvisoryService};
pub use api::AppState;
pub use config::AdvisoryConfig;
pub use error::AdvisoryError;
pub use location::LocationQuery;
pub use prompt::AdvisoryPrompt;
pub use upstream::{AdvisoryProvider, PerplexityClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, AdvisoryError>;
