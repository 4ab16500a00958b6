//! Error types shared by every stage of the watch pipeline.
//!
//! The variants follow the failure taxonomy the pipeline acts on: retrieval
//! failures end a source's fetch, service failures end a single document's
//! analysis, delivery failures end the notification batch, and store
//! failures end the run.

use thiserror::Error;

use crate::models::DocumentStatus;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors raised by the watcher.
#[derive(Error, Debug)]
pub enum WatchError {
    /// A listing page or document could not be downloaded.
    #[error("Retrieval error for {url}: {reason}")]
    Retrieval { url: String, reason: String },

    /// Database operation error (wraps sqlx::Error)
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An external translation or completion call failed.
    #[error("Service error ({service}): {reason}")]
    Service { service: &'static str, reason: String },

    /// The language model answered with something other than the expected JSON.
    #[error("Malformed service response: {0}")]
    MalformedResponse(String),

    /// The notification could not be delivered.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// A source code that is not in the registry.
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// A stage write whose status guard did not match the stored document.
    #[error("Document {id} is not in state {expected}")]
    InvalidTransition { id: i64, expected: DocumentStatus },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl WatchError {
    pub fn retrieval(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Retrieval {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn service(service: &'static str, reason: impl ToString) -> Self {
        Self::Service {
            service,
            reason: reason.to_string(),
        }
    }
}
