//! Error types for alert sinks.

use thiserror::Error;

/// Errors that can occur while rendering or shipping alerts.
#[derive(Debug, Error)]
pub enum SinkError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote endpoint rejected the payload
    #[error("webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Writing to the output stream failed
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}
