//! Warehouse error types.

use serde::Serialize;
use thiserror::Error;

/// Warehouse operation errors.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// The client was configured with unusable settings.
    #[error("invalid warehouse configuration: {0}")]
    Config(String),

    /// The HTTP request could not be sent or its body could not be read.
    #[error("warehouse request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The engine answered with a non-success HTTP status.
    #[error("warehouse returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// The query job completed with errors.
    #[error("query job failed: {0}")]
    Job(String),

    /// No access token could be obtained.
    #[error("failed to obtain warehouse credentials: {0}")]
    Credentials(String),

    /// The engine's response did not have the expected shape.
    #[error("failed to decode warehouse response: {0}")]
    Decode(String),
}

/// A row rejected by `insert_rows`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertError {
    /// Position of the row in the submitted batch.
    pub index: usize,
    pub reason: String,
    pub message: String,
}

impl std::fmt::Display for InsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {} ({})", self.index, self.message, self.reason)
    }
}
