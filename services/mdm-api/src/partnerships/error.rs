//! Partnership error types.

use mdm_warehouse::WarehouseError;
use serde::Serialize;
use thiserror::Error;

/// A field-level shape or enum violation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Errors from partnership operations.
#[derive(Debug, Error)]
pub enum PartnershipError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Partnership with ID {0} already exists")]
    DuplicateId(String),

    #[error("Partnership with ID {0} not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] WarehouseError),

    /// The warehouse accepted the request but rejected one or more rows.
    #[error("storage rejected the insert: {0}")]
    InsertRejected(String),

    #[error("failed to decode stored record: {0}")]
    Decode(String),
}

impl PartnershipError {
    /// Expected business outcomes, as opposed to failures of the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PartnershipError::Validation(_)
                | PartnershipError::DuplicateId(_)
                | PartnershipError::NotFound(_)
        )
    }
}
