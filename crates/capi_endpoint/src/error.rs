//! Endpoint error types.

use capi_protocol::{codes, ErrorEntry, Module};
use thiserror::Error;

/// Result type for content store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for endpoint setup.
pub type EndpointResult<T> = Result<T, EndpointError>;

/// Errors raised by a content store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A write or commit was attempted outside a transaction.
    #[error("no transaction in progress")]
    NoTransaction,

    /// A transaction was started while another was open.
    #[error("a transaction is already in progress")]
    TransactionActive,

    /// A record the operation depends on does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind.
        kind: &'static str,
        /// Record id.
        id: u64,
    },

    /// The backend rejected the operation.
    #[error("{operation} failed: {message}")]
    Failed {
        /// Operation name.
        operation: &'static str,
        /// Backend message.
        message: String,
    },
}

impl StoreError {
    /// Creates a backend failure.
    pub fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            message: message.into(),
        }
    }
}

/// Store failures that escape a handler's own error mapping surface as
/// internal errors.
impl From<StoreError> for ErrorEntry {
    fn from(err: StoreError) -> Self {
        ErrorEntry::new(codes::INTERNAL, "Content store failure").with_information(err.to_string())
    }
}

/// Errors raised while setting up an endpoint.
#[derive(Error, Debug)]
pub enum EndpointError {
    /// A handler is already registered for the module.
    #[error("a handler is already registered for module '{}'", .0.as_str())]
    DuplicateHandler(Module),

    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::NotFound {
            kind: "article",
            id: 7,
        };
        assert_eq!(err.to_string(), "article 7 not found");

        let err = StoreError::failed("attach_media", "disk full");
        assert_eq!(err.to_string(), "attach_media failed: disk full");
    }

    #[test]
    fn store_error_becomes_internal_entry() {
        let entry = ErrorEntry::from(StoreError::NoTransaction);
        assert_eq!(entry.code(), codes::INTERNAL);
        assert_eq!(
            entry.information().and_then(|v| v.as_str()),
            Some("no transaction in progress")
        );
    }

    #[test]
    fn duplicate_handler_display() {
        let err = EndpointError::DuplicateHandler(Module::Articles);
        assert!(err.to_string().contains("articles"));
    }
}
