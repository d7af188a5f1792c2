//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Failure categories shared by protocol, transport and endpoint errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or incomplete wire data.
    Structural,
    /// Key or digest mismatch.
    Authentication,
    /// Payload data missing or inconsistent.
    Validation,
    /// Duplicate identifier or content reference.
    Conflict,
    /// Storage effect failed.
    Effect,
    /// Unknown module or action.
    Routing,
    /// Network-level send failure.
    Transport,
    /// Uncaught failure.
    Internal,
}

impl ErrorKind {
    /// Returns true if the failure is worth retrying by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Effect | ErrorKind::Transport | ErrorKind::Internal
        )
    }
}

/// Errors that can occur while building or parsing messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Bytes were not a valid JSON message.
    #[error("message could not be parsed: {0}")]
    Parse(String),

    /// A required message field was absent.
    #[error("required key was not found in message: {0}")]
    MissingField(&'static str),

    /// Nested error or payload data was incomplete or of the wrong shape.
    #[error("malformed data: {0}")]
    MalformedData(String),

    /// Module outside the closed enumeration.
    #[error("unknown module provided for payload: {0}")]
    InvalidModule(String),

    /// Action outside the closed enumeration.
    #[error("unknown action provided for payload: {0}")]
    InvalidAction(String),

    /// A payload with the same identifier is already present.
    #[error("payload with identifier {0} already exists")]
    DuplicatePayload(String),

    /// Neither a form field nor a raw body carried a message.
    #[error("no message in request")]
    NoMessage,

    /// Message could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Digest could not be computed.
    #[error("digest failed: {0}")]
    Digest(String),
}

impl ProtocolError {
    /// Returns the failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Parse(_)
            | ProtocolError::MissingField(_)
            | ProtocolError::MalformedData(_)
            | ProtocolError::NoMessage => ErrorKind::Structural,
            ProtocolError::InvalidModule(_) | ProtocolError::InvalidAction(_) => {
                ErrorKind::Routing
            }
            ProtocolError::DuplicatePayload(_) => ErrorKind::Conflict,
            ProtocolError::Serialization(_) | ProtocolError::Digest(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ProtocolError::MalformedData(message.into())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert_eq!(
            ProtocolError::MissingField("digest").kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            ProtocolError::DuplicatePayload("a".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            ProtocolError::InvalidAction("put".into()).kind(),
            ErrorKind::Routing
        );
        assert!(!ErrorKind::Authentication.is_retryable());
        assert!(ErrorKind::Transport.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = ProtocolError::MissingField("api_key");
        assert_eq!(
            err.to_string(),
            "required key was not found in message: api_key"
        );
    }
}
