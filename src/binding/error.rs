//! Bind failures.

use thiserror::Error;

/// Errors produced while extracting request data into a record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindError {
    /// The body grew past the configured ceiling.
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// The source was structurally invalid for the matched content type.
    #[error("{0}")]
    Decode(String),

    /// Reading the body failed below the decoder.
    #[error("read body: {0}")]
    Body(String),
}

impl BindError {
    pub fn decode(message: impl Into<String>) -> Self {
        BindError::Decode(message.into())
    }

    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, BindError::PayloadTooLarge { .. })
    }
}

/// Result type for binding operations.
pub type BindResult<T = ()> = Result<T, BindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BindError::PayloadTooLarge { limit: 1024 }.to_string(),
            "request body exceeds 1024 bytes"
        );
        assert_eq!(BindError::decode("json: unknown field \"x\"").to_string(), "json: unknown field \"x\"");
        assert!(BindError::PayloadTooLarge { limit: 1 }.is_payload_too_large());
        assert!(!BindError::Body("reset".into()).is_payload_too_large());
    }
}
