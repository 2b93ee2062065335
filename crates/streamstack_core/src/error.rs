//! Core error types for streamstack.

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Logical id does not follow the engine's id grammar
    #[error("Invalid logical id '{id}': {reason}")]
    InvalidLogicalId {
        /// Offending id
        id: String,
        /// Why it was rejected
        reason: String,
    },

    /// Resource kind name not recognised
    #[error("Unknown resource kind: {kind}")]
    UnknownKind {
        /// Kind name as written
        kind: String,
    },

    /// Invalid digest format
    #[error("Invalid digest: {reason}")]
    InvalidDigest {
        /// Why it was rejected
        reason: String,
    },

    /// Configuration value rejected
    #[error("Invalid configuration for {field}: {reason}")]
    Config {
        /// Config field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Malformed JSON input
    #[error("Encoding error: {message}")]
    Encoding {
        /// Parser message
        message: String,
    },

    /// Failed to read an input file
    #[error("Failed to read {path}: {message}")]
    Io {
        /// File path
        path: String,
        /// OS error message
        message: String,
    },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding {
            message: err.to_string(),
        }
    }
}
