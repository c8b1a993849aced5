//! Error types for quicksave.

use thiserror::Error;

/// Result type alias for quicksave operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for quicksave.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid settings file: {0}")]
    InvalidSettings(String),

    // Graph errors (20-29)
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("unknown node type: {0}")]
    UnknownType(String),

    #[error("graph has no root")]
    MissingRoot,

    // Copy errors (30-39)
    #[error("type mismatch: cannot copy {source_type} into {dest_type}")]
    TypeMismatch {
        dest_type: String,
        source_type: String,
    },

    #[error("copy failed: {0}")]
    Copy(String),

    // Lifecycle errors (40-49)
    #[error("no snapshot present")]
    NothingSaved,

    #[error("capture not allowed: {0}")]
    CaptureNotAllowed(String),

    #[error("install not allowed: {0}")]
    InstallNotAllowed(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting in JSON output.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidSettings(_) => 11,
            Error::NodeNotFound(_) => 20,
            Error::UnknownType(_) => 21,
            Error::MissingRoot => 22,
            Error::TypeMismatch { .. } => 30,
            Error::Copy(_) => 31,
            Error::NothingSaved => 40,
            Error::CaptureNotAllowed(_) => 41,
            Error::InstallNotAllowed(_) => 42,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Whether this error is a contract violation that must abort the
    /// enclosing operation rather than degrade a single reference.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::TypeMismatch { .. } | Error::UnknownType(_) | Error::MissingRoot
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_grouped() {
        assert_eq!(Error::Config("x".into()).code(), 10);
        assert_eq!(Error::MissingRoot.code(), 22);
        assert_eq!(Error::NothingSaved.code(), 40);
    }

    #[test]
    fn test_type_mismatch_is_fatal() {
        let err = Error::TypeMismatch {
            dest_type: "Spring".into(),
            source_type: "Spike".into(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Spike"));
        assert!(!Error::NothingSaved.is_fatal());
    }
}
