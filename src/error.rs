//! Error handling for Claro
//!
//! Only unrecoverable conditions live here: a controller that cannot load
//! its curves, catalog or configuration must refuse to accept any command.
//! Recoverable conditions are surfaced as `control::Warning` instead.

use thiserror::Error;

/// Result type alias for Claro operations
pub type Result<T> = std::result::Result<T, ClaroError>;

/// Fatal error type for Claro operations
#[derive(Error, Debug)]
pub enum ClaroError {
    // Curve Repository Errors
    #[error("Curve file not found: {path}")]
    CurveFileNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid curve data in {path}: {reason}")]
    InvalidCurve { path: String, reason: String },

    #[error("Curve shape mismatch: {reason}")]
    CurveShape { reason: String },

    // Catalog Errors
    #[error("Invalid catalog: {reason}")]
    InvalidCatalog { reason: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // State File Errors
    #[error("Cannot read state file {path}: {reason}")]
    StateFile { path: String, reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClaroError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ClaroError::CurveFileNotFound { .. } => "CURVE_FILE_NOT_FOUND",
            ClaroError::InvalidCurve { .. } => "INVALID_CURVE",
            ClaroError::CurveShape { .. } => "CURVE_SHAPE",
            ClaroError::InvalidCatalog { .. } => "INVALID_CATALOG",
            ClaroError::InvalidConfig { .. } => "INVALID_CONFIG",
            ClaroError::StateFile { .. } => "STATE_FILE",
            ClaroError::Io(_) => "IO_ERROR",
            ClaroError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}
