//! # Error Types
//!
//! Structured error types for opening_core. Every failure that aborts a
//! request is a [`CalcError`]; conditions the workflow tolerates (an
//! unrecognized roof type, a template branch that is absent) are values,
//! not errors. See [`crate::calculations::LoadEstimate`] and
//! [`crate::template::MutationOutcome`].
//!
//! ## Example
//!
//! ```rust
//! use opening_core::errors::{CalcError, CalcResult};
//!
//! fn validate_depth(tiefe_cm: f64) -> CalcResult<()> {
//!     if tiefe_cm < 0.0 {
//!         return Err(CalcError::InvalidInput {
//!             field: "tiefe".to_string(),
//!             value: tiefe_cm.to_string(),
//!             reason: "Wall depth cannot be negative".to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for opening_core operations
pub type CalcResult<T> = Result<T, CalcError>;

/// Structured error type for intake operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// A form value is malformed (non-numeric, negative, wrong enum value)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A required form field is missing
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// The structural template could not be read or parsed
    #[error("Template error: '{path}' - {reason}")]
    TemplateLoad { path: String, reason: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// File is locked by another user/process
    #[error("File locked: '{path}' is locked by {locked_by} since {locked_at}")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON/TOML serialization or deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Ledger schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },

    /// An external collaborator (store, file storage, mailer) failed
    #[error("{service} failed: {reason}")]
    Collaborator { service: String, reason: String },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CalcError {
    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingField error
    pub fn missing_field(field: impl Into<String>) -> Self {
        CalcError::MissingField {
            field: field.into(),
        }
    }

    /// Create a TemplateLoad error
    pub fn template_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::TemplateLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileLocked error
    pub fn file_locked(path: impl Into<String>, locked_by: impl Into<String>, locked_at: impl Into<String>) -> Self {
        CalcError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    /// Create a Collaborator error
    pub fn collaborator(service: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::Collaborator {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Check if this is a recoverable error (e.g., can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CalcError::FileLocked { .. } | CalcError::Collaborator { .. })
    }

    /// True for errors caused by the submitted form rather than the system
    pub fn is_input_error(&self) -> bool {
        matches!(self, CalcError::InvalidInput { .. } | CalcError::MissingField { .. })
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::InvalidInput { .. } => "INVALID_INPUT",
            CalcError::MissingField { .. } => "MISSING_FIELD",
            CalcError::TemplateLoad { .. } => "TEMPLATE_LOAD",
            CalcError::FileError { .. } => "FILE_ERROR",
            CalcError::FileLocked { .. } => "FILE_LOCKED",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
            CalcError::VersionMismatch { .. } => "VERSION_MISMATCH",
            CalcError::Collaborator { .. } => "COLLABORATOR_FAILED",
            CalcError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
