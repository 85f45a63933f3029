use thiserror::Error;

use crate::ids::ReferenceId;

// Error message prefixes
const MSG_FAILED_TO_PREFIX: &str = "Failed to";
const MSG_INVALID_PREFIX: &str = "Invalid";
const MSG_UNEXPECTED_PREFIX: &str = "Unexpected";

/// Result type for the `credit_intake` library
pub type Result<T> = std::result::Result<T, error_stack::Report<Error>>;

/// Error categories surfaced by the engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    General(String),

    #[error("Reference {identity} no longer exists remotely")]
    IdentityResolution { identity: ReferenceId },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Persistence failed with status {status}: {message}")]
    Persistence { status: u16, message: String },

    #[error("Schema load failed for '{entity}': {message}")]
    SchemaLoad { entity: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation failed for {} field(s)", .errors.len())]
    Validation { errors: Vec<ValidationError> },
}

/// A single field that failed client-side validation
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationError {
    /// Resolved path of the offending field, e.g. `principal.first_name`
    pub path:    String,
    /// Human-readable message shown next to the field
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl Error {
    // Builder methods for common patterns

    /// Create a "Failed to X" error
    pub fn failed_to(action: &str, details: impl std::fmt::Display) -> Self {
        Self::General(format!("{MSG_FAILED_TO_PREFIX} {action}: {details}"))
    }

    /// Create an "Invalid X" error
    pub fn invalid(what: &str, details: impl std::fmt::Display) -> Self {
        Self::InvalidArgument(format!("{MSG_INVALID_PREFIX} {what}: {details}"))
    }

    /// Create an "Unexpected X" error
    pub fn unexpected(what: &str, details: impl std::fmt::Display) -> Self {
        Self::General(format!("{MSG_UNEXPECTED_PREFIX} {what}: {details}"))
    }

    /// Create a schema load error for an entity
    pub fn schema_load(entity: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::SchemaLoad {
            entity:  entity.into(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error from a non-success collaborator status
    pub fn persistence(status: u16, message: impl Into<String>) -> Self {
        Self::Persistence {
            status,
            message: message.into(),
        }
    }

    /// Create error for collaborator requests that never produced a status
    pub fn request_failed(operation: &str, error: impl std::fmt::Display) -> Self {
        Self::Transport(format!("{MSG_FAILED_TO_PREFIX} {operation} request: {error}"))
    }

    /// Create a cancellation error for the named operation
    pub fn cancelled(operation: &str) -> Self {
        Self::Cancelled(format!("{operation} was cancelled before completion"))
    }

    /// Create error for a path that cannot be walked
    pub fn invalid_path(path: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::InvalidPath(format!("{path}: {reason}"))
    }

    /// HTTP status carried by this error, if any
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Persistence { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error reports a missing remote resource
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }
}
