use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
pub use thiserror::Error;

/// Error taxonomy for the portal core. Every failure is scoped to the
/// operation that raised it; nothing here is fatal to the process.
#[derive(Debug, Serialize, Deserialize, Error, Clone, PartialEq)]
pub enum PortalError {
    #[error("Validation error: {0}")]
    Validation(ValidationError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("An internal error occurred: {0}")]
    Internal(String),
}

impl PortalError {
    /// Auth errors are handled globally (session teardown), never locally.
    pub fn is_auth(&self) -> bool {
        matches!(self, PortalError::Auth(_))
    }

    /// Retryable by the user re-triggering the operation; no automatic retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PortalError::Transport(_) | PortalError::NotFound(_))
    }
}

// Implement the From trait for &str
impl From<&str> for PortalError {
    fn from(error: &str) -> Self {
        PortalError::Internal(error.to_string())
    }
}

// Implement From for serde_json::Error
impl From<SerdeJsonError> for PortalError {
    fn from(err: SerdeJsonError) -> Self {
        PortalError::Internal(format!("JSON serialization error: {}", err))
    }
}

// Implement From for ValidationError
impl From<ValidationError> for PortalError {
    fn from(err: ValidationError) -> Self {
        PortalError::Validation(err)
    }
}

/// Input problems caught before anything reaches the backend.
#[derive(Debug, Serialize, Deserialize, Error, PartialEq, Clone)]
pub enum ValidationError {
    #[error("identifier must be exactly 12 digits")]
    MalformedNationalId,
    #[error("reminder time '{0}' is not HH:MM")]
    MalformedReminderTime(String),
    #[error("diagnosis text is required")]
    EmptyDiagnosis,
    #[error("suggestion notes are required")]
    EmptyNotes,
    #[error("identifier '{0}' is already registered")]
    DuplicateIdentifier(String),
    #[error("unknown record source '{0}'")]
    UnknownRecordSource(String),
    #[error("role '{0}' may not author medical records")]
    RoleCannotWrite(String),
    #[error("stock counts are inconsistent: remaining {remaining} exceeds total {total}")]
    InconsistentStock { remaining: u32, total: u32 },
}

/// A type alias for a `Result` that returns a `PortalError` on failure.
pub type PortalResult<T> = Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::{PortalError, ValidationError};

    #[test]
    fn should_classify_auth_errors() {
        assert!(PortalError::Auth("expired".into()).is_auth());
        assert!(!PortalError::NotFound("x".into()).is_auth());
    }

    #[test]
    fn should_classify_retryable_errors() {
        assert!(PortalError::Transport("backend unreachable".into()).is_retryable());
        assert!(PortalError::NotFound("no match".into()).is_retryable());
        assert!(!PortalError::Validation(ValidationError::MalformedNationalId).is_retryable());
        assert!(!PortalError::Conflict("out of stock".into()).is_retryable());
    }

    #[test]
    fn should_wrap_validation_errors() {
        let err: PortalError = ValidationError::MalformedNationalId.into();
        assert_eq!(
            err,
            PortalError::Validation(ValidationError::MalformedNationalId)
        );
    }
}
