//! Error taxonomy for the workflow engine.
//!
//! Every fallible engine operation returns one of these variants; nothing is
//! swallowed. `Conflict` is recoverable by re-reading and retrying,
//! `InvalidTransition` signals a stale client view and must be surfaced.

use thiserror::Error;

/// Errors returned by engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("cannot {action} while {status}")]
    InvalidTransition {
        action: &'static str,
        status: String,
    },

    #[error("validation: {0}")]
    Validation(String),

    #[error("storage: {0}")]
    Storage(String),
}

impl EngineError {
    /// Shorthand for a not-found error with a typed kind
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for an invalid transition in the given status
    pub fn invalid_transition(action: &'static str, status: impl ToString) -> Self {
        Self::InvalidTransition {
            action,
            status: status.to_string(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = EngineError::not_found("template", "abc");
        assert_eq!(err.to_string(), "template 'abc' not found");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = EngineError::invalid_transition("pause", "paused");
        assert_eq!(err.to_string(), "cannot pause while paused");
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = EngineError::from(io);
        assert!(matches!(err, EngineError::Storage(_)));
    }
}
