//! Error types for skilltree.

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type alias using skilltree's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for skilltree operations.
#[derive(Error, Debug)]
pub enum Error {
    /// One or more validation rules were violated. All violations are
    /// collected so callers can display them at once.
    #[error("Validation failed: {}", format_violations(.0))]
    Validation(Vec<ValidationError>),

    /// Taxonomy node not found in the active tree
    #[error("Node not found: {0}")]
    NodeNotFound(uuid::Uuid),

    /// Inactive Bin entry not found
    #[error("Inactive item not found: {0}")]
    InactiveItemNotFound(uuid::Uuid),

    /// Global proficiency level not found
    #[error("Proficiency level not found: {0}")]
    LevelNotFound(uuid::Uuid),

    /// Proficiency mapping not found among active mappings
    #[error("Proficiency mapping not found: {0}")]
    MappingNotFound(uuid::Uuid),

    /// Operation conflicts with the current state (e.g. merging a node into itself)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// CSV reading or writing failed
    #[error("CSV error: {0}")]
    Csv(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the validation violations if this is a validation error.
    pub fn violations(&self) -> Option<&[ValidationError]> {
        match self {
            Error::Validation(v) => Some(v),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

fn format_violations(violations: &[ValidationError]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{ValidationError, ValidationRule};
    use uuid::Uuid;

    #[test]
    fn test_error_display_node_not_found() {
        let id = Uuid::nil();
        let err = Error::NodeNotFound(id);
        assert_eq!(err.to_string(), format!("Node not found: {}", id));
    }

    #[test]
    fn test_error_display_validation_joins_all_violations() {
        let err = Error::Validation(vec![
            ValidationError::new("name", ValidationRule::Required, "Name is required"),
            ValidationError::new("rank", ValidationRule::DuplicateRank, "Rank 2 is already used"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: name: Name is required; rank: Rank 2 is already used"
        );
        assert_eq!(err.violations().map(|v| v.len()), Some(2));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.violations().is_none());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
