//! Storage error types.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The requested entity was not found.
    #[error("Entity not found: {entity}/{key}")]
    NotFound {
        /// Entity type that was looked up.
        entity: String,
        /// Key that was looked up.
        key: String,
    },

    /// Attempted to insert an entity whose key is taken.
    #[error("Entity already exists: {entity}/{key}")]
    AlreadyExists { entity: String, key: String },

    /// The record does not fit the storage schema.
    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    /// The entity type or link table is not part of the schema.
    #[error("Unknown storage type: {name}")]
    UnknownType { name: String },

    /// An error occurred during a transaction.
    #[error("Transaction error: {message}")]
    TransactionError { message: String },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(entity: impl Into<String>, key: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(entity: impl Into<String>, key: impl ToString) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unknown_type(name: impl Into<String>) -> Self {
        Self::UnknownType { name: name.into() }
    }

    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidRecord { .. } => ErrorCategory::Validation,
            Self::UnknownType { .. } => ErrorCategory::Internal,
            Self::TransactionError { .. } => ErrorCategory::Transaction,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Transaction,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Transaction => write!(f, "transaction"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("Order", 10);
        assert_eq!(err.to_string(), "Entity not found: Order/10");

        let err = StorageError::already_exists("Tag", "3");
        assert_eq!(err.to_string(), "Entity already exists: Tag/3");
    }

    #[test]
    fn test_error_predicates() {
        assert!(StorageError::not_found("Order", 1).is_not_found());
        assert!(!StorageError::internal("boom").is_not_found());
        assert!(StorageError::already_exists("Order", 1).is_already_exists());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(StorageError::not_found("Order", 1).category(), ErrorCategory::NotFound);
        assert_eq!(
            StorageError::transaction_error("closed").category(),
            ErrorCategory::Transaction
        );
        assert_eq!(ErrorCategory::Conflict.to_string(), "conflict");
    }
}
