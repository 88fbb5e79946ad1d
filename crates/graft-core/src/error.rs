use thiserror::Error;

use crate::value::ScalarKind;

/// Core error types for value conversion and identifier handling
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("cannot convert '{raw}' to {kind}: {reason}")]
    InvalidLiteral {
        kind: String,
        raw: String,
        reason: String,
    },

    #[error("value of type {found} cannot be converted to {kind}")]
    TypeMismatch { kind: String, found: String },

    #[error("integer {value} is out of range for {kind}")]
    OutOfRange { kind: String, value: String },

    #[error("'{raw}' is not a variant of enum ({variants})")]
    UnknownVariant { raw: String, variants: String },

    #[error("Invalid date: {0}")]
    InvalidDate(String),
}

impl CoreError {
    /// Create a new InvalidLiteral error
    pub fn invalid_literal(
        kind: &ScalarKind,
        raw: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidLiteral {
            kind: kind.to_string(),
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    /// Create a new TypeMismatch error
    pub fn type_mismatch(kind: &ScalarKind, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            kind: kind.to_string(),
            found: found.into(),
        }
    }

    /// Create a new OutOfRange error
    pub fn out_of_range(kind: &ScalarKind, value: impl ToString) -> Self {
        Self::OutOfRange {
            kind: kind.to_string(),
            value: value.to_string(),
        }
    }

    /// Create a new UnknownVariant error
    pub fn unknown_variant(raw: impl Into<String>, variants: &[String]) -> Self {
        Self::UnknownVariant {
            raw: raw.into(),
            variants: variants.join(", "),
        }
    }

    /// Create a new InvalidDate error
    pub fn invalid_date(message: impl Into<String>) -> Self {
        Self::InvalidDate(message.into())
    }

    /// Every core error comes from converting client input.
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
