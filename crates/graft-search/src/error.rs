use graft_core::{ToValidationFailure, ValidationCode};
use graft_mapping::ResolveError;
use thiserror::Error;

/// Failure to compile one filter or order token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("'{token}' is not a filter expression; expected 'key:value' or 'key!:value'")]
    UndefinedFilter { token: String },

    #[error("'{token}' is not an order expression; expected 'key' or 'key desc'")]
    UndefinedOrder { token: String },

    #[error("{count} {list} expressions exceed the limit of {max}")]
    TooManyTokens {
        list: &'static str,
        count: usize,
        max: usize,
    },

    #[error("property '{key}' does not exist: {reason}")]
    PropertyNotFound { key: String, reason: String },

    #[error("property '{key}' is not filterable")]
    PropertyNotFilterable { key: String },

    #[error("cannot create expression for '{key}': {reason}")]
    CanNotCreateExpression { key: String, reason: String },

    #[error("property '{key}' cannot be sorted: {reason}")]
    NotSortable { key: String, reason: String },
}

impl SearchError {
    pub fn cannot_create(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::CanNotCreateExpression {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn not_sortable(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotSortable {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Classify a resolution failure of `key`.
    pub fn from_resolve(key: &str, error: ResolveError) -> Self {
        if error.is_not_found() {
            Self::PropertyNotFound {
                key: key.to_string(),
                reason: error.to_string(),
            }
        } else {
            Self::cannot_create(key, error)
        }
    }
}

impl ToValidationFailure for SearchError {
    fn validation_code(&self) -> ValidationCode {
        match self {
            Self::UndefinedFilter { .. } | Self::UndefinedOrder { .. } | Self::TooManyTokens { .. } => {
                ValidationCode::ExpressionIsUndefined
            }
            Self::PropertyNotFound { .. } => ValidationCode::PropertyDoesNotExist,
            Self::PropertyNotFilterable { .. } => ValidationCode::PropertyIsNotFilterable,
            Self::CanNotCreateExpression { .. } | Self::NotSortable { .. } => {
                ValidationCode::CanNotCreateExpression
            }
        }
    }
}
