use graft_core::{ToValidationFailure, ValidationCode, ValidationErrors, indexed_field};
use graft_mapping::ResolveError;
use graft_storage::StorageError;
use thiserror::Error;

/// Failure of a single patch operation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PatchError {
    #[error("invalid patch document: {reason}")]
    InvalidDocument { reason: String },

    #[error("'{op}' operations are not supported")]
    UnsupportedOperation { op: String },

    #[error("{count} operations exceed the limit of {max}")]
    TooManyOperations { count: usize, max: usize },

    #[error(transparent)]
    Path(#[from] ResolveError),

    #[error("'-' must be the last segment of '{path}'")]
    AppendNotLast { path: String },

    #[error("'{path}' cannot be used with '{op}': {reason}")]
    InvalidTarget {
        op: String,
        path: String,
        reason: String,
    },

    #[error("'{op}' requires a value")]
    MissingValue { op: String },

    #[error("cannot convert value of '{field}': {reason}")]
    Conversion { field: String, reason: String },

    #[error("{entity} with key '{key}' was not found")]
    EntityNotFound { entity: String, key: String },

    #[error("test failed at '{path}': expected {expected}, found {actual}")]
    TestFailed {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("relation misconfigured: {reason}")]
    RelationMisconfigured { reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PatchError {
    pub fn invalid_target(op: impl ToString, path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            op: op.to_string(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn conversion(field: impl Into<String>, reason: impl ToString) -> Self {
        Self::Conversion {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    pub fn entity_not_found(entity: impl Into<String>, key: impl ToString) -> Self {
        Self::EntityNotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    pub fn relation_misconfigured(reason: impl Into<String>) -> Self {
        Self::RelationMisconfigured {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::EntityNotFound { .. } => true,
            Self::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl ToValidationFailure for PatchError {
    fn validation_code(&self) -> ValidationCode {
        match self {
            Self::InvalidDocument { .. }
            | Self::UnsupportedOperation { .. }
            | Self::TooManyOperations { .. } => ValidationCode::ExpressionIsUndefined,
            Self::Path(e) => e.validation_code(),
            Self::AppendNotLast { .. } => ValidationCode::SegmentMustBeCollectionId,
            _ if self.is_not_found() => ValidationCode::EntityNotFound,
            _ => ValidationCode::CanNotCreateExpression,
        }
    }
}

/// Failure of a whole patch document. Nothing of the document is visible
/// after any of these.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("patch document rejected: {0}")]
    Invalid(ValidationErrors),

    #[error("operation {index} failed: {source}")]
    Operation {
        index: usize,
        #[source]
        source: PatchError,
    },

    #[error("patch cancelled after {applied} operations; nothing was committed")]
    Cancelled { applied: usize },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApplyError {
    /// Index of the failing operation, when one failed.
    pub fn operation_index(&self) -> Option<usize> {
        match self {
            Self::Operation { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Client-facing `{ field: [failure] }` shape, keyed `operations[i]` for
    /// per-operation failures.
    pub fn to_validation_errors(&self) -> Option<ValidationErrors> {
        match self {
            Self::Invalid(errors) => Some(errors.clone()),
            Self::Operation { index, source } => Some(ValidationErrors::single(
                indexed_field("operations", *index),
                source.to_validation_failure(),
            )),
            Self::Cancelled { .. } | Self::Storage(_) => None,
        }
    }
}

impl From<ValidationErrors> for ApplyError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Invalid(errors)
    }
}
