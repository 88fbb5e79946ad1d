use graft_core::{ErrorCategory, ToValidationFailure, TypeName, ValidationCode};
use thiserror::Error;

use crate::filterable::ComparisonStrategy;

/// Inconsistent declarations detected while building the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("type '{0}' is declared twice")]
    DuplicateType(TypeName),

    #[error("presentation type '{dto}' maps unknown entity '{entity}'")]
    UnknownEntity { dto: TypeName, entity: TypeName },

    #[error("{dto}.{field}: unknown presentation type '{target}'")]
    UnknownDto {
        dto: TypeName,
        field: String,
        target: TypeName,
    },

    #[error("{dto}.{field}: member '{member}' does not exist on '{entity}'")]
    UnknownMember {
        dto: TypeName,
        field: String,
        member: String,
        entity: TypeName,
    },

    #[error("{dto}.{field}: member path continues past '{segment}'")]
    MemberPastTerminal {
        dto: TypeName,
        field: String,
        segment: String,
    },

    #[error("{dto}.{field}: nested type '{nested}' maps '{found}' but the member leads to '{expected}'")]
    NestedTypeMismatch {
        dto: TypeName,
        field: String,
        nested: TypeName,
        expected: TypeName,
        found: TypeName,
    },

    #[error("{dto}.{field}: only navigations and collections can have a nested type")]
    UnexpectedNestedType { dto: TypeName, field: String },

    #[error("{dto}.{field}: {strategy:?} cannot be applied to {shape}")]
    StrategyMismatch {
        dto: TypeName,
        field: String,
        strategy: ComparisonStrategy,
        shape: String,
    },

    #[error("{dto}.{field}: name collides with another field when case is ignored")]
    AmbiguousField { dto: TypeName, field: String },

    #[error("{entity}.{field}: {reason}")]
    InvalidRelation {
        entity: TypeName,
        field: String,
        reason: String,
    },
}

impl RegistryError {
    pub fn invalid_relation(
        entity: impl Into<TypeName>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidRelation {
            entity: entity.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Failure to resolve a presentation path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("empty field path")]
    EmptyPath,

    #[error("unknown presentation type '{0}'")]
    UnknownType(TypeName),

    #[error("field '{segment}' does not exist on '{type_name}'")]
    FieldNotFound { type_name: TypeName, segment: String },

    #[error("'{path}' is computed for display and cannot be compared")]
    ExpressionNotComparable { path: String },

    #[error("segment '{segment}' must identify a collection element")]
    SegmentMustBeCollectionId { segment: String },

    #[error("'{type_name}.{field}' has no inverse mapping and cannot be modified")]
    MappingNotInvertible { type_name: TypeName, field: String },

    #[error("presentation type '{0}' is not editable")]
    NotEditable(TypeName),
}

impl ResolveError {
    pub fn field_not_found(type_name: impl Into<TypeName>, segment: impl Into<String>) -> Self {
        Self::FieldNotFound {
            type_name: type_name.into(),
            segment: segment.into(),
        }
    }

    pub fn segment_must_be_collection_id(segment: impl Into<String>) -> Self {
        Self::SegmentMustBeCollectionId {
            segment: segment.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EmptyPath | Self::UnknownType(_) | Self::FieldNotFound { .. }
        )
    }
}

impl ToValidationFailure for ResolveError {
    fn validation_code(&self) -> ValidationCode {
        match self {
            Self::EmptyPath | Self::UnknownType(_) | Self::FieldNotFound { .. } => {
                ValidationCode::PropertyDoesNotExist
            }
            Self::SegmentMustBeCollectionId { .. } => ValidationCode::SegmentMustBeCollectionId,
            Self::ExpressionNotComparable { .. }
            | Self::MappingNotInvertible { .. }
            | Self::NotEditable(_) => ValidationCode::CanNotCreateExpression,
        }
    }
}
