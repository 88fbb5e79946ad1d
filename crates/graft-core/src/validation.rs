//! Client-visible validation failures.
//!
//! Failures are grouped by the request field that caused them, e.g.
//! `filter[0]` or `operations[2]`, and serialize as
//! `{ "filter[0]": [ { "message": "...", "code": "PropertyDoesNotExist" } ] }`.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationCode {
    PropertyDoesNotExist,
    ExpressionIsUndefined,
    PropertyIsNotFilterable,
    CanNotCreateExpression,
    SegmentMustBeCollectionId,
    EntityNotFound,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PropertyDoesNotExist => "PropertyDoesNotExist",
            Self::ExpressionIsUndefined => "ExpressionIsUndefined",
            Self::PropertyIsNotFilterable => "PropertyIsNotFilterable",
            Self::CanNotCreateExpression => "CanNotCreateExpression",
            Self::SegmentMustBeCollectionId => "SegmentMustBeCollectionId",
            Self::EntityNotFound => "EntityNotFound",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub message: String,
    pub code: ValidationCode,
}

impl ValidationFailure {
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

/// Errors that surface to clients as a [`ValidationFailure`].
pub trait ToValidationFailure {
    fn validation_code(&self) -> ValidationCode;

    fn to_validation_failure(&self) -> ValidationFailure
    where
        Self: fmt::Display,
    {
        ValidationFailure::new(self.validation_code(), self.to_string())
    }
}

/// Field name of the `index`-th entry of a request list, e.g. `filter[3]`.
pub fn indexed_field(list: &str, index: usize) -> String {
    format!("{list}[{index}]")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: IndexMap<String, Vec<ValidationFailure>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, failure: ValidationFailure) -> Self {
        let mut errors = Self::new();
        errors.add(field, failure);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, failure: ValidationFailure) {
        self.errors.entry(field.into()).or_default().push(failure);
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, failures) in other.errors {
            self.errors.entry(field).or_default().extend(failures);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of fields with at least one failure.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: &str) -> Option<&[ValidationFailure]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn first_code(&self, field: &str) -> Option<ValidationCode> {
        self.get(field).and_then(|f| f.first()).map(|f| f.code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ValidationFailure])> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, failures) in &self.errors {
            for failure in failures {
                if !first {
                    write!(f, "; ")?;
                }
                first = false;
                write!(f, "{field}: {} ({})", failure.message, failure.code)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
