pub mod error;
pub mod id;
pub mod time;
pub mod validation;
pub mod value;

pub use error::{CoreError, ErrorCategory, Result};
pub use id::{generate_id, next_key};
pub use validation::{
    ToValidationFailure, ValidationCode, ValidationErrors, ValidationFailure, indexed_field,
};
pub use value::{ScalarKind, ScalarValue};

/// Type name of a storage entity or presentation DTO.
pub type TypeName = String;
