//! Field mapping between presentation DTOs and storage entities.
//!
//! The [`MappingRegistry`] is built once from entity and DTO declarations,
//! validated, and then shared immutably (`Arc<MappingRegistry>`). The
//! [`resolver`] walks dotted presentation paths over it.

pub mod error;
pub mod filterable;
pub mod presentation;
pub mod registry;
pub mod resolver;
pub mod schema;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use error::{RegistryError, ResolveError};
pub use filterable::{ComparisonStrategy, FilterableDescriptor, FilterableMetadata};
pub use presentation::{DtoDef, DtoField, FieldSource, MemberPath};
pub use registry::{FieldMapping, MappingRegistry, RegistryBuilder};
pub use resolver::{ResolvedPath, StorageSegment, Terminal, resolve, resolve_field};
pub use schema::{EntityDef, RelationKind, StorageField, StorageFieldKind, StorageSchema};
