//! JSON Patch documents applied to entity graphs.
//!
//! A document is addressed to an edit DTO. Paths name elements by domain
//! key (`/10/lines/100/quantity`, `/10/tags/-`), values are converted
//! through the mapping registry, and all operations of a document run in a
//! single storage transaction.

pub mod adapter;
pub mod convert;
pub mod document;
pub mod engine;
pub mod error;
pub mod operation;
pub mod path;

pub use adapter::{GraphMutationAdapter, PatchOutcome};
pub use convert::{ChildCollection, EntityValue, FieldValue, ReferenceValue, ValueConverter};
pub use document::{PatchDocument, PatchOp, PatchOpKind};
pub use engine::{PatchConfig, PatchEngine};
pub use error::{ApplyError, PatchError};
pub use operation::{PreparedOperation, PreparedValue, prepare_operation};
pub use path::{CollectionHop, ElementKey, FieldTail, PatchPath, resolve_patch_path};
