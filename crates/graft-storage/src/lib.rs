//! Storage abstraction for Graft.
//!
//! The engines talk to persistence only through [`QuerySource`] (reads) and
//! [`GraphStore`] / [`Transaction`] (all-or-nothing writes). Queries are
//! expressed in storage vocabulary with [`Predicate`] and [`SortKey`].

pub mod error;
pub mod query;
pub mod traits;
pub mod types;

pub use error::{ErrorCategory, StorageError};
pub use query::{
    CompareOp, FieldPath, IncludePath, Predicate, SortDirection, SortKey, StorageQuery,
    normalize_includes, sort_records, values_at,
};
pub use traits::{GraphStore, QuerySource, Transaction};
pub use types::{QueryResult, Record, into_record};
