//! List request compilation for Graft presentation types.
//!
//! Filter tokens (`key:v1,v2`, `key!:v`, `key:from..to`) and order tokens
//! (`key`, `key desc`) are resolved through the [`MappingRegistry`] into a
//! storage [`Predicate`](graft_storage::Predicate) and
//! [`SortKey`](graft_storage::SortKey)s. Every failure is reported before any
//! storage access.
//!
//! [`MappingRegistry`]: graft_mapping::MappingRegistry

pub mod engine;
pub mod error;
pub mod filter;
pub mod order;
pub mod parser;
pub mod query;

pub use engine::{EngineError, SearchConfig, SearchEngine};
pub use error::SearchError;
pub use filter::{CompiledFilter, compile_filter};
pub use order::{CompiledOrder, compile_order};
pub use parser::{
    FilterMode, FilterToken, OrderDirection, OrderToken, ValueAtom, parse_filter, parse_order,
    parse_value_atoms,
};
pub use query::{CompiledQuery, ListRequest};
