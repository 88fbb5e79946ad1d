//! In-memory [`GraphStore`](graft_storage::GraphStore) backend.
//!
//! Rows are kept per entity with link tables for many-to-many relations.
//! Reads materialize only the requested navigations; writes are staged per
//! transaction and become visible atomically on commit.

mod graph;
mod storage;
mod tables;
mod transaction;

pub use storage::InMemoryStorage;
pub use tables::{StorageKey, Tables};
pub use transaction::MemoryTransaction;
