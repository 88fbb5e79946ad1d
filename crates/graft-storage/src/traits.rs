//! Storage traits consumed by the search and patch engines.
//!
//! Backends know their storage schema: they materialize navigations for
//! include paths, generate keys, and cascade deletes to owned children.

use async_trait::async_trait;
use graft_core::ScalarValue;

use crate::error::StorageError;
use crate::query::{IncludePath, StorageQuery};
use crate::types::{QueryResult, Record};

/// Read-only access to stored entities.
///
/// # Example
///
/// ```ignore
/// use graft_storage::{QuerySource, StorageError};
///
/// async fn order(source: &dyn QuerySource, key: &ScalarValue) -> Result<Record, StorageError> {
///     source
///         .load("Order", key, &[])
///         .await?
///         .ok_or_else(|| StorageError::not_found("Order", key))
/// }
/// ```
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// Runs a query: filter, stable sort, then page.
    ///
    /// Only the navigations named in `query.includes` are materialized on the
    /// returned records.
    async fn query(&self, query: &StorageQuery) -> Result<QueryResult, StorageError>;

    /// Loads one entity by key with the given navigations materialized.
    ///
    /// Returns `None` if the entity does not exist.
    async fn load(
        &self,
        entity: &str,
        key: &ScalarValue,
        includes: &[IncludePath],
    ) -> Result<Option<Record>, StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// A query source that can also be mutated transactionally.
#[async_trait]
pub trait GraphStore: QuerySource {
    /// Begins a new transaction.
    ///
    /// Writes made through the transaction are invisible to other readers
    /// until `commit` succeeds.
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>, StorageError>;
}

/// An all-or-nothing unit of graph mutations.
///
/// If an error occurs or `rollback` is called, every operation is undone.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Commits all operations in this transaction.
    ///
    /// After commit, the transaction is consumed and cannot be used again.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Rolls back all operations in this transaction.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;

    /// Loads an entity as this transaction sees it, including its own writes.
    async fn load(
        &self,
        entity: &str,
        key: &ScalarValue,
        includes: &[IncludePath],
    ) -> Result<Option<Record>, StorageError>;

    /// Inserts one row (scalar columns only). A missing key is generated.
    ///
    /// Returns the key of the inserted row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the key is taken.
    async fn insert(&mut self, entity: &str, record: Record) -> Result<ScalarValue, StorageError>;

    /// Assigns one scalar column of an existing row.
    async fn set_field(
        &mut self,
        entity: &str,
        key: &ScalarValue,
        field: &str,
        value: ScalarValue,
    ) -> Result<(), StorageError>;

    /// Deletes a row, its one-to-many children and its link rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row does not exist.
    async fn delete(&mut self, entity: &str, key: &ScalarValue) -> Result<(), StorageError>;

    /// Adds a link row. Returns `false` if it already existed.
    async fn link(
        &mut self,
        link_table: &str,
        parent: &ScalarValue,
        child: &ScalarValue,
    ) -> Result<bool, StorageError>;

    /// Removes a link row. Returns `false` if there was none.
    async fn unlink(
        &mut self,
        link_table: &str,
        parent: &ScalarValue,
        child: &ScalarValue,
    ) -> Result<bool, StorageError>;
}
