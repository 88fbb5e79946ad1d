use std::sync::Arc;

use async_trait::async_trait;
use graft_core::ScalarValue;
use graft_mapping::{MappingRegistry, StorageSchema};
use graft_storage::{
    GraphStore, IncludePath, QueryResult, QuerySource, Record, StorageError, StorageQuery,
    Transaction, sort_records,
};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::graph::materialize;
use crate::tables::{Change, StorageKey, Tables, json_key};
use crate::transaction::MemoryTransaction;

pub(crate) fn make_storage_key(key: &ScalarValue) -> StorageKey {
    key.to_string()
}

/// In-memory graph store.
///
/// This storage implementation provides:
/// - Rows per entity plus link tables for many-to-many relations
/// - Navigation materialization for include paths
/// - Staged transactions applied atomically on commit
/// - Cascading deletes of owned children
#[derive(Debug, Clone)]
pub struct InMemoryStorage {
    pub(crate) schema: Arc<StorageSchema>,
    pub(crate) tables: Arc<RwLock<Tables>>,
}

impl InMemoryStorage {
    pub fn new(schema: StorageSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            tables: Arc::new(RwLock::new(Tables::default())),
        }
    }

    /// Storage for the entities declared in `registry`.
    pub fn for_registry(registry: &MappingRegistry) -> Self {
        Self::new(registry.storage().clone())
    }

    pub fn schema(&self) -> &StorageSchema {
        &self.schema
    }

    /// Insert a row outside any transaction.
    pub async fn seed(&self, entity: &str, value: Value) -> Result<(), StorageError> {
        let def = self
            .schema
            .entity(entity)
            .ok_or_else(|| StorageError::unknown_type(entity))?;
        let Value::Object(record) = value else {
            return Err(StorageError::invalid_record("seed rows must be objects"));
        };
        let key = record
            .get(&def.key)
            .and_then(json_key)
            .ok_or_else(|| StorageError::invalid_record(format!("seed row of '{entity}' has no key")))?;
        let change = Change::Insert {
            entity: entity.to_string(),
            key,
            record,
        };
        self.tables.write().await.apply(&self.schema, &change)
    }

    /// Insert a link row outside any transaction.
    pub async fn seed_link(&self, table: &str, parent: &Value, child: &Value) -> Result<(), StorageError> {
        let (Some(parent), Some(child)) = (json_key(parent), json_key(child)) else {
            return Err(StorageError::invalid_record("link keys must be scalars"));
        };
        let change = Change::Link {
            table: table.to_string(),
            parent,
            child,
        };
        self.tables.write().await.apply(&self.schema, &change)
    }

    pub async fn row_count(&self, entity: &str) -> usize {
        self.tables.read().await.row_count(entity)
    }

    pub async fn link_count(&self, table: &str) -> usize {
        self.tables.read().await.links(table).count()
    }

    pub async fn has_link(&self, table: &str, parent: &ScalarValue, child: &ScalarValue) -> bool {
        self.tables
            .read()
            .await
            .has_link(table, &make_storage_key(parent), &make_storage_key(child))
    }
}

/// Load one row with includes from a table snapshot.
pub(crate) fn load_from(
    schema: &StorageSchema,
    tables: &Tables,
    entity: &str,
    key: &ScalarValue,
    includes: &[IncludePath],
) -> Result<Option<Record>, StorageError> {
    if schema.entity(entity).is_none() {
        return Err(StorageError::unknown_type(entity));
    }
    match tables.row(entity, &make_storage_key(key)) {
        Some(row) => materialize(schema, tables, entity, row, includes).map(Some),
        None => Ok(None),
    }
}

#[async_trait]
impl QuerySource for InMemoryStorage {
    async fn query(&self, query: &StorageQuery) -> Result<QueryResult, StorageError> {
        if self.schema.entity(&query.entity).is_none() {
            return Err(StorageError::unknown_type(&query.entity));
        }
        let tables = self.tables.read().await;

        let mut matched = Vec::new();
        for row in tables.rows(&query.entity) {
            let graph = materialize(&self.schema, &tables, &query.entity, row, &query.includes)?;
            if query.matches(&graph) {
                matched.push(graph);
            }
        }
        sort_records(&query.sort, &mut matched);

        let total = matched.len();
        let page: Vec<Record> = matched
            .into_iter()
            .skip(query.offset)
            .take(query.count.unwrap_or(usize::MAX))
            .collect();

        tracing::debug!(
            entity = %query.entity,
            total,
            returned = page.len(),
            includes = query.includes.len(),
            "in-memory query executed"
        );
        Ok(QueryResult::new(total, page, query.offset))
    }

    async fn load(
        &self,
        entity: &str,
        key: &ScalarValue,
        includes: &[IncludePath],
    ) -> Result<Option<Record>, StorageError> {
        let tables = self.tables.read().await;
        load_from(&self.schema, &tables, entity, key, includes)
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}

#[async_trait]
impl GraphStore for InMemoryStorage {
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>, StorageError> {
        let snapshot = self.tables.read().await.clone();
        Ok(Box::new(MemoryTransaction::new(
            self.schema.clone(),
            self.tables.clone(),
            snapshot,
        )))
    }
}
