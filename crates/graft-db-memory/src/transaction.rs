//! Staged transactions.
//!
//! A transaction works on a private copy of the tables taken at begin, so it
//! reads its own writes, and records every write as a [`Change`]. Commit
//! replays the changes onto a copy of the current shared tables and swaps it
//! in under the write lock; a replay failure leaves the shared tables intact.

use std::sync::Arc;

use async_trait::async_trait;
use graft_core::{ScalarValue, next_key};
use graft_mapping::{EntityDef, RelationKind, StorageFieldKind, StorageSchema};
use graft_storage::{IncludePath, Record, StorageError, Transaction};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::storage::{load_from, make_storage_key};
use crate::tables::{Change, Tables};

pub struct MemoryTransaction {
    id: Uuid,
    schema: Arc<StorageSchema>,
    shared: Arc<RwLock<Tables>>,
    working: Tables,
    changes: Vec<Change>,
}

impl MemoryTransaction {
    pub(crate) fn new(schema: Arc<StorageSchema>, shared: Arc<RwLock<Tables>>, snapshot: Tables) -> Self {
        let id = Uuid::new_v4();
        tracing::trace!(transaction = %id, "transaction started");
        Self {
            id,
            schema,
            shared,
            working: snapshot,
            changes: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn entity(&self, name: &str) -> Result<&EntityDef, StorageError> {
        self.schema
            .entity(name)
            .ok_or_else(|| StorageError::unknown_type(name))
    }

    fn stage(&mut self, change: Change) -> Result<(), StorageError> {
        self.working.apply(&self.schema, &change)?;
        self.changes.push(change);
        Ok(())
    }

    fn is_link_table(&self, table: &str) -> bool {
        self.schema.entities().flat_map(EntityDef::fields).any(|field| {
            matches!(
                &field.kind,
                StorageFieldKind::Collection {
                    relation: RelationKind::ManyToMany { link_table, .. },
                    ..
                } if link_table == table
            )
        })
    }

    fn link_change(
        &self,
        table: &str,
        parent: &ScalarValue,
        child: &ScalarValue,
        add: bool,
    ) -> Result<Option<Change>, StorageError> {
        if !self.is_link_table(table) {
            return Err(StorageError::unknown_type(table));
        }
        let parent = make_storage_key(parent);
        let child = make_storage_key(child);
        let exists = self.working.has_link(table, &parent, &child);
        let change = match (add, exists) {
            (true, false) => Change::Link {
                table: table.to_string(),
                parent,
                child,
            },
            (false, true) => Change::Unlink {
                table: table.to_string(),
                parent,
                child,
            },
            _ => return Ok(None),
        };
        Ok(Some(change))
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut shared = self.shared.write().await;
        let mut next = shared.clone();
        for change in &self.changes {
            next.apply(&self.schema, change).map_err(|e| {
                StorageError::transaction_error(format!("commit of {} failed: {e}", self.id))
            })?;
        }
        *shared = next;
        tracing::debug!(transaction = %self.id, changes = self.changes.len(), "transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        tracing::debug!(transaction = %self.id, discarded = self.changes.len(), "transaction rolled back");
        Ok(())
    }

    async fn load(
        &self,
        entity: &str,
        key: &ScalarValue,
        includes: &[IncludePath],
    ) -> Result<Option<Record>, StorageError> {
        load_from(&self.schema, &self.working, entity, key, includes)
    }

    async fn insert(&mut self, entity: &str, mut record: Record) -> Result<ScalarValue, StorageError> {
        let def = self.entity(entity)?.clone();
        for (name, value) in &record {
            match def.field(name).map(|f| &f.kind) {
                Some(StorageFieldKind::Scalar(_)) => {}
                Some(_) => {
                    return Err(StorageError::invalid_record(format!(
                        "'{entity}.{name}' is a navigation and cannot be stored as a column"
                    )));
                }
                None if value.is_null() => {}
                None => {
                    return Err(StorageError::invalid_record(format!(
                        "'{entity}' has no field '{name}'"
                    )));
                }
            }
        }

        let key_kind = def.key_kind();
        let key = match record.get(&def.key) {
            Some(value) if !value.is_null() => key_kind
                .from_json(value)
                .map_err(|e| StorageError::invalid_record(e.to_string()))?,
            _ => {
                let existing: Vec<ScalarValue> = self
                    .working
                    .rows(entity)
                    .filter_map(|row| row.get(&def.key))
                    .filter_map(|value| key_kind.from_json(value).ok())
                    .collect();
                next_key(key_kind, &existing).map_err(|e| StorageError::internal(e.to_string()))?
            }
        };
        record.insert(def.key.clone(), key.to_json());

        self.stage(Change::Insert {
            entity: entity.to_string(),
            key: make_storage_key(&key),
            record,
        })?;
        Ok(key)
    }

    async fn set_field(
        &mut self,
        entity: &str,
        key: &ScalarValue,
        field: &str,
        value: ScalarValue,
    ) -> Result<(), StorageError> {
        let def = self.entity(entity)?;
        if field == def.key {
            return Err(StorageError::invalid_record(format!(
                "key '{entity}.{field}' cannot be reassigned"
            )));
        }
        if def.scalar_kind(field).is_none() {
            return Err(StorageError::invalid_record(format!(
                "'{entity}.{field}' is not a scalar column"
            )));
        }
        self.stage(Change::SetField {
            entity: entity.to_string(),
            key: make_storage_key(key),
            field: field.to_string(),
            value: value.to_json(),
        })
    }

    async fn delete(&mut self, entity: &str, key: &ScalarValue) -> Result<(), StorageError> {
        self.entity(entity)?;
        self.stage(Change::Delete {
            entity: entity.to_string(),
            key: make_storage_key(key),
        })
    }

    async fn link(
        &mut self,
        link_table: &str,
        parent: &ScalarValue,
        child: &ScalarValue,
    ) -> Result<bool, StorageError> {
        match self.link_change(link_table, parent, child, true)? {
            Some(change) => self.stage(change).map(|()| true),
            None => Ok(false),
        }
    }

    async fn unlink(
        &mut self,
        link_table: &str,
        parent: &ScalarValue,
        child: &ScalarValue,
    ) -> Result<bool, StorageError> {
        match self.link_change(link_table, parent, child, false)? {
            Some(change) => self.stage(change).map(|()| true),
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("id", &self.id)
            .field("changes", &self.changes.len())
            .finish()
    }
}
