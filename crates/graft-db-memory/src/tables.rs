use std::collections::HashMap;

use graft_core::TypeName;
use graft_mapping::{EntityDef, RelationKind, StorageFieldKind, StorageSchema};
use graft_storage::{Record, StorageError};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

pub type StorageKey = String;

/// Canonical key string of a stored JSON scalar.
pub(crate) fn json_key(value: &Value) -> Option<StorageKey> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn record_key(entity: &EntityDef, record: &Record) -> Option<StorageKey> {
    record.get(&entity.key).and_then(json_key)
}

/// One staged write, replayed onto the shared tables at commit.
#[derive(Debug, Clone)]
pub(crate) enum Change {
    Insert {
        entity: TypeName,
        key: StorageKey,
        record: Record,
    },
    SetField {
        entity: TypeName,
        key: StorageKey,
        field: String,
        value: Value,
    },
    Delete {
        entity: TypeName,
        key: StorageKey,
    },
    Link {
        table: String,
        parent: StorageKey,
        child: StorageKey,
    },
    Unlink {
        table: String,
        parent: StorageKey,
        child: StorageKey,
    },
}

/// Rows per entity (in insertion order) and link rows per link table.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    rows: HashMap<TypeName, IndexMap<StorageKey, Record>>,
    links: HashMap<String, IndexSet<(StorageKey, StorageKey)>>,
}

impl Tables {
    pub fn rows(&self, entity: &str) -> impl Iterator<Item = &Record> {
        self.rows.get(entity).into_iter().flat_map(|t| t.values())
    }

    pub fn row(&self, entity: &str, key: &str) -> Option<&Record> {
        self.rows.get(entity).and_then(|t| t.get(key))
    }

    pub fn row_count(&self, entity: &str) -> usize {
        self.rows.get(entity).map_or(0, IndexMap::len)
    }

    pub fn links(&self, table: &str) -> impl Iterator<Item = &(StorageKey, StorageKey)> {
        self.links.get(table).into_iter().flat_map(|t| t.iter())
    }

    pub fn has_link(&self, table: &str, parent: &str, child: &str) -> bool {
        self.links
            .get(table)
            .is_some_and(|t| t.contains(&(parent.to_string(), child.to_string())))
    }

    pub(crate) fn apply(&mut self, schema: &StorageSchema, change: &Change) -> Result<(), StorageError> {
        match change {
            Change::Insert {
                entity,
                key,
                record,
            } => {
                let table = self.rows.entry(entity.clone()).or_default();
                if table.contains_key(key) {
                    return Err(StorageError::already_exists(entity, key));
                }
                table.insert(key.clone(), record.clone());
                Ok(())
            }
            Change::SetField {
                entity,
                key,
                field,
                value,
            } => {
                let row = self
                    .rows
                    .get_mut(entity)
                    .and_then(|t| t.get_mut(key))
                    .ok_or_else(|| StorageError::not_found(entity, key))?;
                row.insert(field.clone(), value.clone());
                Ok(())
            }
            Change::Delete { entity, key } => self.delete_cascade(schema, entity, key),
            Change::Link {
                table,
                parent,
                child,
            } => {
                self.links
                    .entry(table.clone())
                    .or_default()
                    .insert((parent.clone(), child.clone()));
                Ok(())
            }
            Change::Unlink {
                table,
                parent,
                child,
            } => {
                if let Some(links) = self.links.get_mut(table) {
                    links.shift_remove(&(parent.clone(), child.clone()));
                }
                Ok(())
            }
        }
    }

    /// Delete a row together with its one-to-many children (recursively) and
    /// every link row it takes part in.
    fn delete_cascade(&mut self, schema: &StorageSchema, entity: &str, key: &str) -> Result<(), StorageError> {
        let def = schema
            .entity(entity)
            .ok_or_else(|| StorageError::unknown_type(entity))?;
        self.rows
            .get_mut(entity)
            .and_then(|t| t.shift_remove(key))
            .ok_or_else(|| StorageError::not_found(entity, key))?;

        for field in def.fields() {
            let StorageFieldKind::Collection { target, relation } = &field.kind else {
                continue;
            };
            match relation {
                RelationKind::OneToMany { foreign_key } => {
                    let children: Vec<StorageKey> = self
                        .rows
                        .get(target)
                        .into_iter()
                        .flat_map(|t| t.iter())
                        .filter(|(_, child)| child.get(foreign_key).and_then(json_key).as_deref() == Some(key))
                        .map(|(child_key, _)| child_key.clone())
                        .collect();
                    for child in children {
                        self.delete_cascade(schema, target, &child)?;
                    }
                }
                RelationKind::ManyToMany { link_table, .. } => {
                    if let Some(links) = self.links.get_mut(link_table) {
                        links.retain(|(parent, _)| parent != key);
                    }
                }
            }
        }

        for owner in schema.entities() {
            for field in owner.fields() {
                if let StorageFieldKind::Collection {
                    target,
                    relation: RelationKind::ManyToMany { link_table, .. },
                } = &field.kind
                    && target == entity
                    && let Some(links) = self.links.get_mut(link_table)
                {
                    links.retain(|(_, child)| child != key);
                }
            }
        }
        Ok(())
    }
}
