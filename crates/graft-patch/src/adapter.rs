//! Applies prepared operations to a [`GraphStore`] in one transaction.
//!
//! Elements are located by key with the smallest include path that reaches
//! them. Adding to a one-to-many collection inserts the child with its
//! foreign key set; adding to a many-to-many collection only writes the link
//! row for an existing member. Any failure rolls the whole document back.

use std::future::Future;
use std::pin::Pin;

use graft_core::{ScalarValue, TypeName};
use graft_mapping::{MappingRegistry, RelationKind, StorageSegment, Terminal};
use graft_storage::{FieldPath, GraphStore, Record, Transaction};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::convert::{EntityValue, FieldValue};
use crate::document::PatchOpKind;
use crate::error::{ApplyError, PatchError};
use crate::operation::{PreparedOperation, PreparedValue};
use crate::path::{CollectionHop, ElementKey, FieldTail, PatchPath};

/// What a committed document changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchOutcome {
    /// Keys of entities added to the root collection.
    pub created: Vec<ScalarValue>,
    pub inserted: usize,
    pub deleted: usize,
    pub linked: usize,
    pub unlinked: usize,
    pub updated: usize,
}

type OpResult<T> = Result<T, PatchError>;

/// An entity instance addressed by key.
#[derive(Debug, Clone, PartialEq)]
struct Located {
    entity: TypeName,
    key: ScalarValue,
    verified: bool,
}

pub struct GraphMutationAdapter<'r> {
    registry: &'r MappingRegistry,
}

impl<'r> GraphMutationAdapter<'r> {
    pub fn new(registry: &'r MappingRegistry) -> Self {
        Self { registry }
    }

    /// Apply `operations` in order inside one transaction.
    ///
    /// Cancellation is checked between operations only.
    pub async fn apply<S>(
        &self,
        store: &S,
        operations: &[PreparedOperation],
        cancel: &CancellationToken,
    ) -> Result<PatchOutcome, ApplyError>
    where
        S: GraphStore + ?Sized,
    {
        let mut tx = store.begin_transaction().await?;
        let mut outcome = PatchOutcome::default();

        for (applied, op) in operations.iter().enumerate() {
            if cancel.is_cancelled() {
                rollback(tx, "cancelled").await;
                tracing::warn!(applied, "patch document cancelled and rolled back");
                return Err(ApplyError::Cancelled { applied });
            }
            let span = tracing::debug_span!("patch_operation", index = op.index, op = %op.kind, path = %op.path.raw);
            let result = self
                .apply_one(tx.as_mut(), op, &mut outcome)
                .instrument(span)
                .await;
            if let Err(error) = result {
                rollback(tx, "operation failed").await;
                tracing::warn!(index = op.index, %error, "patch document rolled back");
                return Err(ApplyError::Operation {
                    index: op.index,
                    source: error,
                });
            }
        }

        tx.commit().await?;
        tracing::info!(
            operations = operations.len(),
            inserted = outcome.inserted,
            deleted = outcome.deleted,
            linked = outcome.linked,
            unlinked = outcome.unlinked,
            updated = outcome.updated,
            "patch document committed"
        );
        Ok(outcome)
    }

    async fn apply_one(
        &self,
        tx: &mut dyn Transaction,
        op: &PreparedOperation,
        outcome: &mut PatchOutcome,
    ) -> OpResult<()> {
        let path = &op.path;
        match (&path.tail, &op.value) {
            (Some(tail), PreparedValue::Field(value)) => {
                let owner = self.locate_field_owner(tx, path, tail).await?;
                if op.kind == PatchOpKind::Test {
                    self.test_field(tx, path, tail, &owner, value).await
                } else {
                    self.assign(tx, tail, &owner, value).await?;
                    outcome.updated += 1;
                    Ok(())
                }
            }
            (None, PreparedValue::Entity(value)) => match path.hops.split_last() {
                None => {
                    let key = insert_graph(tx, value.clone(), outcome).await?;
                    outcome.created.push(key);
                    Ok(())
                }
                Some((hop, outer)) => {
                    let parent = self.locate_element(tx, path, outer.len()).await?;
                    let owner = self.resolve_owner(tx, &parent, &hop.segments, true).await?;
                    self.add_to_collection(tx, hop, &owner, value, outcome).await
                }
            },
            (None, PreparedValue::None) if op.kind == PatchOpKind::Remove => {
                self.remove_element(tx, path, outcome).await
            }
            _ => Err(PatchError::invalid_target(
                op.kind,
                &path.raw,
                "operation does not apply to this path",
            )),
        }
    }

    async fn add_to_collection(
        &self,
        tx: &mut dyn Transaction,
        hop: &CollectionHop,
        owner: &Located,
        value: &EntityValue,
        outcome: &mut PatchOutcome,
    ) -> OpResult<()> {
        match &hop.relation {
            RelationKind::OneToMany { foreign_key } => {
                let mut child = value.clone();
                child.set_column(foreign_key.clone(), &owner.key);
                insert_graph(tx, child, outcome).await?;
            }
            RelationKind::ManyToMany { link_table, .. } => {
                let child = value.key.as_ref().ok_or_else(|| {
                    PatchError::conversion(&hop.field, format!("a member of '{}' is added by its key", hop.field))
                })?;
                load_required(tx, &hop.target, child, &[]).await?;
                if tx.link(link_table, &owner.key, child).await? {
                    outcome.linked += 1;
                }
            }
        }
        Ok(())
    }

    async fn remove_element(
        &self,
        tx: &mut dyn Transaction,
        path: &PatchPath,
        outcome: &mut PatchOutcome,
    ) -> OpResult<()> {
        let Some((hop, outer)) = path.hops.split_last() else {
            let root = self.locate_element(tx, path, 0).await?;
            load_required(tx, &root.entity, &root.key, &[]).await?;
            tx.delete(&root.entity, &root.key).await?;
            outcome.deleted += 1;
            return Ok(());
        };

        let parent = self.locate_element(tx, path, outer.len()).await?;
        let (owner, child) = self.enter_hop(tx, &parent, hop).await?;
        match &hop.relation {
            RelationKind::OneToMany { .. } => {
                tx.delete(&hop.target, &child).await?;
                outcome.deleted += 1;
            }
            RelationKind::ManyToMany { link_table, .. } => {
                if tx.unlink(link_table, &owner.key, &child).await? {
                    outcome.unlinked += 1;
                }
            }
        }
        Ok(())
    }

    async fn assign(
        &self,
        tx: &mut dyn Transaction,
        tail: &FieldTail,
        owner: &Located,
        value: &FieldValue,
    ) -> OpResult<()> {
        match (value, &tail.terminal) {
            (FieldValue::Scalar(value), _) => {
                tx.set_field(&owner.entity, &owner.key, &tail.last().name, value.clone())
                    .await?;
            }
            (FieldValue::Reference { target, key }, Terminal::Reference { foreign_key, .. }) => {
                if !key.is_null() {
                    load_required(tx, target, key, &[]).await?;
                }
                tx.set_field(&owner.entity, &owner.key, foreign_key, key.clone())
                    .await?;
            }
            _ => {
                return Err(PatchError::relation_misconfigured(format!(
                    "'{}' is not a reference",
                    tail.field
                )));
            }
        }
        Ok(())
    }

    async fn test_field(
        &self,
        tx: &mut dyn Transaction,
        path: &PatchPath,
        tail: &FieldTail,
        owner: &Located,
        expected: &FieldValue,
    ) -> OpResult<()> {
        let record = load_required(tx, &owner.entity, &owner.key, &[]).await?;
        let (column, expected) = match (expected, &tail.terminal) {
            (FieldValue::Scalar(value), _) => (tail.last().name.as_str(), value),
            (FieldValue::Reference { key, .. }, Terminal::Reference { foreign_key, .. }) => {
                (foreign_key.as_str(), key)
            }
            _ => {
                return Err(PatchError::relation_misconfigured(format!(
                    "'{}' is not a reference",
                    tail.field
                )));
            }
        };
        let kind = self
            .registry
            .entity(&owner.entity)
            .and_then(|e| e.scalar_kind(column))
            .ok_or_else(|| PatchError::relation_misconfigured(format!("{}.{column} is not a column", owner.entity)))?;
        let actual = kind
            .from_json(record.get(column).unwrap_or(&Value::Null))
            .map_err(|e| PatchError::conversion(&tail.field, e))?;

        let equal = match (actual.is_null(), expected.is_null()) {
            (true, true) => true,
            (false, false) => kind.compare(&actual, expected) == Some(std::cmp::Ordering::Equal),
            _ => false,
        };
        if equal {
            Ok(())
        } else {
            Err(PatchError::TestFailed {
                path: path.raw.clone(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }

    /// Element reached after the first `hops` collection hops of `path`.
    async fn locate_element(
        &self,
        tx: &mut dyn Transaction,
        path: &PatchPath,
        hops: usize,
    ) -> OpResult<Located> {
        let ElementKey::Id(root) = &path.root_key else {
            return Err(PatchError::invalid_target("locate", &path.raw, "'-' does not name an element"));
        };
        let mut current = Located {
            entity: path.root_entity.clone(),
            key: root.clone(),
            verified: false,
        };
        for hop in &path.hops[..hops] {
            let (_, child) = self.enter_hop(tx, &current, hop).await?;
            current = Located {
                entity: hop.target.clone(),
                key: child,
                verified: true,
            };
        }
        Ok(current)
    }

    /// Check that the hop's element belongs to the collection of `parent`.
    /// Returns the collection owner and the element key.
    async fn enter_hop(
        &self,
        tx: &mut dyn Transaction,
        parent: &Located,
        hop: &CollectionHop,
    ) -> OpResult<(Located, ScalarValue)> {
        let ElementKey::Id(child) = &hop.key else {
            return Err(PatchError::invalid_target("locate", &hop.field, "'-' does not name an element"));
        };
        let owner = self.resolve_owner(tx, parent, &hop.segments, false).await?;
        let collection = FieldPath::new([hop.collection().name.clone()]);
        let record = load_required(tx, &owner.entity, &owner.key, &[collection]).await?;

        let target = self
            .registry
            .entity(&hop.target)
            .ok_or_else(|| PatchError::relation_misconfigured(format!("unknown entity {}", hop.target)))?;
        let kind = target.key_kind();
        let member = match record.get(&hop.collection().name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.get(&target.key))
                .filter_map(|key| kind.from_json(key).ok())
                .any(|key| kind.compare(&key, child) == Some(std::cmp::Ordering::Equal)),
            _ => false,
        };
        if !member {
            return Err(PatchError::entity_not_found(&hop.target, child));
        }
        Ok((owner, child.clone()))
    }

    /// Follow the navigations before the last of `segments`, starting at
    /// `from`, to the entity that owns the last segment.
    async fn resolve_owner(
        &self,
        tx: &mut dyn Transaction,
        from: &Located,
        segments: &[StorageSegment],
        must_exist: bool,
    ) -> OpResult<Located> {
        let Some((last, navigations)) = segments.split_last() else {
            return Ok(from.clone());
        };
        if navigations.is_empty() {
            if must_exist && !from.verified {
                load_required(tx, &from.entity, &from.key, &[]).await?;
                return Ok(Located {
                    verified: true,
                    ..from.clone()
                });
            }
            return Ok(from.clone());
        }

        let include = FieldPath::new(navigations.iter().map(|s| s.name.clone()));
        let record = load_required(tx, &from.entity, &from.key, &[include]).await?;
        let mut node = &record;
        for navigation in navigations {
            node = node
                .get(&navigation.name)
                .and_then(Value::as_object)
                .ok_or_else(|| {
                    PatchError::entity_not_found(
                        format!("{}.{}", navigation.source_type, navigation.name),
                        &from.key,
                    )
                })?;
        }
        let owner = self
            .registry
            .entity(&last.source_type)
            .ok_or_else(|| PatchError::relation_misconfigured(format!("unknown entity {}", last.source_type)))?;
        let key = node
            .get(&owner.key)
            .map(|v| owner.key_kind().from_json(v))
            .transpose()
            .map_err(|e| PatchError::conversion(&owner.key, e))?
            .filter(|k| !k.is_null())
            .ok_or_else(|| PatchError::relation_misconfigured(format!("{} row without key", owner.name)))?;
        Ok(Located {
            entity: owner.name.clone(),
            key,
            verified: true,
        })
    }

    /// Owning entity of the field addressed by `tail`.
    async fn locate_field_owner(
        &self,
        tx: &mut dyn Transaction,
        path: &PatchPath,
        tail: &FieldTail,
    ) -> OpResult<Located> {
        let element = self.locate_element(tx, path, path.hops.len()).await?;
        self.resolve_owner(tx, &element, &tail.segments, true).await
    }
}

async fn load_required(
    tx: &mut dyn Transaction,
    entity: &str,
    key: &ScalarValue,
    includes: &[FieldPath],
) -> OpResult<Record> {
    tx.load(entity, key, includes)
        .await?
        .ok_or_else(|| PatchError::entity_not_found(entity, key))
}

/// Insert `value` and everything it owns; link its many-to-many members.
fn insert_graph<'a>(
    tx: &'a mut dyn Transaction,
    value: EntityValue,
    outcome: &'a mut PatchOutcome,
) -> Pin<Box<dyn Future<Output = OpResult<ScalarValue>> + Send + 'a>> {
    Box::pin(async move {
        for reference in &value.references {
            load_required(tx, &reference.target, &reference.key, &[]).await?;
        }
        let key = tx.insert(&value.entity, value.columns).await?;
        outcome.inserted += 1;

        for collection in value.children {
            match &collection.relation {
                RelationKind::OneToMany { foreign_key } => {
                    for mut child in collection.elements {
                        child.set_column(foreign_key.clone(), &key);
                        insert_graph(tx, child, outcome).await?;
                    }
                }
                RelationKind::ManyToMany { link_table, .. } => {
                    for member in collection.elements {
                        let member_key = member.key.ok_or_else(|| {
                            PatchError::conversion(
                                &collection.field,
                                format!("a member of '{}' is added by its key", collection.field),
                            )
                        })?;
                        load_required(tx, &collection.target, &member_key, &[]).await?;
                        if tx.link(link_table, &key, &member_key).await? {
                            outcome.linked += 1;
                        }
                    }
                }
            }
        }
        tracing::trace!(entity = %value.entity, key = %key, "entity graph inserted");
        Ok(key)
    })
}

async fn rollback(tx: Box<dyn Transaction>, reason: &str) {
    if let Err(e) = tx.rollback().await {
        tracing::error!(reason, error = %e, "rollback failed");
    }
}
