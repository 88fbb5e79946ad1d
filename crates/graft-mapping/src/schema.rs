//! Storage model: entities, their scalar fields and their relations.

use graft_core::{ScalarKind, TypeName};
use indexmap::IndexMap;

use crate::error::RegistryError;

/// How a collection's members are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// Children carry `foreign_key` pointing at the parent key and are owned
    /// by the parent.
    OneToMany { foreign_key: String },
    /// Membership rows `(parent_column, child_column)` in `link_table`.
    /// Members exist independently of the parent.
    ManyToMany {
        link_table: String,
        parent_column: String,
        child_column: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageFieldKind {
    Scalar(ScalarKind),
    /// Single-valued navigation resolved through `foreign_key` on the same
    /// entity.
    Reference {
        target: TypeName,
        foreign_key: String,
    },
    Collection {
        target: TypeName,
        relation: RelationKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageField {
    pub name: String,
    pub kind: StorageFieldKind,
}

impl StorageField {
    pub fn scalar_kind(&self) -> Option<&ScalarKind> {
        match &self.kind {
            StorageFieldKind::Scalar(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, StorageFieldKind::Collection { .. })
    }
}

/// A persisted entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    pub name: TypeName,
    pub key: String,
    fields: IndexMap<String, StorageField>,
}

impl EntityDef {
    /// New entity whose key field is `key` of kind `key_kind`.
    pub fn new(name: impl Into<TypeName>, key: impl Into<String>, key_kind: ScalarKind) -> Self {
        let key = key.into();
        let mut fields = IndexMap::new();
        fields.insert(
            key.clone(),
            StorageField {
                name: key.clone(),
                kind: StorageFieldKind::Scalar(key_kind),
            },
        );
        Self {
            name: name.into(),
            key,
            fields,
        }
    }

    fn with_field(mut self, name: impl Into<String>, kind: StorageFieldKind) -> Self {
        let name = name.into();
        self.fields.insert(name.clone(), StorageField { name, kind });
        self
    }

    pub fn scalar(self, name: impl Into<String>, kind: ScalarKind) -> Self {
        self.with_field(name, StorageFieldKind::Scalar(kind))
    }

    pub fn reference(
        self,
        name: impl Into<String>,
        target: impl Into<TypeName>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.with_field(
            name,
            StorageFieldKind::Reference {
                target: target.into(),
                foreign_key: foreign_key.into(),
            },
        )
    }

    pub fn one_to_many(
        self,
        name: impl Into<String>,
        target: impl Into<TypeName>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.with_field(
            name,
            StorageFieldKind::Collection {
                target: target.into(),
                relation: RelationKind::OneToMany {
                    foreign_key: foreign_key.into(),
                },
            },
        )
    }

    pub fn many_to_many(
        self,
        name: impl Into<String>,
        target: impl Into<TypeName>,
        link_table: impl Into<String>,
        parent_column: impl Into<String>,
        child_column: impl Into<String>,
    ) -> Self {
        self.with_field(
            name,
            StorageFieldKind::Collection {
                target: target.into(),
                relation: RelationKind::ManyToMany {
                    link_table: link_table.into(),
                    parent_column: parent_column.into(),
                    child_column: child_column.into(),
                },
            },
        )
    }

    pub fn field(&self, name: &str) -> Option<&StorageField> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &StorageField> {
        self.fields.values()
    }

    pub fn key_kind(&self) -> &ScalarKind {
        self.fields
            .get(&self.key)
            .and_then(StorageField::scalar_kind)
            .unwrap_or(&ScalarKind::Int32)
    }

    pub fn scalar_kind(&self, name: &str) -> Option<&ScalarKind> {
        self.field(name).and_then(StorageField::scalar_kind)
    }
}

/// All storage entities known to the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSchema {
    entities: IndexMap<TypeName, EntityDef>,
}

impl StorageSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntityDef) -> Result<(), RegistryError> {
        if self.entities.contains_key(&entity.name) {
            return Err(RegistryError::DuplicateType(entity.name));
        }
        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.entities.values()
    }

    /// Check that every relation points at real entities and key-compatible
    /// scalar columns.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for entity in self.entities.values() {
            if entity.scalar_kind(&entity.key).is_none() {
                return Err(RegistryError::invalid_relation(
                    &entity.name,
                    &entity.key,
                    "key field must be a scalar",
                ));
            }
            for field in entity.fields() {
                self.validate_field(entity, field)?;
            }
        }
        Ok(())
    }

    fn validate_field(&self, entity: &EntityDef, field: &StorageField) -> Result<(), RegistryError> {
        match &field.kind {
            StorageFieldKind::Scalar(_) => Ok(()),
            StorageFieldKind::Reference { target, foreign_key } => {
                let target_def = self.require(entity, field, target)?;
                match entity.scalar_kind(foreign_key) {
                    Some(kind) if key_compatible(kind, target_def.key_kind()) => Ok(()),
                    Some(_) => Err(RegistryError::invalid_relation(
                        &entity.name,
                        &field.name,
                        format!("foreign key '{foreign_key}' does not match the key of '{target}'"),
                    )),
                    None => Err(RegistryError::invalid_relation(
                        &entity.name,
                        &field.name,
                        format!("foreign key '{foreign_key}' is not a scalar field"),
                    )),
                }
            }
            StorageFieldKind::Collection { target, relation } => {
                let target_def = self.require(entity, field, target)?;
                match relation {
                    RelationKind::OneToMany { foreign_key } => match target_def
                        .scalar_kind(foreign_key)
                    {
                        Some(kind) if key_compatible(kind, entity.key_kind()) => Ok(()),
                        _ => Err(RegistryError::invalid_relation(
                            &entity.name,
                            &field.name,
                            format!(
                                "'{target}.{foreign_key}' is not a scalar matching the key of '{}'",
                                entity.name
                            ),
                        )),
                    },
                    RelationKind::ManyToMany {
                        link_table,
                        parent_column,
                        child_column,
                    } => {
                        if link_table.is_empty() || parent_column.is_empty() || child_column.is_empty()
                        {
                            return Err(RegistryError::invalid_relation(
                                &entity.name,
                                &field.name,
                                "link table and columns must be named",
                            ));
                        }
                        if parent_column == child_column {
                            return Err(RegistryError::invalid_relation(
                                &entity.name,
                                &field.name,
                                "link columns must differ",
                            ));
                        }
                        Ok(())
                    }
                }
            }
        }
    }

    fn require(
        &self,
        entity: &EntityDef,
        field: &StorageField,
        target: &str,
    ) -> Result<&EntityDef, RegistryError> {
        self.entity(target).ok_or_else(|| {
            RegistryError::invalid_relation(
                &entity.name,
                &field.name,
                format!("unknown target entity '{target}'"),
            )
        })
    }
}

fn key_compatible(column: &ScalarKind, key: &ScalarKind) -> bool {
    let integral = |k: &ScalarKind| matches!(k, ScalarKind::Int32 | ScalarKind::Int64);
    column == key || (integral(column) && integral(key))
}
