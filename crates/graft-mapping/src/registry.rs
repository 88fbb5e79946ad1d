//! Field mapping registry.
//!
//! Built once at startup from explicit declarations and immutable afterwards.
//! Every `(presentation type, field)` pair is pre-resolved to its storage
//! segments so that request-time resolution is plain lookups.

use std::collections::HashMap;

use graft_core::TypeName;
use indexmap::IndexMap;

use crate::error::{RegistryError, ResolveError};
use crate::filterable::{ComparisonStrategy, FilterableDescriptor, FilterableMetadata};
use crate::presentation::{DtoDef, DtoField, FieldSource, MemberPath};
use crate::resolver::{StorageSegment, Terminal};
use crate::schema::{EntityDef, StorageFieldKind, StorageSchema};

/// Resolved mapping of one presentation field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub presentation_type: TypeName,
    pub presentation_field: String,
    pub storage_type: TypeName,
    pub source: FieldSource,
    /// Storage hops of the member; the last one is the mapped field itself.
    pub segments: Vec<StorageSegment>,
    pub terminal: Terminal,
    pub nested: Option<TypeName>,
    /// Member receiving writes. Only set on editable types.
    pub inverse: Option<MemberPath>,
}

impl FieldMapping {
    pub fn is_computed(&self) -> bool {
        matches!(self.source, FieldSource::Computed { .. })
    }

    /// Entity that owns the terminal storage field.
    pub fn terminal_owner(&self) -> &str {
        self.segments
            .last()
            .map(|s| s.source_type.as_str())
            .unwrap_or(&self.storage_type)
    }
}

#[derive(Debug)]
pub struct MappingRegistry {
    storage: StorageSchema,
    dtos: IndexMap<TypeName, DtoDef>,
    mappings: HashMap<TypeName, IndexMap<String, FieldMapping>>,
    folded: HashMap<TypeName, HashMap<String, String>>,
    filterable: FilterableMetadata,
    case_insensitive: bool,
}

impl MappingRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn storage(&self) -> &StorageSchema {
        &self.storage
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.storage.entity(name)
    }

    pub fn dto(&self, name: &str) -> Option<&DtoDef> {
        self.dtos.get(name)
    }

    pub fn dtos(&self) -> impl Iterator<Item = &DtoDef> {
        self.dtos.values()
    }

    /// Entity backing a presentation type.
    pub fn entity_for(&self, dto: &str) -> Option<&EntityDef> {
        self.dto(dto).and_then(|d| self.entity(&d.entity))
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Mapping of `(presentation type, field)`.
    pub fn lookup(&self, dto: &str, field: &str) -> Option<&FieldMapping> {
        let fields = self.mappings.get(dto)?;
        if let Some(mapping) = fields.get(field) {
            return Some(mapping);
        }
        if !self.case_insensitive {
            return None;
        }
        let declared = self.folded.get(dto)?.get(&field.to_ascii_lowercase())?;
        fields.get(declared)
    }

    /// Storage member that receives writes to `dto.field`.
    pub fn reverse(&self, dto: &str, field: &str) -> Result<&MemberPath, ResolveError> {
        let def = self
            .dto(dto)
            .ok_or_else(|| ResolveError::UnknownType(dto.to_string()))?;
        if !def.editable {
            return Err(ResolveError::NotEditable(dto.to_string()));
        }
        let mapping = self
            .lookup(dto, field)
            .ok_or_else(|| ResolveError::field_not_found(dto, field))?;
        mapping
            .inverse
            .as_ref()
            .ok_or_else(|| ResolveError::MappingNotInvertible {
                type_name: dto.to_string(),
                field: mapping.presentation_field.clone(),
            })
    }

    pub fn filterable(&self) -> &FilterableMetadata {
        &self.filterable
    }

    pub fn descriptor(&self, dto: &str, field: &str) -> Option<&FilterableDescriptor> {
        let declared = self.lookup(dto, field)?;
        self.filterable.lookup(dto, &declared.presentation_field)
    }
}

/// Collects declarations and validates them into a [`MappingRegistry`].
#[derive(Debug)]
pub struct RegistryBuilder {
    entities: Vec<EntityDef>,
    dtos: Vec<DtoDef>,
    case_insensitive: bool,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            dtos: Vec::new(),
            case_insensitive: true,
        }
    }

    pub fn entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn dto(mut self, dto: DtoDef) -> Self {
        self.dtos.push(dto);
        self
    }

    /// Match presentation field names ignoring ASCII case.
    pub fn case_insensitive_fields(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn build(self) -> Result<MappingRegistry, RegistryError> {
        let mut storage = StorageSchema::new();
        for entity in self.entities {
            storage.insert(entity)?;
        }
        storage.validate()?;

        let mut dtos = IndexMap::new();
        for dto in self.dtos {
            if dtos.contains_key(&dto.name) {
                return Err(RegistryError::DuplicateType(dto.name));
            }
            if storage.entity(&dto.entity).is_none() {
                return Err(RegistryError::UnknownEntity {
                    dto: dto.name,
                    entity: dto.entity,
                });
            }
            dtos.insert(dto.name.clone(), dto);
        }

        let mut mappings = HashMap::new();
        let mut folded = HashMap::new();
        let mut filterable = FilterableMetadata::new();

        for dto in dtos.values() {
            let mut fields = IndexMap::new();
            let mut lowered: HashMap<String, String> = HashMap::new();
            for field in dto.fields() {
                let mapping = map_field(&storage, &dtos, dto, field)?;
                if let Some(strategy) = field.filterable {
                    check_strategy(dto, field, strategy, &mapping.terminal)?;
                    filterable.register(
                        dto.name.clone(),
                        FilterableDescriptor {
                            field_name: field.name.clone(),
                            strategy,
                        },
                    );
                }
                if lowered
                    .insert(field.name.to_ascii_lowercase(), field.name.clone())
                    .is_some()
                    && self.case_insensitive
                {
                    return Err(RegistryError::AmbiguousField {
                        dto: dto.name.clone(),
                        field: field.name.clone(),
                    });
                }
                fields.insert(field.name.clone(), mapping);
            }
            mappings.insert(dto.name.clone(), fields);
            folded.insert(dto.name.clone(), lowered);
        }

        tracing::debug!(
            entities = storage.entities().count(),
            dtos = dtos.len(),
            filterable = filterable.len(),
            "mapping registry built"
        );

        Ok(MappingRegistry {
            storage,
            dtos,
            mappings,
            folded,
            filterable,
            case_insensitive: self.case_insensitive,
        })
    }
}

fn map_field(
    storage: &StorageSchema,
    dtos: &IndexMap<TypeName, DtoDef>,
    dto: &DtoDef,
    field: &DtoField,
) -> Result<FieldMapping, RegistryError> {
    let (segments, terminal) = match &field.source {
        FieldSource::Computed { .. } => (Vec::new(), Terminal::Computed),
        FieldSource::Member(member) => walk_member(storage, dto, field, member)?,
    };

    if let Some(nested) = &field.nested {
        let nested_def = dtos.get(nested).ok_or_else(|| RegistryError::UnknownDto {
            dto: dto.name.clone(),
            field: field.name.clone(),
            target: nested.clone(),
        })?;
        let Some(expected) = terminal.target() else {
            return Err(RegistryError::UnexpectedNestedType {
                dto: dto.name.clone(),
                field: field.name.clone(),
            });
        };
        if nested_def.entity != expected {
            return Err(RegistryError::NestedTypeMismatch {
                dto: dto.name.clone(),
                field: field.name.clone(),
                nested: nested.clone(),
                expected: expected.to_string(),
                found: nested_def.entity.clone(),
            });
        }
    }

    let inverse = if dto.editable {
        field.inverse().cloned()
    } else {
        None
    };

    Ok(FieldMapping {
        presentation_type: dto.name.clone(),
        presentation_field: field.name.clone(),
        storage_type: dto.entity.clone(),
        source: field.source.clone(),
        segments,
        terminal,
        nested: field.nested.clone(),
        inverse,
    })
}

/// Walk a storage member from the DTO's entity. Navigations may be crossed;
/// scalars and collections must come last.
fn walk_member(
    storage: &StorageSchema,
    dto: &DtoDef,
    field: &DtoField,
    member: &MemberPath,
) -> Result<(Vec<StorageSegment>, Terminal), RegistryError> {
    let mut current = dto.entity.clone();
    let mut segments = Vec::with_capacity(member.len());
    let mut terminal = None;

    for name in member.segments() {
        if terminal.is_some() {
            return Err(RegistryError::MemberPastTerminal {
                dto: dto.name.clone(),
                field: field.name.clone(),
                segment: segments
                    .last()
                    .map(|s: &StorageSegment| s.name.clone())
                    .unwrap_or_default(),
            });
        }
        let entity = storage.entity(&current).ok_or_else(|| RegistryError::UnknownEntity {
            dto: dto.name.clone(),
            entity: current.clone(),
        })?;
        let storage_field = entity.field(name).ok_or_else(|| RegistryError::UnknownMember {
            dto: dto.name.clone(),
            field: field.name.clone(),
            member: member.to_string(),
            entity: entity.name.clone(),
        })?;
        segments.push(StorageSegment {
            name: name.clone(),
            source_type: entity.name.clone(),
            is_collection: storage_field.is_collection(),
        });
        match &storage_field.kind {
            StorageFieldKind::Scalar(kind) => terminal = Some(Terminal::Scalar(kind.clone())),
            StorageFieldKind::Collection { target, relation } => {
                terminal = Some(Terminal::Collection {
                    target: target.clone(),
                    relation: relation.clone(),
                })
            }
            StorageFieldKind::Reference {
                target,
                foreign_key,
            } => {
                current = target.clone();
                if segments.len() == member.len() {
                    terminal = Some(Terminal::Reference {
                        target: target.clone(),
                        foreign_key: foreign_key.clone(),
                    });
                }
            }
        }
    }

    let terminal = terminal.ok_or_else(|| RegistryError::UnknownMember {
        dto: dto.name.clone(),
        field: field.name.clone(),
        member: member.to_string(),
        entity: dto.entity.clone(),
    })?;
    Ok((segments, terminal))
}

fn check_strategy(
    dto: &DtoDef,
    field: &DtoField,
    strategy: ComparisonStrategy,
    terminal: &Terminal,
) -> Result<(), RegistryError> {
    let fits = match strategy {
        ComparisonStrategy::Equals => {
            matches!(terminal, Terminal::Scalar(_) | Terminal::Computed)
        }
        ComparisonStrategy::ByForeignKeyId => matches!(terminal, Terminal::Reference { .. }),
        ComparisonStrategy::NestedCollection => matches!(terminal, Terminal::Collection { .. }),
    };
    if fits {
        Ok(())
    } else {
        Err(RegistryError::StrategyMismatch {
            dto: dto.name.clone(),
            field: field.name.clone(),
            strategy,
            shape: terminal.describe(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::shop_registry;
    use crate::schema::RelationKind;
    use graft_core::ScalarKind;

    fn base() -> RegistryBuilder {
        MappingRegistry::builder()
            .entity(
                EntityDef::new("Customer", "id", ScalarKind::Int32).scalar("name", ScalarKind::Text),
            )
            .entity(
                EntityDef::new("Order", "id", ScalarKind::Int32)
                    .scalar("customer_id", ScalarKind::Int32)
                    .reference("customer", "Customer", "customer_id"),
            )
    }

    #[test]
    fn test_lookup_declared_and_folded_names() {
        let registry = shop_registry();
        let mapping = registry.lookup("OrderDto", "placedOn").unwrap();
        assert_eq!(mapping.storage_type, "Order");
        assert_eq!(mapping.terminal, Terminal::Scalar(ScalarKind::Date));
        assert_eq!(
            registry.lookup("OrderDto", "PLACEDON").map(|m| m.presentation_field.as_str()),
            Some("placedOn")
        );
    }

    #[test]
    fn test_case_sensitive_registry() {
        let registry = base()
            .dto(DtoDef::new("OrderDto", "Order").field(DtoField::member("id", "id")))
            .case_insensitive_fields(false)
            .build()
            .unwrap();
        assert!(registry.lookup("OrderDto", "id").is_some());
        assert!(registry.lookup("OrderDto", "ID").is_none());
    }

    #[test]
    fn test_reverse_mapping() {
        let registry = shop_registry();
        assert_eq!(
            registry.reverse("OrderDto", "customerName").unwrap(),
            &MemberPath::parse("customer.name")
        );
        match registry.reverse("OrderDto", "summary") {
            Err(ResolveError::MappingNotInvertible { field, .. }) => assert_eq!(field, "summary"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            registry.reverse("ProductDto", "name"),
            Err(ResolveError::NotEditable("ProductDto".into()))
        );
    }

    #[test]
    fn test_collection_mapping_terminal() {
        let registry = shop_registry();
        let mapping = registry.lookup("OrderDto", "tags").unwrap();
        match &mapping.terminal {
            Terminal::Collection {
                target,
                relation: RelationKind::ManyToMany { link_table, .. },
            } => {
                assert_eq!(target, "Tag");
                assert_eq!(link_table, "order_tags");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_descriptor_lookup() {
        let registry = shop_registry();
        assert_eq!(
            registry.descriptor("OrderDto", "customer").map(|d| d.strategy),
            Some(ComparisonStrategy::ByForeignKeyId)
        );
        assert!(registry.descriptor("OrderDto", "note").is_none());
    }

    #[test]
    fn test_unknown_member_fails_build() {
        let result = base()
            .dto(DtoDef::new("OrderDto", "Order").field(DtoField::member("x", "customer.email")))
            .build();
        match result {
            Err(RegistryError::UnknownMember { member, entity, .. }) => {
                assert_eq!(member, "customer.email");
                assert_eq!(entity, "Customer");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_member_past_scalar_fails_build() {
        let result = base()
            .dto(DtoDef::new("OrderDto", "Order").field(DtoField::member("x", "customer_id.value")))
            .build();
        assert!(matches!(result, Err(RegistryError::MemberPastTerminal { .. })));
    }

    #[test]
    fn test_nested_type_must_map_target() {
        let result = base()
            .dto(DtoDef::new("OrderDto", "Order").field(DtoField::nested("customer", "customer", "OrderDto")))
            .build();
        match result {
            Err(RegistryError::NestedTypeMismatch { expected, found, .. }) => {
                assert_eq!(expected, "Customer");
                assert_eq!(found, "Order");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_strategy_must_fit_shape() {
        let result = base()
            .dto(
                DtoDef::new("OrderDto", "Order").field(
                    DtoField::member("customerId", "customer_id")
                        .filterable(ComparisonStrategy::ByForeignKeyId),
                ),
            )
            .build();
        assert!(matches!(result, Err(RegistryError::StrategyMismatch { .. })));
    }

    #[test]
    fn test_ambiguous_fields_fail_when_folding() {
        let result = base()
            .dto(
                DtoDef::new("OrderDto", "Order")
                    .field(DtoField::member("id", "id"))
                    .field(DtoField::member("ID", "customer_id")),
            )
            .build();
        assert!(matches!(result, Err(RegistryError::AmbiguousField { .. })));
    }

    #[test]
    fn test_unknown_entity_for_dto() {
        let result = base().dto(DtoDef::new("GhostDto", "Ghost")).build();
        assert!(matches!(result, Err(RegistryError::UnknownEntity { .. })));
    }
}
