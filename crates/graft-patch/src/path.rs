//! Patch path resolution.
//!
//! Patch paths address elements by domain key, never by position:
//! `/10/lines/100/quantity` is the `quantity` of line 100 of order 10, and
//! `-` appends. The root of a path is always an element of the root
//! collection, and every collection must be followed by a key or `-`.

use graft_core::{ScalarKind, ScalarValue, TypeName};
use graft_mapping::{
    MappingRegistry, RelationKind, ResolveError, StorageSegment, Terminal, resolve_field,
};

use crate::error::PatchError;

#[derive(Debug, Clone, PartialEq)]
pub enum ElementKey {
    Id(ScalarValue),
    /// `-`
    Append,
}

impl ElementKey {
    fn parse(segment: &str, kind: &ScalarKind) -> Result<Self, ResolveError> {
        if segment == "-" {
            return Ok(Self::Append);
        }
        kind.parse_literal(segment)
            .map(Self::Id)
            .map_err(|_| ResolveError::segment_must_be_collection_id(segment))
    }
}

/// Step into an element of a nested collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionHop {
    /// Presentation fields from the previous element to the collection.
    pub field: String,
    /// Storage segments from the previous element; the last one is the
    /// collection itself and its `source_type` owns the relation.
    pub segments: Vec<StorageSegment>,
    pub target: TypeName,
    pub relation: RelationKind,
    /// Presentation type of the elements.
    pub dto: TypeName,
    pub key: ElementKey,
}

impl CollectionHop {
    pub fn collection(&self) -> &StorageSegment {
        &self.segments[self.segments.len() - 1]
    }
}

/// Fields addressed below the last element.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTail {
    pub dto: TypeName,
    pub field: String,
    pub segments: Vec<StorageSegment>,
    pub terminal: Terminal,
    pub nested: Option<TypeName>,
    pub computed: bool,
}

impl FieldTail {
    /// The storage field that is read or assigned.
    pub fn last(&self) -> &StorageSegment {
        &self.segments[self.segments.len() - 1]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchPath {
    pub raw: String,
    pub root_dto: TypeName,
    pub root_entity: TypeName,
    pub root_key: ElementKey,
    pub hops: Vec<CollectionHop>,
    pub tail: Option<FieldTail>,
    /// `(presentation type, field)` of every field segment, in path order.
    pub fields: Vec<(TypeName, String)>,
}

impl PatchPath {
    /// Key of the last addressed element.
    pub fn element_key(&self) -> &ElementKey {
        self.hops.last().map(|h| &h.key).unwrap_or(&self.root_key)
    }

    /// Presentation type of the last addressed element.
    pub fn element_dto(&self) -> &str {
        self.hops.last().map(|h| h.dto.as_str()).unwrap_or(&self.root_dto)
    }

    /// Presentation types walked, starting at the root.
    pub fn type_chain(&self) -> Vec<&str> {
        let mut chain = vec![self.root_dto.as_str()];
        chain.extend(self.fields.iter().map(|(dto, _)| dto.as_str()));
        match &self.tail {
            Some(tail) => chain.extend(tail.nested.as_deref()),
            None => chain.extend(self.hops.last().map(|h| h.dto.as_str())),
        }
        chain.dedup();
        chain
    }

    /// Every field on the way must map back to a storage member.
    pub fn ensure_writable(&self, registry: &MappingRegistry) -> Result<(), ResolveError> {
        for (dto, field) in &self.fields {
            registry.reverse(dto, field)?;
        }
        Ok(())
    }
}

fn split_pointer(raw: &str) -> Option<Vec<String>> {
    let rest = raw.strip_prefix('/')?;
    Some(
        rest.split('/')
            .map(|token| token.replace("~1", "/").replace("~0", "~"))
            .collect(),
    )
}

/// Resolve a '/'-delimited patch path against the edit type `root_dto`.
pub fn resolve_patch_path(
    registry: &MappingRegistry,
    root_dto: &str,
    raw: &str,
) -> Result<PatchPath, PatchError> {
    let root_entity = registry
        .entity_for(root_dto)
        .ok_or_else(|| ResolveError::UnknownType(root_dto.to_string()))?;
    let tokens = split_pointer(raw).ok_or(ResolveError::EmptyPath)?;
    let (first, rest) = tokens.split_first().ok_or(ResolveError::EmptyPath)?;
    let root_key = ElementKey::parse(first, root_entity.key_kind())?;

    let mut hops = Vec::new();
    let mut fields = Vec::new();
    let mut pending: Vec<StorageSegment> = Vec::new();
    let mut names: Vec<String> = Vec::new();
    let mut last: Option<(TypeName, Terminal, Option<TypeName>)> = None;
    let mut computed = false;
    let mut append_seen = root_key == ElementKey::Append;
    let mut current = Some(root_dto.to_string());

    let mut index = 0;
    while index < rest.len() {
        let segment = &rest[index];
        index += 1;
        if append_seen {
            return Err(PatchError::AppendNotLast {
                path: raw.to_string(),
            });
        }
        let Some(dto) = current.take() else {
            let reached = last
                .as_ref()
                .map(|(_, terminal, _)| terminal.describe())
                .unwrap_or_else(|| root_dto.to_string());
            return Err(ResolveError::field_not_found(reached, segment.as_str()).into());
        };
        let mapping = resolve_field(registry, &dto, segment)?;
        fields.push((dto.clone(), mapping.presentation_field.clone()));
        pending.extend(mapping.segments.iter().cloned());
        names.push(mapping.presentation_field.clone());
        computed |= mapping.is_computed();

        if let Terminal::Collection { target, relation } = &mapping.terminal
            && let Some(key_segment) = rest.get(index)
        {
            index += 1;
            let element_dto = mapping.nested.clone().ok_or_else(|| {
                PatchError::relation_misconfigured(format!(
                    "collection '{dto}.{}' has no element type",
                    mapping.presentation_field
                ))
            })?;
            let key_kind = registry
                .entity(target)
                .map(|e| e.key_kind().clone())
                .ok_or_else(|| ResolveError::UnknownType(target.clone()))?;
            let key = ElementKey::parse(key_segment, &key_kind)?;
            append_seen = key == ElementKey::Append;
            hops.push(CollectionHop {
                field: std::mem::take(&mut names).join("."),
                segments: std::mem::take(&mut pending),
                target: target.clone(),
                relation: relation.clone(),
                dto: element_dto.clone(),
                key,
            });
            computed = false;
            last = None;
            current = Some(element_dto);
            continue;
        }

        current = mapping.nested.clone();
        last = Some((dto, mapping.terminal.clone(), mapping.nested.clone()));
    }

    let tail = last.map(|(dto, terminal, nested)| FieldTail {
        dto,
        field: names.join("."),
        segments: pending,
        terminal,
        nested,
        computed,
    });

    Ok(PatchPath {
        raw: raw.to_string(),
        root_dto: root_dto.to_string(),
        root_entity: root_entity.name.clone(),
        root_key,
        hops,
        tail,
        fields,
    })
}
