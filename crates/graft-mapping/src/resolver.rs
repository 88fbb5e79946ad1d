//! Presentation path -> storage path resolution.
//!
//! A dotted path such as `lines.product.name` is walked field by field over
//! the registry. Each presentation field expands into one or more storage
//! segments (flattened members add navigations), collections mark a boundary
//! and continue at the element type, and computed fields make the whole path
//! display-only.

use graft_core::{ScalarKind, TypeName};

use crate::error::ResolveError;
use crate::registry::{FieldMapping, MappingRegistry};
use crate::schema::RelationKind;

/// One storage hop: the field `name` read from an entity of `source_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSegment {
    pub name: String,
    pub source_type: TypeName,
    pub is_collection: bool,
}

/// What a path ends at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Scalar(ScalarKind),
    Reference {
        target: TypeName,
        foreign_key: String,
    },
    Collection {
        target: TypeName,
        relation: RelationKind,
    },
    Computed,
}

impl Terminal {
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(kind) => kind.to_string(),
            Self::Reference { target, .. } => format!("reference to {target}"),
            Self::Collection { target, .. } => format!("collection of {target}"),
            Self::Computed => "computed value".to_string(),
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Reference { target, .. } | Self::Collection { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn scalar_kind(&self) -> Option<&ScalarKind> {
        match self {
            Self::Scalar(kind) => Some(kind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub root: TypeName,
    /// Declared presentation field names, one per input segment.
    pub fields: Vec<String>,
    pub segments: Vec<StorageSegment>,
    /// Presentation type owning each entry of `fields`.
    pub type_chain: Vec<TypeName>,
    pub terminal: Terminal,
    pub display_only: bool,
}

impl ResolvedPath {
    /// Presentation type that declares the last field.
    pub fn owner(&self) -> &str {
        self.type_chain.last().map(String::as_str).unwrap_or(&self.root)
    }

    pub fn field_name(&self) -> &str {
        self.fields.last().map(String::as_str).unwrap_or_default()
    }

    /// Canonical dotted presentation path.
    pub fn key(&self) -> String {
        self.fields.join(".")
    }

    pub fn storage_names(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.name.clone()).collect()
    }

    /// True when a collection is crossed before the terminal segment.
    pub fn crosses_collection(&self) -> bool {
        let inner = self.segments.len().saturating_sub(1);
        self.segments[..inner].iter().any(|s| s.is_collection)
    }

    pub fn ensure_comparable(&self) -> Result<(), ResolveError> {
        if self.display_only {
            return Err(ResolveError::ExpressionNotComparable { path: self.key() });
        }
        Ok(())
    }
}

/// Look up one field of a presentation type.
pub fn resolve_field<'r>(
    registry: &'r MappingRegistry,
    type_name: &str,
    segment: &str,
) -> Result<&'r FieldMapping, ResolveError> {
    if registry.dto(type_name).is_none() {
        return Err(ResolveError::UnknownType(type_name.to_string()));
    }
    registry
        .lookup(type_name, segment)
        .ok_or_else(|| ResolveError::field_not_found(type_name, segment))
}

/// Resolve a dotted presentation path rooted at `root`.
pub fn resolve(
    registry: &MappingRegistry,
    root: &str,
    dotted: &str,
) -> Result<ResolvedPath, ResolveError> {
    let dotted = dotted.trim();
    if dotted.is_empty() {
        return Err(ResolveError::EmptyPath);
    }

    let mut fields = Vec::new();
    let mut segments = Vec::new();
    let mut type_chain = Vec::new();
    let mut terminal = None;
    let mut display_only = false;
    let mut current = Some(root.to_string());

    for segment in dotted.split('.') {
        let Some(type_name) = current.take() else {
            let reached = terminal
                .as_ref()
                .map(Terminal::describe)
                .unwrap_or_else(|| root.to_string());
            return Err(ResolveError::field_not_found(reached, segment));
        };
        let mapping = resolve_field(registry, &type_name, segment)?;

        fields.push(mapping.presentation_field.clone());
        segments.extend(mapping.segments.iter().cloned());
        display_only |= mapping.is_computed();
        terminal = Some(mapping.terminal.clone());
        current = mapping.nested.clone();
        type_chain.push(type_name);
    }

    let terminal = terminal.ok_or(ResolveError::EmptyPath)?;
    Ok(ResolvedPath {
        root: root.to_string(),
        fields,
        segments,
        type_chain,
        terminal,
        display_only,
    })
}
