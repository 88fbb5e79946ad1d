//! Presentation model: DTO types and where each of their fields comes from.

use std::fmt;

use graft_core::TypeName;
use indexmap::IndexMap;

use crate::filterable::ComparisonStrategy;

/// Dotted storage member, e.g. `customer.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberPath(Vec<String>);

impl MemberPath {
    pub fn parse(dotted: &str) -> Self {
        Self(dotted.split('.').map(str::to_string).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSource {
    /// Storage member, possibly several navigations deep.
    Member(MemberPath),
    /// Derived value. Display-only: cannot be compared or written.
    Computed { expression: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtoField {
    pub name: String,
    pub source: FieldSource,
    /// Presentation type of the navigation target or collection element.
    pub nested: Option<TypeName>,
    pub filterable: Option<ComparisonStrategy>,
    pub writable: bool,
}

impl DtoField {
    pub fn member(name: impl Into<String>, member: &str) -> Self {
        Self {
            name: name.into(),
            source: FieldSource::Member(MemberPath::parse(member)),
            nested: None,
            filterable: None,
            writable: true,
        }
    }

    pub fn nested(name: impl Into<String>, member: &str, dto: impl Into<TypeName>) -> Self {
        Self {
            nested: Some(dto.into()),
            ..Self::member(name, member)
        }
    }

    pub fn computed(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: FieldSource::Computed {
                expression: expression.into(),
            },
            nested: None,
            filterable: None,
            writable: false,
        }
    }

    pub fn filterable(mut self, strategy: ComparisonStrategy) -> Self {
        self.filterable = Some(strategy);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.source, FieldSource::Computed { .. })
    }

    /// Storage member that receives writes to this field, if any.
    pub fn inverse(&self) -> Option<&MemberPath> {
        match &self.source {
            FieldSource::Member(path) if self.writable => Some(path),
            _ => None,
        }
    }
}

/// A presentation type mapped onto one storage entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtoDef {
    pub name: TypeName,
    pub entity: TypeName,
    /// Edit DTOs accept patch documents.
    pub editable: bool,
    fields: IndexMap<String, DtoField>,
}

impl DtoDef {
    pub fn new(name: impl Into<TypeName>, entity: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            editable: false,
            fields: IndexMap::new(),
        }
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn field(mut self, field: DtoField) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&DtoField> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &DtoField> {
        self.fields.values()
    }
}
