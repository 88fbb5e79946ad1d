//! Which presentation fields clients may filter on, and how.

use std::collections::HashMap;

use graft_core::TypeName;
use serde::{Deserialize, Serialize};

/// How a filter value is compared against the resolved field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonStrategy {
    /// Compare the resolved scalar.
    Equals,
    /// Compare the foreign-key scalar behind a navigation, without loading
    /// the referenced entity.
    ByForeignKeyId,
    /// Compare the key of every collection element; any match satisfies.
    NestedCollection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterableDescriptor {
    pub field_name: String,
    pub strategy: ComparisonStrategy,
}

/// Descriptors indexed by `(presentation type, declared field name)`.
///
/// A field without a descriptor is never filterable, even when its path
/// resolves.
#[derive(Debug, Clone, Default)]
pub struct FilterableMetadata {
    descriptors: HashMap<(TypeName, String), FilterableDescriptor>,
}

impl FilterableMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_name: impl Into<TypeName>, descriptor: FilterableDescriptor) {
        self.descriptors
            .insert((type_name.into(), descriptor.field_name.clone()), descriptor);
    }

    pub fn lookup(&self, type_name: &str, field_name: &str) -> Option<&FilterableDescriptor> {
        self.descriptors
            .get(&(type_name.to_string(), field_name.to_string()))
    }

    /// All filterable fields of a type, in no particular order.
    pub fn for_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a FilterableDescriptor> {
        self.descriptors
            .iter()
            .filter(move |((owner, _), _)| owner == type_name)
            .map(|(_, descriptor)| descriptor)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_per_type() {
        let mut metadata = FilterableMetadata::new();
        metadata.register(
            "OrderDto",
            FilterableDescriptor {
                field_name: "status".into(),
                strategy: ComparisonStrategy::Equals,
            },
        );
        assert_eq!(
            metadata.lookup("OrderDto", "status").map(|d| d.strategy),
            Some(ComparisonStrategy::Equals)
        );
        assert!(metadata.lookup("CustomerDto", "status").is_none());
        assert_eq!(metadata.for_type("OrderDto").count(), 1);
        assert_eq!(metadata.len(), 1);
    }
}
