//! List requests and their compiled form.

use graft_core::TypeName;
use graft_storage::{IncludePath, Predicate, SortKey, StorageQuery, normalize_includes};
use serde::{Deserialize, Serialize};

use crate::filter::CompiledFilter;
use crate::order::CompiledOrder;

/// Filter and order tokens of one list request, with optional paging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    pub filter: Vec<String>,
    pub order: Vec<String>,
    pub offset: Option<usize>,
    pub count: Option<usize>,
}

impl ListRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, token: impl Into<String>) -> Self {
        self.filter.push(token.into());
        self
    }

    pub fn order(mut self, token: impl Into<String>) -> Self {
        self.order.push(token.into());
        self
    }

    pub fn page(mut self, offset: usize, count: usize) -> Self {
        self.offset = Some(offset);
        self.count = Some(count);
        self
    }
}

/// A validated list request in storage vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub dto: TypeName,
    pub entity: TypeName,
    pub filters: Vec<CompiledFilter>,
    pub orders: Vec<CompiledOrder>,
    pub offset: usize,
    pub count: usize,
}

impl CompiledQuery {
    /// Conjunction of all filters, `None` when unfiltered.
    pub fn predicate(&self) -> Option<Predicate> {
        if self.filters.is_empty() {
            return None;
        }
        Some(Predicate::and(
            self.filters.iter().map(|f| f.predicate.clone()).collect(),
        ))
    }

    pub fn sort_keys(&self) -> Vec<SortKey> {
        self.orders.iter().map(|o| o.sort_key.clone()).collect()
    }

    /// Navigations the predicate and the sort keys read through.
    pub fn includes(&self) -> Vec<IncludePath> {
        let mut paths: Vec<IncludePath> = self
            .filters
            .iter()
            .flat_map(|f| f.predicate.includes())
            .collect();
        paths.extend(
            self.orders
                .iter()
                .map(|o| o.sort_key.path.parent())
                .filter(|p| !p.is_empty()),
        );
        normalize_includes(paths)
    }

    pub fn to_storage_query(&self) -> StorageQuery {
        StorageQuery::new(self.entity.clone())
            .with_predicate(self.predicate())
            .with_sort(self.sort_keys())
            .with_includes(self.includes())
            .paged(self.offset, Some(self.count))
    }
}
