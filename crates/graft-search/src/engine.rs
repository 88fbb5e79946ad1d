//! List request validation and execution against a query source.

use std::sync::Arc;

use graft_core::{ToValidationFailure, ValidationErrors, indexed_field};
use graft_mapping::MappingRegistry;
use graft_storage::{QueryResult, QuerySource, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SearchError;
use crate::filter::compile_filter;
use crate::order::compile_order;
use crate::parser::{parse_filter, parse_order};
use crate::query::{CompiledQuery, ListRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_filter_tokens: usize,
    pub max_order_tokens: usize,
    pub default_count: usize,
    pub max_count: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_filter_tokens: 32,
            max_order_tokens: 8,
            default_count: 10,
            max_count: 100,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_filter_tokens == 0 {
            return Err("search.max_filter_tokens must be greater than 0".into());
        }
        if self.max_order_tokens == 0 {
            return Err("search.max_order_tokens must be greater than 0".into());
        }
        if self.default_count == 0 || self.default_count > self.max_count {
            return Err(format!(
                "search.default_count must be between 1 and search.max_count ({})",
                self.max_count
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Compiles list requests for presentation types and runs them.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    registry: Arc<MappingRegistry>,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(registry: Arc<MappingRegistry>, config: SearchConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Compile every token of `request`.
    ///
    /// Failures are collected rather than returned at the first one: each
    /// offending token gets an entry under `filter[i]` or `order[i]`.
    pub fn validate(&self, dto: &str, request: &ListRequest) -> Result<CompiledQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let Some(entity) = self.registry.entity_for(dto) else {
            let err = SearchError::PropertyNotFound {
                key: dto.to_string(),
                reason: format!("unknown presentation type '{dto}'"),
            };
            return Err(ValidationErrors::single("type", err.to_validation_failure()));
        };

        let limits = [
            ("filter", request.filter.len(), self.config.max_filter_tokens),
            ("order", request.order.len(), self.config.max_order_tokens),
        ];
        for (list, count, max) in limits {
            if count > max {
                let err = SearchError::TooManyTokens { list, count, max };
                errors.add(list, err.to_validation_failure());
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut filters = Vec::with_capacity(request.filter.len());
        for (i, token) in request.filter.iter().enumerate() {
            match compile_filter(&self.registry, dto, &parse_filter(token)) {
                Ok(filter) => filters.push(filter),
                Err(e) => errors.add(indexed_field("filter", i), e.to_validation_failure()),
            }
        }
        let mut orders = Vec::with_capacity(request.order.len());
        for (i, token) in request.order.iter().enumerate() {
            match compile_order(&self.registry, dto, &parse_order(token)) {
                Ok(order) => orders.push(order),
                Err(e) => errors.add(indexed_field("order", i), e.to_validation_failure()),
            }
        }
        if !errors.is_empty() {
            tracing::debug!(dto, failures = errors.len(), "list request rejected");
            return Err(errors);
        }

        let count = request
            .count
            .unwrap_or(self.config.default_count)
            .min(self.config.max_count);
        Ok(CompiledQuery {
            dto: dto.to_string(),
            entity: entity.name.clone(),
            filters,
            orders,
            offset: request.offset.unwrap_or(0),
            count,
        })
    }

    pub async fn execute<S>(&self, source: &S, query: &CompiledQuery) -> Result<QueryResult, EngineError>
    where
        S: QuerySource + ?Sized,
    {
        let storage_query = query.to_storage_query();
        let result = source.query(&storage_query).await?;
        tracing::debug!(
            dto = %query.dto,
            backend = source.backend_name(),
            total = result.total,
            returned = result.records.len(),
            "list request executed"
        );
        Ok(result)
    }

    /// Validate then execute; storage is never touched when validation fails.
    pub async fn search<S>(&self, source: &S, dto: &str, request: &ListRequest) -> Result<QueryResult, EngineError>
    where
        S: QuerySource + ?Sized,
    {
        let query = self.validate(dto, request)?;
        self.execute(source, &query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_mapping::fixtures::shop_registry;
    use graft_storage::FieldPath;

    fn engine() -> SearchEngine {
        SearchEngine::new(Arc::new(shop_registry()), SearchConfig::default())
    }

    #[test]
    fn test_errors_are_collected_per_token() {
        let request = ListRequest::new()
            .filter("status:Shipped")
            .filter("nope:1")
            .filter("note:x")
            .order("placedOn")
            .order("lines");
        let errors = engine().validate("OrderDto", &request).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.first_code("filter[1]"),
            Some(graft_core::ValidationCode::PropertyDoesNotExist)
        );
        assert_eq!(
            errors.first_code("filter[2]"),
            Some(graft_core::ValidationCode::PropertyIsNotFilterable)
        );
        assert!(errors.get("order[1]").is_some());
        assert!(errors.get("filter[0]").is_none());
    }

    #[test]
    fn test_token_limits() {
        let config = SearchConfig {
            max_filter_tokens: 1,
            ..SearchConfig::default()
        };
        let engine = SearchEngine::new(Arc::new(shop_registry()), config);
        let request = ListRequest::new().filter("id:1").filter("id:2");
        let errors = engine.validate("OrderDto", &request).unwrap_err();
        assert_eq!(
            errors.first_code("filter"),
            Some(graft_core::ValidationCode::ExpressionIsUndefined)
        );
    }

    #[test]
    fn test_includes_cover_filters_and_sorts() {
        let request = ListRequest::new()
            .filter("tags:1")
            .filter("lines.product:2")
            .order("customerName");
        let query = engine().validate("OrderDto", &request).unwrap();
        assert_eq!(
            query.includes(),
            vec![
                FieldPath::parse("customer"),
                FieldPath::parse("lines"),
                FieldPath::parse("tags"),
            ]
        );
    }

    #[test]
    fn test_count_defaults_and_clamps() {
        let query = engine().validate("OrderDto", &ListRequest::new()).unwrap();
        assert_eq!((query.offset, query.count), (0, 10));
        let query = engine()
            .validate("OrderDto", &ListRequest::new().page(5, 1000))
            .unwrap();
        assert_eq!((query.offset, query.count), (5, 100));
        assert!(query.predicate().is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(SearchConfig::default().validate().is_ok());
        let bad = SearchConfig {
            default_count: 500,
            ..SearchConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
