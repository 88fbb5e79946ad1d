use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use graft_core::{ScalarValue, ValidationCode};
use graft_db_memory::InMemoryStorage;
use graft_mapping::fixtures::{shop_links, shop_registry, shop_rows};
use graft_search::{EngineError, ListRequest, SearchConfig, SearchEngine};
use graft_storage::{IncludePath, QueryResult, QuerySource, Record, StorageError, StorageQuery};
use tokio_test::block_on;

struct Shop {
    engine: SearchEngine,
    storage: InMemoryStorage,
}

fn shop() -> Shop {
    let registry = Arc::new(shop_registry());
    let storage = InMemoryStorage::for_registry(&registry);
    block_on(async {
        for (entity, row) in shop_rows() {
            storage.seed(entity, row).await.unwrap();
        }
        for (table, parent, child) in shop_links() {
            storage.seed_link(table, &parent, &child).await.unwrap();
        }
    });
    Shop {
        engine: SearchEngine::new(registry, SearchConfig::default()),
        storage,
    }
}

impl Shop {
    fn ids(&self, request: ListRequest) -> Vec<i64> {
        let result = block_on(self.engine.search(&self.storage, "OrderDto", &request)).unwrap();
        result.records.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    fn ids_by_id(&self, filter: &str) -> Vec<i64> {
        self.ids(ListRequest::new().filter(filter).order("id"))
    }
}

#[test]
fn test_multiple_values_are_alternatives() {
    let shop = shop();
    assert_eq!(shop.ids_by_id("status:Pending,Shipped"), vec![10, 11, 13]);
    assert_eq!(shop.ids_by_id("status:shipped"), vec![11, 13]);
}

#[test]
fn test_exclusion_negates_all_values_together() {
    let shop = shop();
    assert_eq!(shop.ids_by_id("status!:Pending,Shipped"), vec![12]);
    assert_eq!(shop.ids_by_id("tags!:1"), vec![11, 12]);
}

#[test]
fn test_ranges_are_inclusive_and_may_be_open() {
    let shop = shop();
    assert_eq!(shop.ids_by_id("placedOn:2024-02-01..2024-02-28"), vec![11, 12]);
    assert_eq!(shop.ids_by_id("placedOn:2024-02-10.."), vec![11, 12, 13]);
    assert_eq!(shop.ids_by_id("placedOn:..2024-02-10"), vec![10, 11, 12]);
    assert_eq!(shop.ids_by_id("totalCents:300,4000..5000"), vec![11, 12]);
}

#[test]
fn test_foreign_key_filter_needs_no_navigation() {
    let shop = shop();
    let request = ListRequest::new().filter("customer:1").order("id");
    let query = shop.engine.validate("OrderDto", &request).unwrap();
    assert!(query.includes().is_empty());
    assert_eq!(shop.ids(request), vec![10, 12]);
}

#[test]
fn test_nested_collection_matches_any_element() {
    let shop = shop();
    assert_eq!(shop.ids_by_id("tags:3"), vec![13]);
    assert_eq!(shop.ids_by_id("tags:1"), vec![10, 13]);
    assert_eq!(shop.ids_by_id("lines:102,103"), vec![11, 13]);
    assert_eq!(shop.ids_by_id("lines.product:1"), vec![10, 13]);
    assert_eq!(shop.ids_by_id("lines.quantity:7"), vec![11]);
}

#[test]
fn test_flattened_member_filter() {
    let shop = shop();
    assert_eq!(shop.ids_by_id("customerName:Ada"), vec![10, 12]);
}

#[test]
fn test_filters_combine_with_and() {
    let shop = shop();
    let request = ListRequest::new()
        .filter("status:Shipped")
        .filter("tags:1")
        .order("id");
    assert_eq!(shop.ids(request), vec![13]);
}

#[test]
fn test_order_keys_compose_with_stable_ties() {
    let shop = shop();
    assert_eq!(shop.ids(ListRequest::new().order("placedOn")), vec![10, 11, 12, 13]);
    assert_eq!(
        shop.ids(ListRequest::new().order("placedOn").order("totalCents")),
        vec![10, 12, 11, 13]
    );
    assert_eq!(
        shop.ids(ListRequest::new().order("status").order("placedOn desc")),
        vec![10, 13, 11, 12]
    );
    assert_eq!(shop.ids(ListRequest::new().order("customerName desc").order("id")), vec![13, 11, 10, 12]);
}

#[test]
fn test_paging_reports_total() {
    let shop = shop();
    let request = ListRequest::new().order("id").page(1, 2);
    let result = block_on(shop.engine.search(&shop.storage, "OrderDto", &request)).unwrap();
    assert_eq!(result.total, 4);
    assert!(result.has_more);
    let ids: Vec<i64> = result.records.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![11, 12]);
}

#[derive(Default)]
struct CountingSource {
    calls: AtomicUsize,
}

#[async_trait]
impl QuerySource for CountingSource {
    async fn query(&self, _query: &StorageQuery) -> Result<QueryResult, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(QueryResult::empty())
    }

    async fn load(
        &self,
        _entity: &str,
        _key: &ScalarValue,
        _includes: &[IncludePath],
    ) -> Result<Option<Record>, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

#[test]
fn test_unknown_key_never_reaches_storage() {
    let engine = SearchEngine::new(Arc::new(shop_registry()), SearchConfig::default());
    let source = CountingSource::default();
    let request = ListRequest::new().filter("shippingAddress:Berlin");

    let err = block_on(engine.search(&source, "OrderDto", &request)).unwrap_err();
    let EngineError::Validation(errors) = err else {
        panic!("expected validation failure, got {err}");
    };
    assert_eq!(errors.first_code("filter[0]"), Some(ValidationCode::PropertyDoesNotExist));
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);

    block_on(engine.search(&source, "OrderDto", &ListRequest::new())).unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unconvertible_values_are_reported() {
    let shop = shop();
    let request = ListRequest::new()
        .filter("placedOn:05/01/2024")
        .filter("status:Lost")
        .filter("id:1..x");
    let err = block_on(shop.engine.search(&shop.storage, "OrderDto", &request)).unwrap_err();
    let EngineError::Validation(errors) = err else {
        panic!("expected validation failure");
    };
    for field in ["filter[0]", "filter[1]", "filter[2]"] {
        assert_eq!(errors.first_code(field), Some(ValidationCode::CanNotCreateExpression));
    }
    let message = &errors.get("filter[1]").unwrap()[0].message;
    assert!(message.contains("Lost"), "{message}");
}

#[test]
fn test_validation_errors_serialize_as_field_map() {
    let shop = shop();
    let errors = shop
        .engine
        .validate("OrderDto", &ListRequest::new().filter("note:x"))
        .unwrap_err();
    let json = serde_json::to_value(&errors).unwrap();
    assert_eq!(json["filter[0]"][0]["code"], "PropertyIsNotFilterable");
    assert_eq!(json["filter[0]"][0]["message"], "property 'note' is not filterable");
}
