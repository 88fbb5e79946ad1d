use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use graft_core::{ScalarValue, ValidationCode};
use graft_db_memory::InMemoryStorage;
use graft_mapping::fixtures::{shop_links, shop_registry, shop_rows};
use graft_patch::{ApplyError, PatchConfig, PatchDocument, PatchEngine, PatchError, PatchOutcome};
use graft_storage::{
    GraphStore, IncludePath, QueryResult, QuerySource, Record, StorageError, StorageQuery,
    Transaction,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Counters {
    loads: AtomicUsize,
    writes: AtomicUsize,
}

impl Counters {
    fn reset(&self) {
        self.loads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

/// Counts the reads and writes that reach the wrapped store.
#[derive(Clone)]
struct RecordingStore {
    inner: InMemoryStorage,
    counters: Arc<Counters>,
}

#[async_trait]
impl QuerySource for RecordingStore {
    async fn query(&self, query: &StorageQuery) -> Result<QueryResult, StorageError> {
        self.inner.query(query).await
    }

    async fn load(
        &self,
        entity: &str,
        key: &ScalarValue,
        includes: &[IncludePath],
    ) -> Result<Option<Record>, StorageError> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        QuerySource::load(&self.inner, entity, key, includes).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

#[async_trait]
impl GraphStore for RecordingStore {
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>, StorageError> {
        Ok(Box::new(RecordingTransaction {
            inner: self.inner.begin_transaction().await?,
            counters: self.counters.clone(),
        }))
    }
}

struct RecordingTransaction {
    inner: Box<dyn Transaction>,
    counters: Arc<Counters>,
}

impl RecordingTransaction {
    fn wrote(&self) {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transaction for RecordingTransaction {
    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.inner.rollback().await
    }

    async fn load(
        &self,
        entity: &str,
        key: &ScalarValue,
        includes: &[IncludePath],
    ) -> Result<Option<Record>, StorageError> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(entity, key, includes).await
    }

    async fn insert(&mut self, entity: &str, record: Record) -> Result<ScalarValue, StorageError> {
        self.wrote();
        self.inner.insert(entity, record).await
    }

    async fn set_field(
        &mut self,
        entity: &str,
        key: &ScalarValue,
        field: &str,
        value: ScalarValue,
    ) -> Result<(), StorageError> {
        self.wrote();
        self.inner.set_field(entity, key, field, value).await
    }

    async fn delete(&mut self, entity: &str, key: &ScalarValue) -> Result<(), StorageError> {
        self.wrote();
        self.inner.delete(entity, key).await
    }

    async fn link(&mut self, table: &str, parent: &ScalarValue, child: &ScalarValue) -> Result<bool, StorageError> {
        self.wrote();
        self.inner.link(table, parent, child).await
    }

    async fn unlink(&mut self, table: &str, parent: &ScalarValue, child: &ScalarValue) -> Result<bool, StorageError> {
        self.wrote();
        self.inner.unlink(table, parent, child).await
    }
}

struct Shop {
    engine: PatchEngine,
    storage: InMemoryStorage,
    store: RecordingStore,
    counters: Arc<Counters>,
}

async fn shop() -> Shop {
    let registry = Arc::new(shop_registry());
    let storage = InMemoryStorage::for_registry(&registry);
    for (entity, row) in shop_rows() {
        storage.seed(entity, row).await.unwrap();
    }
    for (table, parent, child) in shop_links() {
        storage.seed_link(table, &parent, &child).await.unwrap();
    }
    let counters = Arc::new(Counters::default());
    Shop {
        engine: PatchEngine::new(registry, PatchConfig::default()),
        store: RecordingStore {
            inner: storage.clone(),
            counters: counters.clone(),
        },
        storage,
        counters,
    }
}

impl Shop {
    async fn patch(&self, body: Value) -> Result<PatchOutcome, ApplyError> {
        let document = PatchDocument::from_value(body).unwrap();
        self.engine
            .apply(&self.store, "OrderDto", &document, &CancellationToken::new())
            .await
    }

    async fn row(&self, entity: &str, key: i32) -> Option<Record> {
        QuerySource::load(&self.storage, entity, &ScalarValue::Int32(key), &[])
            .await
            .unwrap()
    }

    async fn field(&self, entity: &str, key: i32, field: &str) -> Value {
        self.row(entity, key).await.unwrap()[field].clone()
    }
}

fn operation_error(err: ApplyError) -> (usize, PatchError) {
    match err {
        ApplyError::Operation { index, source } => (index, source),
        other => panic!("expected an operation failure, got {other}"),
    }
}

#[tokio::test]
async fn test_many_to_many_add_links_existing_member_only() {
    let shop = shop().await;
    let outcome = shop
        .patch(json!([{"op": "add", "path": "/12/tags/-", "value": {"id": 2}}]))
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 0);
    assert_eq!(outcome.linked, 1);
    assert_eq!(shop.storage.row_count("Tag").await, 3);
    assert_eq!(shop.storage.link_count("order_tags").await, 5);
    assert!(
        shop.storage
            .has_link("order_tags", &ScalarValue::Int32(12), &ScalarValue::Int32(2))
            .await
    );
}

#[tokio::test]
async fn test_many_to_many_add_of_missing_member_fails() {
    let shop = shop().await;
    let err = shop
        .patch(json!([{"op": "add", "path": "/12/tags/-", "value": {"id": 99, "label": "new"}}]))
        .await
        .unwrap_err();
    let validation = err.to_validation_errors().unwrap();
    assert_eq!(validation.first_code("operations[0]"), Some(ValidationCode::EntityNotFound));
    assert_eq!(shop.storage.row_count("Tag").await, 3);
    assert_eq!(shop.storage.link_count("order_tags").await, 4);
}

#[tokio::test]
async fn test_one_to_many_add_sets_foreign_key() {
    let shop = shop().await;
    let outcome = shop
        .patch(json!([{
            "op": "add",
            "path": "/12/lines/-",
            "value": {"quantity": 4, "unitPrice": 1.5, "product": {"id": 2}}
        }]))
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 1);
    assert_eq!(shop.storage.row_count("OrderLine").await, 5);
    let line = shop.row("OrderLine", 104).await.unwrap();
    assert_eq!(line["order_id"], 12);
    assert_eq!(line["product_id"], 2);
    assert_eq!(line["quantity"], 4);
}

#[tokio::test]
async fn test_add_root_entity_with_owned_and_linked_children() {
    let shop = shop().await;
    let outcome = shop
        .patch(json!([{
            "op": "add",
            "path": "/-",
            "value": {
                "placedOn": "2024-04-01",
                "status": "Pending",
                "customer": 2,
                "totalCents": 250,
                "lines": [{"quantity": 1, "unitPrice": 2.5, "product": 3}],
                "tags": [{"id": 2}]
            }
        }]))
        .await
        .unwrap();

    assert_eq!(outcome.created, vec![ScalarValue::Int32(14)]);
    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.linked, 1);
    assert_eq!(shop.field("Order", 14, "customer_id").await, 2);
    assert_eq!(shop.field("OrderLine", 104, "order_id").await, 14);
    assert_eq!(shop.storage.row_count("Tag").await, 3);
    assert!(
        shop.storage
            .has_link("order_tags", &ScalarValue::Int32(14), &ScalarValue::Int32(2))
            .await
    );
}

#[tokio::test]
async fn test_nested_replace_resolves_owner_once_and_is_idempotent() {
    let shop = shop().await;
    let body = json!([{"op": "replace", "path": "/10/lines/100/quantity", "value": 5}]);

    shop.patch(body.clone()).await.unwrap();
    assert_eq!(shop.counters.loads(), 1);
    assert_eq!(shop.counters.writes(), 1);
    assert_eq!(shop.field("OrderLine", 100, "quantity").await, 5);

    shop.counters.reset();
    let again = shop.patch(body).await.unwrap();
    assert_eq!(again.updated, 1);
    assert_eq!(shop.counters.loads(), 1);
    assert_eq!(shop.counters.writes(), 1);
    assert_eq!(shop.field("OrderLine", 100, "quantity").await, 5);
    assert_eq!(shop.field("OrderLine", 101, "quantity").await, 1);
}

#[tokio::test]
async fn test_flattened_member_replace_assigns_referenced_entity() {
    let shop = shop().await;
    shop.patch(json!([{"op": "replace", "path": "/12/customerName", "value": "Ada L."}]))
        .await
        .unwrap();
    assert_eq!(shop.counters.loads(), 1);
    assert_eq!(shop.counters.writes(), 1);
    assert_eq!(shop.field("Customer", 1, "name").await, "Ada L.");

    shop.patch(json!([{"op": "replace", "path": "/11/customer/email", "value": null}]))
        .await
        .unwrap();
    assert_eq!(shop.field("Customer", 2, "email").await, Value::Null);
}

#[tokio::test]
async fn test_failed_operation_rolls_back_earlier_ones() {
    let shop = shop().await;
    let err = shop
        .patch(json!([
            {"op": "replace", "path": "/10/status", "value": "Shipped"},
            {"op": "add", "path": "/10/tags/-", "value": {"id": 42}}
        ]))
        .await
        .unwrap_err();

    assert_eq!(err.operation_index(), Some(1));
    let (_, source) = operation_error(err);
    assert_eq!(source, PatchError::entity_not_found("Tag", 42));
    assert_eq!(shop.field("Order", 10, "status").await, "Pending");
}

#[tokio::test]
async fn test_failed_test_operation_aborts_document() {
    let shop = shop().await;
    shop.patch(json!([
        {"op": "test", "path": "/10/status", "value": "pending"},
        {"op": "test", "path": "/10/customer", "value": {"id": 1}},
        {"op": "replace", "path": "/10/note", "value": "ring twice"}
    ]))
    .await
    .unwrap();
    assert_eq!(shop.field("Order", 10, "note").await, "ring twice");

    let err = shop
        .patch(json!([
            {"op": "replace", "path": "/10/note", "value": "leave at door"},
            {"op": "test", "path": "/10/totalCents", "value": 1}
        ]))
        .await
        .unwrap_err();
    let (index, source) = operation_error(err);
    assert_eq!(index, 1);
    assert!(matches!(source, PatchError::TestFailed { .. }));
    assert_eq!(shop.field("Order", 10, "note").await, "ring twice");
}

#[tokio::test]
async fn test_computed_field_is_not_invertible() {
    let shop = shop().await;
    let err = shop
        .patch(json!([{"op": "replace", "path": "/10/summary", "value": "x"}]))
        .await
        .unwrap_err();
    let ApplyError::Invalid(errors) = err else {
        panic!("expected validation failure");
    };
    let failure = &errors.get("operations[0]").unwrap()[0];
    assert_eq!(failure.code, ValidationCode::CanNotCreateExpression);
    assert!(failure.message.contains("no inverse mapping"), "{}", failure.message);
    assert_eq!(shop.counters.loads(), 0);
}

#[tokio::test]
async fn test_field_after_collection_must_be_key() {
    let shop = shop().await;
    let err = shop
        .patch(json!([{"op": "replace", "path": "/10/lines/quantity", "value": 1}]))
        .await
        .unwrap_err();
    let errors = err.to_validation_errors().unwrap();
    assert_eq!(
        errors.first_code("operations[0]"),
        Some(ValidationCode::SegmentMustBeCollectionId)
    );
    assert_eq!(shop.counters.loads(), 0);
}

#[tokio::test]
async fn test_cancelled_document_commits_nothing() {
    let shop = shop().await;
    let document = PatchDocument::from_value(json!([
        {"op": "replace", "path": "/10/status", "value": "Shipped"}
    ]))
    .unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = shop
        .engine
        .apply(&shop.store, "OrderDto", &document, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ApplyError::Cancelled { applied: 0 }));
    assert_eq!(shop.counters.writes(), 0);
    assert_eq!(shop.field("Order", 10, "status").await, "Pending");
}

#[tokio::test]
async fn test_remove_nested_elements() {
    let shop = shop().await;
    let outcome = shop
        .patch(json!([
            {"op": "remove", "path": "/13/tags/3"},
            {"op": "remove", "path": "/13/lines/103"}
        ]))
        .await
        .unwrap();

    assert_eq!(outcome.unlinked, 1);
    assert_eq!(outcome.deleted, 1);
    assert_eq!(shop.storage.row_count("Tag").await, 3);
    assert_eq!(shop.storage.link_count("order_tags").await, 3);
    assert!(shop.row("OrderLine", 103).await.is_none());

    let err = shop
        .patch(json!([{"op": "remove", "path": "/13/lines/100"}]))
        .await
        .unwrap_err();
    let (_, source) = operation_error(err);
    assert_eq!(source, PatchError::entity_not_found("OrderLine", 100));
    assert!(shop.row("OrderLine", 100).await.is_some());
}

#[tokio::test]
async fn test_remove_root_cascades() {
    let shop = shop().await;
    shop.patch(json!([{"op": "remove", "path": "/11"}])).await.unwrap();
    assert!(shop.row("Order", 11).await.is_none());
    assert!(shop.row("OrderLine", 102).await.is_none());
    assert_eq!(shop.storage.link_count("order_tags").await, 3);
    assert!(shop.row("Customer", 2).await.is_some());

    let err = shop.patch(json!([{"op": "remove", "path": "/11"}])).await.unwrap_err();
    assert_eq!(
        err.to_validation_errors().unwrap().first_code("operations[0]"),
        Some(ValidationCode::EntityNotFound)
    );
}

#[tokio::test]
async fn test_reference_replace_and_field_remove() {
    let shop = shop().await;
    let outcome = shop
        .patch(json!([
            {"op": "replace", "path": "/12/customer", "value": {"id": 3}},
            {"op": "remove", "path": "/10/note"}
        ]))
        .await
        .unwrap();
    assert_eq!(outcome.updated, 2);
    assert_eq!(shop.field("Order", 12, "customer_id").await, 3);
    assert_eq!(shop.field("Order", 10, "note").await, Value::Null);

    let err = shop
        .patch(json!([{"op": "replace", "path": "/12/customer", "value": 99}]))
        .await
        .unwrap_err();
    let (_, source) = operation_error(err);
    assert!(source.is_not_found());
    assert_eq!(shop.field("Order", 12, "customer_id").await, 3);
}

#[tokio::test]
async fn test_unknown_order_is_entity_not_found() {
    let shop = shop().await;
    let err = shop
        .patch(json!([{"op": "replace", "path": "/404/status", "value": "Shipped"}]))
        .await
        .unwrap_err();
    let (index, source) = operation_error(err);
    assert_eq!(index, 0);
    assert_eq!(source, PatchError::entity_not_found("Order", 404));
}
