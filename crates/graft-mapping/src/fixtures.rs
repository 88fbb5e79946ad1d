//! A small shop schema shared by the test suites.
//!
//! Orders reference a customer, own their lines (one-to-many) and are tagged
//! through the `order_tags` link table (many-to-many).

use graft_core::ScalarKind;
use serde_json::{Value, json};

use crate::filterable::ComparisonStrategy;
use crate::presentation::{DtoDef, DtoField};
use crate::registry::{MappingRegistry, RegistryBuilder};
use crate::schema::EntityDef;

pub fn order_status() -> ScalarKind {
    ScalarKind::enumeration(["Pending", "Shipped", "Cancelled"])
}

pub fn shop_builder() -> RegistryBuilder {
    MappingRegistry::builder()
        .entity(
            EntityDef::new("Customer", "id", ScalarKind::Int32)
                .scalar("name", ScalarKind::Text)
                .scalar("email", ScalarKind::Text)
                .scalar("tier", ScalarKind::enumeration(["Bronze", "Silver", "Gold"])),
        )
        .entity(
            EntityDef::new("Product", "id", ScalarKind::Int32)
                .scalar("name", ScalarKind::Text)
                .scalar("sku", ScalarKind::Text),
        )
        .entity(EntityDef::new("Tag", "id", ScalarKind::Int32).scalar("label", ScalarKind::Text))
        .entity(
            EntityDef::new("Order", "id", ScalarKind::Int32)
                .scalar("placed_on", ScalarKind::Date)
                .scalar("status", order_status())
                .scalar("customer_id", ScalarKind::Int32)
                .scalar("note", ScalarKind::Text)
                .scalar("total_cents", ScalarKind::Int64)
                .reference("customer", "Customer", "customer_id")
                .one_to_many("lines", "OrderLine", "order_id")
                .many_to_many("tags", "Tag", "order_tags", "order_id", "tag_id"),
        )
        .entity(
            EntityDef::new("OrderLine", "id", ScalarKind::Int32)
                .scalar("order_id", ScalarKind::Int32)
                .scalar("product_id", ScalarKind::Int32)
                .scalar("quantity", ScalarKind::Int32)
                .scalar("unit_price", ScalarKind::Float)
                .reference("product", "Product", "product_id"),
        )
        .dto(
            DtoDef::new("OrderDto", "Order")
                .editable()
                .field(DtoField::member("id", "id").filterable(ComparisonStrategy::Equals))
                .field(DtoField::member("placedOn", "placed_on").filterable(ComparisonStrategy::Equals))
                .field(DtoField::member("status", "status").filterable(ComparisonStrategy::Equals))
                .field(
                    DtoField::nested("customer", "customer", "CustomerDto")
                        .filterable(ComparisonStrategy::ByForeignKeyId),
                )
                .field(
                    DtoField::member("customerName", "customer.name")
                        .filterable(ComparisonStrategy::Equals),
                )
                .field(
                    DtoField::nested("lines", "lines", "OrderLineDto")
                        .filterable(ComparisonStrategy::NestedCollection),
                )
                .field(
                    DtoField::nested("tags", "tags", "TagDto")
                        .filterable(ComparisonStrategy::NestedCollection),
                )
                .field(DtoField::member("note", "note"))
                .field(DtoField::member("totalCents", "total_cents").filterable(ComparisonStrategy::Equals))
                .field(
                    DtoField::computed("summary", "status || ' for ' || customer.name")
                        .filterable(ComparisonStrategy::Equals),
                ),
        )
        .dto(
            DtoDef::new("OrderLineDto", "OrderLine")
                .editable()
                .field(DtoField::member("id", "id").filterable(ComparisonStrategy::Equals))
                .field(DtoField::member("quantity", "quantity").filterable(ComparisonStrategy::Equals))
                .field(DtoField::member("unitPrice", "unit_price"))
                .field(
                    DtoField::nested("product", "product", "ProductDto")
                        .filterable(ComparisonStrategy::ByForeignKeyId),
                )
                .field(DtoField::member("productId", "product_id"))
                .field(
                    DtoField::member("productName", "product.name")
                        .read_only()
                        .filterable(ComparisonStrategy::Equals),
                ),
        )
        .dto(
            DtoDef::new("CustomerDto", "Customer")
                .editable()
                .field(DtoField::member("id", "id").filterable(ComparisonStrategy::Equals))
                .field(DtoField::member("name", "name").filterable(ComparisonStrategy::Equals))
                .field(DtoField::member("email", "email"))
                .field(DtoField::member("tier", "tier").filterable(ComparisonStrategy::Equals)),
        )
        .dto(
            DtoDef::new("TagDto", "Tag")
                .editable()
                .field(DtoField::member("id", "id").filterable(ComparisonStrategy::Equals))
                .field(DtoField::member("label", "label").filterable(ComparisonStrategy::Equals)),
        )
        .dto(
            DtoDef::new("ProductDto", "Product")
                .field(DtoField::member("id", "id").filterable(ComparisonStrategy::Equals))
                .field(DtoField::member("name", "name").filterable(ComparisonStrategy::Equals))
                .field(DtoField::member("sku", "sku")),
        )
}

pub fn shop_registry() -> MappingRegistry {
    match shop_builder().build() {
        Ok(registry) => registry,
        Err(e) => panic!("shop fixture registry is inconsistent: {e}"),
    }
}

/// Seed rows as `(entity, record)`.
pub fn shop_rows() -> Vec<(&'static str, Value)> {
    vec![
        ("Customer", json!({"id": 1, "name": "Ada", "email": "ada@example.com", "tier": "Gold"})),
        ("Customer", json!({"id": 2, "name": "Brian", "email": "brian@example.com", "tier": "Silver"})),
        ("Customer", json!({"id": 3, "name": "Chen", "email": null, "tier": "Bronze"})),
        ("Product", json!({"id": 1, "name": "Widget", "sku": "W-1"})),
        ("Product", json!({"id": 2, "name": "Gadget", "sku": "G-1"})),
        ("Product", json!({"id": 3, "name": "Doohickey", "sku": "D-1"})),
        ("Tag", json!({"id": 1, "label": "urgent"})),
        ("Tag", json!({"id": 2, "label": "gift"})),
        ("Tag", json!({"id": 3, "label": "bulk"})),
        ("Order", json!({"id": 10, "placed_on": "2024-01-05", "status": "Pending", "customer_id": 1, "note": "leave at door", "total_cents": 1500})),
        ("Order", json!({"id": 11, "placed_on": "2024-02-10", "status": "Shipped", "customer_id": 2, "note": null, "total_cents": 4200})),
        ("Order", json!({"id": 12, "placed_on": "2024-02-10", "status": "Cancelled", "customer_id": 1, "note": null, "total_cents": 300})),
        ("Order", json!({"id": 13, "placed_on": "2024-03-20", "status": "Shipped", "customer_id": 3, "note": "fragile", "total_cents": 9900})),
        ("OrderLine", json!({"id": 100, "order_id": 10, "product_id": 1, "quantity": 2, "unit_price": 5.0})),
        ("OrderLine", json!({"id": 101, "order_id": 10, "product_id": 2, "quantity": 1, "unit_price": 5.0})),
        ("OrderLine", json!({"id": 102, "order_id": 11, "product_id": 3, "quantity": 7, "unit_price": 6.0})),
        ("OrderLine", json!({"id": 103, "order_id": 13, "product_id": 1, "quantity": 1, "unit_price": 99.0})),
    ]
}

/// Seed link rows as `(link table, parent key, child key)`.
pub fn shop_links() -> Vec<(&'static str, Value, Value)> {
    vec![
        ("order_tags", json!(10), json!(1)),
        ("order_tags", json!(11), json!(2)),
        ("order_tags", json!(13), json!(1)),
        ("order_tags", json!(13), json!(3)),
    ]
}
