//! Patch value conversion.
//!
//! Raw JSON from a patch document is converted against the presentation
//! types it is addressed to:
//!
//! 1. an object for an edit type is converted property by property, each
//!    property resolved as a field of that type;
//! 2. a list for a collection is converted element by element;
//! 3. a scalar is converted directly to the target kind, which covers
//!    numeric strings and 64-bit integers narrowed to 32-bit keys;
//! 4. anything else is rejected with the conversion error.

use graft_core::{ScalarKind, ScalarValue, TypeName};
use graft_mapping::{FieldMapping, MappingRegistry, RelationKind, ResolveError, Terminal, resolve_field};
use graft_storage::Record;
use serde_json::Value;

use crate::error::PatchError;
use crate::path::FieldTail;

/// An entity to insert, with the children it owns or links.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityValue {
    pub entity: TypeName,
    pub key_field: String,
    pub key: Option<ScalarValue>,
    pub columns: Record,
    pub references: Vec<ReferenceValue>,
    pub children: Vec<ChildCollection>,
}

impl EntityValue {
    fn new(entity: TypeName, key_field: String) -> Self {
        Self {
            entity,
            key_field,
            key: None,
            columns: Record::new(),
            references: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn set_key(&mut self, key: ScalarValue) {
        self.columns.insert(self.key_field.clone(), key.to_json());
        self.key = Some(key);
    }

    pub fn set_column(&mut self, column: impl Into<String>, value: &ScalarValue) {
        self.columns.insert(column.into(), value.to_json());
    }

    /// Rows this value inserts, itself included; linked members do not count.
    pub fn owned_rows(&self) -> usize {
        1 + self
            .children
            .iter()
            .filter(|c| matches!(c.relation, RelationKind::OneToMany { .. }))
            .flat_map(|c| &c.elements)
            .map(EntityValue::owned_rows)
            .sum::<usize>()
    }
}

/// A foreign key set through a nested reference; the target must exist.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceValue {
    pub foreign_key: String,
    pub target: TypeName,
    pub key: ScalarValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChildCollection {
    pub field: String,
    pub target: TypeName,
    pub relation: RelationKind,
    pub elements: Vec<EntityValue>,
}

/// Value assigned to, or compared with, a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(ScalarValue),
    /// Key of the referenced entity, `Null` to clear the reference.
    Reference { target: TypeName, key: ScalarValue },
}

pub struct ValueConverter<'r> {
    registry: &'r MappingRegistry,
}

impl<'r> ValueConverter<'r> {
    pub fn new(registry: &'r MappingRegistry) -> Self {
        Self { registry }
    }

    /// Convert an object addressed to the edit type `dto`.
    pub fn entity(&self, dto: &str, value: &Value) -> Result<EntityValue, PatchError> {
        let def = self
            .registry
            .dto(dto)
            .ok_or_else(|| ResolveError::UnknownType(dto.to_string()))?;
        if !def.editable {
            return Err(ResolveError::NotEditable(dto.to_string()).into());
        }
        let entity = self
            .registry
            .entity(&def.entity)
            .ok_or_else(|| ResolveError::UnknownType(def.entity.clone()))?;
        let Value::Object(properties) = value else {
            return Err(PatchError::conversion(
                dto,
                format!("expected an object, found {}", json_type(value)),
            ));
        };

        let mut out = EntityValue::new(entity.name.clone(), entity.key.clone());
        for (name, raw) in properties {
            let mapping = resolve_field(self.registry, dto, name)?;
            self.registry.reverse(dto, name)?;
            let field = mapping.presentation_field.as_str();
            let [segment] = mapping.segments.as_slice() else {
                return Err(PatchError::conversion(
                    field,
                    "a flattened member can only be replaced on an existing entity",
                ));
            };

            match &mapping.terminal {
                Terminal::Scalar(kind) => {
                    let value = scalar(field, kind, raw)?;
                    if segment.name == entity.key {
                        if !value.is_null() {
                            out.set_key(value);
                        }
                    } else {
                        out.set_column(segment.name.clone(), &value);
                    }
                }
                Terminal::Reference {
                    target,
                    foreign_key,
                } => {
                    let key = self.reference_key(field, mapping.nested.as_deref(), target, raw)?;
                    out.set_column(foreign_key.clone(), &key);
                    if !key.is_null() {
                        out.references.push(ReferenceValue {
                            foreign_key: foreign_key.clone(),
                            target: target.clone(),
                            key,
                        });
                    }
                }
                Terminal::Collection { target, relation } => {
                    let element_dto = mapping.nested.as_deref().ok_or_else(|| {
                        PatchError::relation_misconfigured(format!("collection '{dto}.{field}' has no element type"))
                    })?;
                    let elements = match raw {
                        Value::Null => Vec::new(),
                        Value::Array(items) => items
                            .iter()
                            .map(|item| self.entity(element_dto, item))
                            .collect::<Result<_, _>>()?,
                        other => {
                            return Err(PatchError::conversion(
                                field,
                                format!("expected a list, found {}", json_type(other)),
                            ));
                        }
                    };
                    out.children.push(ChildCollection {
                        field: segment.name.clone(),
                        target: target.clone(),
                        relation: relation.clone(),
                        elements,
                    });
                }
                Terminal::Computed => {
                    return Err(ResolveError::MappingNotInvertible {
                        type_name: dto.to_string(),
                        field: field.to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(out)
    }

    /// Convert a value addressed to a single field.
    pub fn field(&self, tail: &FieldTail, value: &Value) -> Result<FieldValue, PatchError> {
        match &tail.terminal {
            Terminal::Scalar(kind) => scalar(&tail.field, kind, value).map(FieldValue::Scalar),
            Terminal::Reference { target, .. } => {
                let key = self.reference_key(&tail.field, tail.nested.as_deref(), target, value)?;
                Ok(FieldValue::Reference {
                    target: target.clone(),
                    key,
                })
            }
            Terminal::Collection { .. } => Err(PatchError::conversion(
                &tail.field,
                "a collection is changed through its elements",
            )),
            Terminal::Computed => Err(ResolveError::MappingNotInvertible {
                type_name: tail.dto.clone(),
                field: tail.field.clone(),
            }
            .into()),
        }
    }

    /// Key of a referenced entity given either as the key itself or as an
    /// object carrying it.
    fn reference_key(
        &self,
        field: &str,
        nested: Option<&str>,
        target: &str,
        raw: &Value,
    ) -> Result<ScalarValue, PatchError> {
        let entity = self
            .registry
            .entity(target)
            .ok_or_else(|| ResolveError::UnknownType(target.to_string()))?;
        let kind = entity.key_kind();
        let Value::Object(properties) = raw else {
            return scalar(field, kind, raw);
        };
        let nested = nested.ok_or_else(|| {
            PatchError::conversion(field, "reference has no presentation type to read its key from")
        })?;
        let mut key = None;
        for (name, value) in properties {
            let mapping = resolve_field(self.registry, nested, name)?;
            self.nested_property(nested, mapping, value)?;
            if let [segment] = mapping.segments.as_slice()
                && segment.name == entity.key
            {
                key = Some(value);
            }
        }
        match key {
            Some(key) => scalar(field, kind, key),
            None => Err(PatchError::conversion(
                field,
                format!("reference to {target} needs its key"),
            )),
        }
    }

    /// Check one property of an object standing in for an existing entity.
    /// Only the key is kept, but every sibling must still convert.
    fn nested_property(&self, dto: &str, mapping: &FieldMapping, raw: &Value) -> Result<(), PatchError> {
        let field = mapping.presentation_field.as_str();
        match &mapping.terminal {
            Terminal::Scalar(kind) => scalar(field, kind, raw).map(|_| ()),
            Terminal::Reference { target, .. } => {
                if raw.is_null() {
                    return Ok(());
                }
                self.reference_key(field, mapping.nested.as_deref(), target, raw).map(|_| ())
            }
            Terminal::Collection { .. } => {
                let element_dto = mapping.nested.as_deref().ok_or_else(|| {
                    PatchError::relation_misconfigured(format!("collection '{dto}.{field}' has no element type"))
                })?;
                match raw {
                    Value::Null => Ok(()),
                    Value::Array(items) => {
                        for item in items {
                            let Value::Object(properties) = item else {
                                return Err(PatchError::conversion(
                                    field,
                                    format!("expected an object, found {}", json_type(item)),
                                ));
                            };
                            for (name, value) in properties {
                                let element = resolve_field(self.registry, element_dto, name)?;
                                self.nested_property(element_dto, element, value)?;
                            }
                        }
                        Ok(())
                    }
                    other => Err(PatchError::conversion(
                        field,
                        format!("expected a list, found {}", json_type(other)),
                    )),
                }
            }
            Terminal::Computed => Err(ResolveError::MappingNotInvertible {
                type_name: dto.to_string(),
                field: field.to_string(),
            }
            .into()),
        }
    }
}

fn scalar(field: &str, kind: &ScalarKind, raw: &Value) -> Result<ScalarValue, PatchError> {
    kind.from_json(raw).map_err(|e| PatchError::conversion(field, e))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::{ToValidationFailure, ValidationCode};
    use graft_mapping::fixtures::shop_registry;
    use serde_json::json;

    #[test]
    fn test_entity_with_owned_and_linked_children() {
        let registry = shop_registry();
        let converter = ValueConverter::new(&registry);
        let order = converter
            .entity(
                "OrderDto",
                &json!({
                    "placedOn": "2024-04-01",
                    "status": "pending",
                    "customer": {"id": 2, "name": "ignored"},
                    "totalCents": 700,
                    "lines": [{"quantity": 3, "unitPrice": 2.5, "product": 1}],
                    "tags": [{"id": 3}]
                }),
            )
            .unwrap();

        assert_eq!(order.entity, "Order");
        assert_eq!(order.key, None);
        assert_eq!(order.columns["status"], "Pending");
        assert_eq!(order.columns["customer_id"], 2);
        assert_eq!(order.references.len(), 1);
        assert_eq!(order.children.len(), 2);
        let lines = &order.children[0];
        assert_eq!(lines.field, "lines");
        assert_eq!(lines.elements[0].columns["product_id"], 1);
        assert_eq!(order.owned_rows(), 2);
    }

    #[test]
    fn test_integer_narrowing_and_string_keys() {
        let registry = shop_registry();
        let converter = ValueConverter::new(&registry);
        let tag = converter.entity("TagDto", &json!({"id": "7", "label": "x"})).unwrap();
        assert_eq!(tag.key, Some(ScalarValue::Int32(7)));

        let err = converter
            .entity("TagDto", &json!({"id": 5_000_000_000_i64}))
            .unwrap_err();
        assert!(matches!(err, PatchError::Conversion { .. }));
    }

    #[test]
    fn test_reference_object_checks_every_property() {
        let registry = shop_registry();
        let converter = ValueConverter::new(&registry);
        let convert = |customer: Value| converter.entity("OrderDto", &json!({ "customer": customer }));

        let order = convert(json!({"name": "Brian", "id": 2, "tier": "silver"})).unwrap();
        assert_eq!(order.columns["customer_id"], 2);

        for customer in [json!({"aaa": 1, "id": 2}), json!({"id": 2, "zzz": 1})] {
            let err = convert(customer).unwrap_err();
            assert_eq!(err.validation_code(), ValidationCode::PropertyDoesNotExist);
        }
        for customer in [json!({"name": {"x": 1}, "id": 2}), json!({"id": 2, "name": {"x": 1}})] {
            let err = convert(customer).unwrap_err();
            assert_eq!(err.validation_code(), ValidationCode::CanNotCreateExpression);
        }
        let err = convert(json!({"id": 2, "tier": "Platinum"})).unwrap_err();
        assert!(matches!(err, PatchError::Conversion { .. }));
        assert!(convert(json!({"name": "Brian"})).is_err());
    }

    #[test]
    fn test_rejections() {
        let registry = shop_registry();
        let converter = ValueConverter::new(&registry);
        let code = |dto: &str, value: Value| converter.entity(dto, &value).unwrap_err().validation_code();

        assert_eq!(code("OrderDto", json!({"summary": "x"})), ValidationCode::CanNotCreateExpression);
        assert_eq!(code("OrderDto", json!({"customerName": "x"})), ValidationCode::CanNotCreateExpression);
        assert_eq!(code("OrderDto", json!({"bogus": 1})), ValidationCode::PropertyDoesNotExist);
        assert_eq!(code("OrderDto", json!({"lines": {"quantity": 1}})), ValidationCode::CanNotCreateExpression);
        assert_eq!(code("OrderDto", json!({"placedOn": 20240101})), ValidationCode::CanNotCreateExpression);
        assert_eq!(code("ProductDto", json!({"name": "x"})), ValidationCode::CanNotCreateExpression);
        assert_eq!(code("OrderDto", json!([1, 2])), ValidationCode::CanNotCreateExpression);
    }
}
