//! Validation of patch operations before any storage access.

use graft_core::ScalarValue;
use graft_mapping::{MappingRegistry, Terminal};
use serde_json::Value;

use crate::convert::{EntityValue, FieldValue, ValueConverter};
use crate::document::{PatchOp, PatchOpKind};
use crate::error::PatchError;
use crate::path::{ElementKey, FieldTail, PatchPath, resolve_patch_path};

/// What a prepared operation carries to the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedValue {
    /// Whole element to insert or link.
    Entity(EntityValue),
    Field(FieldValue),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedOperation {
    pub index: usize,
    pub kind: PatchOpKind,
    pub path: PatchPath,
    pub value: PreparedValue,
}

/// Resolve and convert one operation of a document addressed to `dto`.
pub fn prepare_operation(
    registry: &MappingRegistry,
    dto: &str,
    index: usize,
    op: &PatchOp,
) -> Result<PreparedOperation, PatchError> {
    if matches!(op.kind, PatchOpKind::Move | PatchOpKind::Copy) {
        return Err(PatchError::UnsupportedOperation {
            op: op.kind.to_string(),
        });
    }
    let path = resolve_patch_path(registry, dto, &op.path)?;
    if op.kind.is_write() {
        path.ensure_writable(registry)?;
    }
    let converter = ValueConverter::new(registry);
    let invalid = |reason: &str| PatchError::invalid_target(op.kind, &op.path, reason);

    let value = match (&path.tail, op.kind) {
        (Some(tail), _) if matches!(tail.terminal, Terminal::Collection { .. }) => {
            return Err(invalid("address an element of the collection by key or '-'"));
        }
        (Some(tail), PatchOpKind::Remove) => PreparedValue::Field(clear(tail)),
        (Some(tail), _) => {
            let raw = required_value(op)?;
            PreparedValue::Field(converter.field(tail, raw)?)
        }
        (None, PatchOpKind::Add) => {
            let raw = required_value(op)?;
            let mut entity = converter.entity(path.element_dto(), raw)?;
            merge_path_key(&mut entity, path.element_key(), &op.path)?;
            PreparedValue::Entity(entity)
        }
        (None, PatchOpKind::Remove) => {
            if path.element_key() == &ElementKey::Append {
                return Err(invalid("'-' does not name an element"));
            }
            PreparedValue::None
        }
        (None, _) => return Err(invalid("only fields of an element can be replaced or tested")),
    };

    tracing::trace!(index, op = %op.kind, types = ?path.type_chain(), "operation prepared");
    Ok(PreparedOperation {
        index,
        kind: op.kind,
        path,
        value,
    })
}

fn required_value(op: &PatchOp) -> Result<&Value, PatchError> {
    op.value.as_ref().ok_or_else(|| PatchError::MissingValue {
        op: op.kind.to_string(),
    })
}

/// Value that a `remove` of a field assigns.
fn clear(tail: &FieldTail) -> FieldValue {
    match &tail.terminal {
        Terminal::Reference { target, .. } => FieldValue::Reference {
            target: target.clone(),
            key: ScalarValue::Null,
        },
        _ => FieldValue::Scalar(ScalarValue::Null),
    }
}

/// A key in the path wins over a missing key in the value; two different
/// keys are a conflict.
fn merge_path_key(entity: &mut EntityValue, key: &ElementKey, path: &str) -> Result<(), PatchError> {
    let ElementKey::Id(path_key) = key else {
        return Ok(());
    };
    match &entity.key {
        Some(value_key) if value_key != path_key => Err(PatchError::conversion(
            entity.key_field.clone(),
            format!("key {value_key} in the value does not match '{path}'"),
        )),
        _ => {
            entity.set_key(path_key.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_core::{ToValidationFailure, ValidationCode};
    use graft_mapping::fixtures::shop_registry;
    use serde_json::json;

    fn prepare(kind: PatchOpKind, path: &str, value: Option<Value>) -> Result<PreparedOperation, PatchError> {
        prepare_operation(&shop_registry(), "OrderDto", 0, &PatchOp::new(kind, path, value))
    }

    fn code(kind: PatchOpKind, path: &str, value: Option<Value>) -> ValidationCode {
        prepare(kind, path, value).unwrap_err().validation_code()
    }

    #[test]
    fn test_replace_scalar() {
        let op = prepare(PatchOpKind::Replace, "/10/status", Some(json!("shipped"))).unwrap();
        assert_eq!(
            op.value,
            PreparedValue::Field(FieldValue::Scalar(ScalarValue::Enum("Shipped".into())))
        );
    }

    #[test]
    fn test_add_element_takes_key_from_path() {
        let op = prepare(PatchOpKind::Add, "/10/tags/2", Some(json!({}))).unwrap();
        let PreparedValue::Entity(tag) = op.value else {
            panic!("expected entity");
        };
        assert_eq!(tag.key, Some(ScalarValue::Int32(2)));

        assert_eq!(
            code(PatchOpKind::Add, "/10/tags/2", Some(json!({"id": 3}))),
            ValidationCode::CanNotCreateExpression
        );
    }

    #[test]
    fn test_remove_field_clears_it() {
        let op = prepare(PatchOpKind::Remove, "/10/customer", None).unwrap();
        assert!(matches!(
            op.value,
            PreparedValue::Field(FieldValue::Reference { key: ScalarValue::Null, .. })
        ));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(code(PatchOpKind::Move, "/10/note", None), ValidationCode::ExpressionIsUndefined);
        assert_eq!(code(PatchOpKind::Copy, "/10/note", None), ValidationCode::ExpressionIsUndefined);
        assert_eq!(
            code(PatchOpKind::Replace, "/10/summary", Some(json!("x"))),
            ValidationCode::CanNotCreateExpression
        );
        assert_eq!(
            code(PatchOpKind::Replace, "/10/lines/quantity", Some(json!(1))),
            ValidationCode::SegmentMustBeCollectionId
        );
        assert_eq!(code(PatchOpKind::Replace, "/10/note", None), ValidationCode::CanNotCreateExpression);
        assert_eq!(code(PatchOpKind::Replace, "/10", Some(json!({}))), ValidationCode::CanNotCreateExpression);
        assert_eq!(code(PatchOpKind::Remove, "/10/lines", None), ValidationCode::CanNotCreateExpression);
        assert_eq!(code(PatchOpKind::Remove, "/-", None), ValidationCode::CanNotCreateExpression);
        assert_eq!(
            code(PatchOpKind::Replace, "/10/totalCents", Some(json!("many"))),
            ValidationCode::CanNotCreateExpression
        );
    }

    #[test]
    fn test_test_operation_skips_writability() {
        assert!(prepare(PatchOpKind::Test, "/10/lines/100/productName", Some(json!("Widget"))).is_ok());
        assert!(prepare(PatchOpKind::Replace, "/10/lines/100/productName", Some(json!("x"))).is_err());
    }
}
