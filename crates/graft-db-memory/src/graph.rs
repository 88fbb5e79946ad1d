//! Materializing navigations on stored rows.
//!
//! A row only holds scalar columns. Include paths ask for navigations to be
//! nested into a copy of the row: references become objects (or `null`),
//! collections become arrays.

use std::collections::BTreeMap;

use graft_mapping::{RelationKind, StorageFieldKind, StorageSchema};
use graft_storage::{FieldPath, IncludePath, Record, StorageError};
use serde_json::Value;

use crate::tables::{Tables, json_key, record_key};

/// Copy `record` of `entity` with the navigations of `includes` nested in.
pub(crate) fn materialize(
    schema: &StorageSchema,
    tables: &Tables,
    entity: &str,
    record: &Record,
    includes: &[IncludePath],
) -> Result<Record, StorageError> {
    let mut out = record.clone();
    if includes.is_empty() {
        return Ok(out);
    }
    let def = schema
        .entity(entity)
        .ok_or_else(|| StorageError::unknown_type(entity))?;

    let mut grouped: BTreeMap<&str, Vec<IncludePath>> = BTreeMap::new();
    for include in includes {
        if let Some((first, rest)) = include.segments().split_first() {
            grouped
                .entry(first.as_str())
                .or_default()
                .push(FieldPath::new(rest.iter().cloned()));
        }
    }

    for (navigation, nested) in grouped {
        let nested: Vec<IncludePath> = nested.into_iter().filter(|p| !p.is_empty()).collect();
        let field = def.field(navigation).ok_or_else(|| {
            StorageError::invalid_record(format!("'{entity}' has no navigation '{navigation}'"))
        })?;
        let value = match &field.kind {
            StorageFieldKind::Scalar(_) => {
                return Err(StorageError::invalid_record(format!(
                    "'{entity}.{navigation}' is a scalar and cannot be included"
                )));
            }
            StorageFieldKind::Reference {
                target,
                foreign_key,
            } => match record.get(foreign_key).and_then(json_key) {
                Some(key) => match tables.row(target, &key) {
                    Some(row) => Value::Object(materialize(schema, tables, target, row, &nested)?),
                    None => Value::Null,
                },
                None => Value::Null,
            },
            StorageFieldKind::Collection { target, relation } => {
                let parent = record_key(def, record).unwrap_or_default();
                let children: Vec<&Record> = match relation {
                    RelationKind::OneToMany { foreign_key } => tables
                        .rows(target)
                        .filter(|child| {
                            child.get(foreign_key).and_then(json_key).as_deref() == Some(parent.as_str())
                        })
                        .collect(),
                    RelationKind::ManyToMany { link_table, .. } => tables
                        .links(link_table)
                        .filter(|(p, _)| *p == parent)
                        .filter_map(|(_, child)| tables.row(target, child))
                        .collect(),
                };
                let mut items = Vec::with_capacity(children.len());
                for child in children {
                    items.push(Value::Object(materialize(schema, tables, target, child, &nested)?));
                }
                Value::Array(items)
            }
        };
        out.insert(navigation.to_string(), value);
    }
    Ok(out)
}
