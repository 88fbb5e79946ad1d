//! Storage-level predicates, sort keys and queries.
//!
//! Paths here are in storage vocabulary. A [`Predicate`] is evaluated against
//! a record whose navigations were materialized by the query source, so the
//! include paths a predicate needs are derivable from the predicate itself.

use std::cmp::Ordering;
use std::fmt;

use graft_core::{ScalarKind, ScalarValue, TypeName};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Record;

/// Dotted storage path relative to the record being tested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath(Vec<String>);

/// Navigation chain a query source must materialize, e.g. `lines.product`.
pub type IncludePath = FieldPath;

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.').filter(|s| !s.is_empty()))
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

    /// Everything but the last segment.
    pub fn parent(&self) -> FieldPath {
        let end = self.0.len().saturating_sub(1);
        Self(self.0[..end].to_vec())
    }

    pub fn join(&self, other: &FieldPath) -> FieldPath {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Values reachable from `record` along `segments`. Arrays met on the way are
/// flattened, so a path through a collection yields every element's value.
pub fn values_at<'a>(record: &'a Record, segments: &[String]) -> Vec<&'a Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Vec::new();
    };
    let mut current: Vec<&Value> = record.get(first).into_iter().collect();
    for segment in rest {
        current = current
            .into_iter()
            .flat_map(|value| match value {
                Value::Array(items) => items.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .filter_map(|value| value.get(segment.as_str()))
            .collect();
    }
    current
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ge,
    Le,
}

impl CompareOp {
    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ge => ordering != Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

/// Boolean expression over a storage record.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `path op value`, with the stored value read as `kind`.
    Compare {
        path: FieldPath,
        kind: ScalarKind,
        op: CompareOp,
        value: ScalarValue,
    },
    /// At least one element of `collection` satisfies `predicate`, which is
    /// evaluated relative to the element.
    Any {
        collection: FieldPath,
        predicate: Box<Predicate>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(path: FieldPath, kind: ScalarKind, op: CompareOp, value: ScalarValue) -> Self {
        Self::Compare {
            path,
            kind,
            op,
            value,
        }
    }

    pub fn any(collection: FieldPath, predicate: Predicate) -> Self {
        Self::Any {
            collection,
            predicate: Box::new(predicate),
        }
    }

    /// Conjunction; a single part is returned as is.
    pub fn and(mut parts: Vec<Predicate>) -> Self {
        if parts.len() == 1 {
            return parts.remove(0);
        }
        Self::And(parts)
    }

    /// Disjunction; a single part is returned as is.
    pub fn or(mut parts: Vec<Predicate>) -> Self {
        if parts.len() == 1 {
            return parts.remove(0);
        }
        Self::Or(parts)
    }

    pub fn negate(predicate: Predicate) -> Self {
        Self::Not(Box::new(predicate))
    }

    /// Check if a record matches this predicate
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Compare {
                path,
                kind,
                op,
                value,
            } => values_at(record, path.segments())
                .into_iter()
                .any(|stored| compare_stored(stored, kind, *op, value)),
            Self::Any {
                collection,
                predicate,
            } => values_at(record, collection.segments())
                .into_iter()
                .flat_map(|value| match value {
                    Value::Array(items) => items.iter().collect::<Vec<_>>(),
                    other => vec![other],
                })
                .filter_map(Value::as_object)
                .any(|element| predicate.matches(element)),
            Self::And(parts) => parts.iter().all(|p| p.matches(record)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(record)),
            Self::Not(inner) => !inner.matches(record),
        }
    }

    /// Navigations that must be materialized to evaluate this predicate.
    pub fn includes(&self) -> Vec<IncludePath> {
        let mut out = Vec::new();
        self.collect_includes(&FieldPath::default(), &mut out);
        normalize_includes(out)
    }

    fn collect_includes(&self, prefix: &FieldPath, out: &mut Vec<IncludePath>) {
        match self {
            Self::Compare { path, .. } => {
                let navigation = path.parent();
                if !navigation.is_empty() {
                    out.push(prefix.join(&navigation));
                }
            }
            Self::Any {
                collection,
                predicate,
            } => {
                let full = prefix.join(collection);
                out.push(full.clone());
                predicate.collect_includes(&full, out);
            }
            Self::And(parts) | Self::Or(parts) => {
                for part in parts {
                    part.collect_includes(prefix, out);
                }
            }
            Self::Not(inner) => inner.collect_includes(prefix, out),
        }
    }
}

fn compare_stored(stored: &Value, kind: &ScalarKind, op: CompareOp, expected: &ScalarValue) -> bool {
    let Ok(actual) = kind.from_json(stored) else {
        return false;
    };
    if actual.is_null() || expected.is_null() {
        return op == CompareOp::Eq && actual.is_null() && expected.is_null();
    }
    kind.compare(&actual, expected)
        .is_some_and(|ordering| op.accepts(ordering))
}

/// Deduplicate and drop paths that are prefixes of longer ones.
pub fn normalize_includes(mut paths: Vec<IncludePath>) -> Vec<IncludePath> {
    paths.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.segments().cmp(b.segments())));
    let mut kept: Vec<IncludePath> = Vec::new();
    for path in paths {
        if !kept.iter().any(|k| k.starts_with(&path)) {
            kept.push(path);
        }
    }
    kept.sort_by(|a, b| a.segments().cmp(b.segments()));
    kept
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub path: FieldPath,
    pub kind: ScalarKind,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn compare(&self, left: &Record, right: &Record) -> Ordering {
        let read = |record: &Record| {
            values_at(record, self.path.segments())
                .first()
                .and_then(|value| self.kind.from_json(value).ok())
                .unwrap_or(ScalarValue::Null)
        };
        let ordering = self.kind.sort_order(&read(left), &read(right));
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Stable multi-key sort: earlier keys dominate, full ties keep input order.
pub fn sort_records(keys: &[SortKey], records: &mut [Record]) {
    if keys.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        keys.iter()
            .map(|key| key.compare(a, b))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// A read request against one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageQuery {
    pub entity: TypeName,
    pub predicate: Option<Predicate>,
    pub sort: Vec<SortKey>,
    pub includes: Vec<IncludePath>,
    pub offset: usize,
    pub count: Option<usize>,
}

impl StorageQuery {
    pub fn new(entity: impl Into<TypeName>) -> Self {
        Self {
            entity: entity.into(),
            predicate: None,
            sort: Vec::new(),
            includes: Vec::new(),
            offset: 0,
            count: None,
        }
    }

    pub fn with_predicate(mut self, predicate: Option<Predicate>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_includes(mut self, includes: Vec<IncludePath>) -> Self {
        self.includes = normalize_includes(includes);
        self
    }

    pub fn paged(mut self, offset: usize, count: Option<usize>) -> Self {
        self.offset = offset;
        self.count = count;
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.predicate.as_ref().is_none_or(|p| p.matches(record))
    }
}
