//! Filter token compilation.
//!
//! A token resolves to a storage path, the descriptor of its last field picks
//! the comparison, and every value atom becomes a comparison on that path.
//! The atoms are OR-ed inside the innermost collection so that
//! `lines.quantity:1,7` matches an order with one line of either quantity.

use graft_core::{ScalarKind, ScalarValue};
use graft_mapping::{
    ComparisonStrategy, MappingRegistry, ResolvedPath, StorageSegment, Terminal, resolve,
};
use graft_storage::{CompareOp, FieldPath, Predicate};

use crate::error::SearchError;
use crate::parser::{FilterMode, FilterToken, ValueAtom, parse_value_atoms};

/// A filter token turned into a storage predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub key: String,
    pub path: ResolvedPath,
    pub strategy: ComparisonStrategy,
    pub mode: FilterMode,
    pub predicate: Predicate,
}

/// Compile one filter token against the presentation type `dto`.
pub fn compile_filter(
    registry: &MappingRegistry,
    dto: &str,
    token: &FilterToken,
) -> Result<CompiledFilter, SearchError> {
    if token.mode == FilterMode::Undefined {
        return Err(SearchError::UndefinedFilter {
            token: token.token.clone(),
        });
    }
    let key = token.key.as_str();
    let path = resolve(registry, dto, key).map_err(|e| SearchError::from_resolve(key, e))?;
    let strategy = registry
        .descriptor(path.owner(), path.field_name())
        .map(|d| d.strategy)
        .ok_or_else(|| SearchError::PropertyNotFilterable {
            key: key.to_string(),
        })?;
    path.ensure_comparable()
        .map_err(|e| SearchError::from_resolve(key, e))?;

    let (segments, kind) = comparison_target(registry, key, &path, strategy)?;
    let atoms = parse_value_atoms(&token.raw_value).map_err(|reason| SearchError::cannot_create(key, reason))?;

    let (collections, leaf) = split_at_collections(&segments);
    let comparisons = atoms
        .iter()
        .map(|atom| atom_predicate(&leaf, &kind, atom))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SearchError::cannot_create(key, e))?;

    let mut predicate = Predicate::or(comparisons);
    for collection in collections.into_iter().rev() {
        predicate = Predicate::any(collection, predicate);
    }
    if token.mode == FilterMode::Exclude {
        predicate = Predicate::negate(predicate);
    }

    tracing::debug!(dto, key, ?strategy, atoms = atoms.len(), "filter compiled");
    Ok(CompiledFilter {
        key: path.key(),
        path,
        strategy,
        mode: token.mode,
        predicate,
    })
}

/// Storage segments to compare and the kind of the compared scalar.
fn comparison_target(
    registry: &MappingRegistry,
    key: &str,
    path: &ResolvedPath,
    strategy: ComparisonStrategy,
) -> Result<(Vec<StorageSegment>, ScalarKind), SearchError> {
    let mismatch = || {
        SearchError::cannot_create(
            key,
            format!("{strategy:?} cannot compare a {}", path.terminal.describe()),
        )
    };
    let target_key = |target: &str| {
        registry
            .entity(target)
            .map(|entity| (entity.key.clone(), entity.key_kind().clone()))
            .ok_or_else(mismatch)
    };

    let mut segments = path.segments.clone();
    match (strategy, &path.terminal) {
        (ComparisonStrategy::Equals, Terminal::Scalar(kind)) => Ok((segments, kind.clone())),
        (ComparisonStrategy::ByForeignKeyId, Terminal::Reference { target, foreign_key }) => {
            let (_, kind) = target_key(target)?;
            let last = segments.last_mut().ok_or_else(mismatch)?;
            last.name = foreign_key.clone();
            Ok((segments, kind))
        }
        (ComparisonStrategy::NestedCollection, Terminal::Collection { target, .. }) => {
            let (name, kind) = target_key(target)?;
            segments.push(StorageSegment {
                name,
                source_type: target.clone(),
                is_collection: false,
            });
            Ok((segments, kind))
        }
        _ => Err(mismatch()),
    }
}

/// Group `segments` into the collection paths to quantify over, each relative
/// to the previous element, and the remaining path to the compared scalar.
fn split_at_collections(segments: &[StorageSegment]) -> (Vec<FieldPath>, FieldPath) {
    let mut collections = Vec::new();
    let mut current = Vec::new();
    for segment in segments {
        current.push(segment.name.clone());
        if segment.is_collection {
            collections.push(FieldPath::new(std::mem::take(&mut current)));
        }
    }
    (collections, FieldPath::new(current))
}

fn atom_predicate(path: &FieldPath, kind: &ScalarKind, atom: &ValueAtom) -> graft_core::Result<Predicate> {
    let compare = |op: CompareOp, value: ScalarValue| Predicate::compare(path.clone(), kind.clone(), op, value);
    match atom {
        ValueAtom::Literal(raw) => Ok(compare(CompareOp::Eq, kind.parse_literal(raw)?)),
        ValueAtom::Range { from, to } => {
            let mut bounds = Vec::with_capacity(2);
            if let Some(from) = from {
                bounds.push(compare(CompareOp::Ge, kind.parse_literal(from)?));
            }
            if let Some(to) = to {
                bounds.push(compare(CompareOp::Le, kind.parse_literal(to)?));
            }
            Ok(Predicate::and(bounds))
        }
    }
}
