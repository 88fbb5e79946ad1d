//! Order token compilation into storage sort keys.

use graft_mapping::{MappingRegistry, ResolvedPath, Terminal, resolve};
use graft_storage::{FieldPath, SortDirection, SortKey};

use crate::error::SearchError;
use crate::parser::{OrderDirection, OrderToken};

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledOrder {
    pub key: String,
    pub path: ResolvedPath,
    pub sort_key: SortKey,
}

/// Compile one order token.
///
/// Sorting does not consult filterable descriptors; any resolvable scalar
/// that is stored and reached without crossing a collection can be sorted.
pub fn compile_order(
    registry: &MappingRegistry,
    dto: &str,
    token: &OrderToken,
) -> Result<CompiledOrder, SearchError> {
    let direction = match token.direction {
        OrderDirection::Ascending => SortDirection::Ascending,
        OrderDirection::Descending => SortDirection::Descending,
        OrderDirection::Undefined => {
            return Err(SearchError::UndefinedOrder {
                token: token.token.clone(),
            });
        }
    };
    let key = token.key.as_str();
    let path = resolve(registry, dto, key).map_err(|e| SearchError::from_resolve(key, e))?;
    path.ensure_comparable()
        .map_err(|e| SearchError::from_resolve(key, e))?;
    if path.crosses_collection() {
        return Err(SearchError::not_sortable(key, "path crosses a collection"));
    }
    let Terminal::Scalar(kind) = &path.terminal else {
        return Err(SearchError::not_sortable(
            key,
            format!("a {} has no order", path.terminal.describe()),
        ));
    };

    let sort_key = SortKey {
        path: FieldPath::new(path.storage_names()),
        kind: kind.clone(),
        direction,
    };
    tracing::debug!(dto, key, ?direction, "order compiled");
    Ok(CompiledOrder {
        key: path.key(),
        path,
        sort_key,
    })
}
