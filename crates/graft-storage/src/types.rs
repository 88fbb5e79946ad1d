//! Records and query results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One storage row, with materialized navigations nested under their
/// field names (objects for references, arrays for collections).
pub type Record = Map<String, Value>;

/// Query result with pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Total number of matching records before paging
    pub total: usize,
    /// Records in this page
    pub records: Vec<Record>,
    /// Offset of the first record in this page
    pub offset: usize,
    /// Whether there are more results after this page
    pub has_more: bool,
}

impl QueryResult {
    pub fn new(total: usize, records: Vec<Record>, offset: usize) -> Self {
        let has_more = offset + records.len() < total;
        Self {
            total,
            records,
            offset,
            has_more,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, Vec::new(), 0)
    }
}

/// Turn a JSON object into a [`Record`]; other values yield `None`.
pub fn into_record(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
