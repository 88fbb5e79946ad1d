//! RFC 6902 documents.

use std::fmt;

use json_patch::{Patch, PatchOperation};
use serde_json::Value;

use crate::error::PatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchOpKind {
    Add,
    Remove,
    Replace,
    Test,
    Move,
    Copy,
}

impl PatchOpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Test => "test",
            Self::Move => "move",
            Self::Copy => "copy",
        }
    }

    /// Whether the operation changes stored data.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Test)
    }
}

impl fmt::Display for PatchOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchOp {
    pub kind: PatchOpKind,
    pub path: String,
    pub value: Option<Value>,
}

impl PatchOp {
    pub fn new(kind: PatchOpKind, path: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            kind,
            path: path.into(),
            value,
        }
    }
}

impl From<PatchOperation> for PatchOp {
    fn from(operation: PatchOperation) -> Self {
        match operation {
            PatchOperation::Add(op) => Self::new(PatchOpKind::Add, op.path.as_str(), Some(op.value)),
            PatchOperation::Remove(op) => Self::new(PatchOpKind::Remove, op.path.as_str(), None),
            PatchOperation::Replace(op) => {
                Self::new(PatchOpKind::Replace, op.path.as_str(), Some(op.value))
            }
            PatchOperation::Test(op) => Self::new(PatchOpKind::Test, op.path.as_str(), Some(op.value)),
            PatchOperation::Move(op) => Self::new(PatchOpKind::Move, op.path.as_str(), None),
            PatchOperation::Copy(op) => Self::new(PatchOpKind::Copy, op.path.as_str(), None),
        }
    }
}

/// Ordered operations of one patch document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchDocument {
    pub operations: Vec<PatchOp>,
}

impl PatchDocument {
    pub fn new(operations: Vec<PatchOp>) -> Self {
        Self { operations }
    }

    pub fn from_value(value: Value) -> Result<Self, PatchError> {
        let patch: Patch = serde_json::from_value(value).map_err(|e| PatchError::InvalidDocument {
            reason: e.to_string(),
        })?;
        Ok(patch.into())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PatchError> {
        let patch: Patch = serde_json::from_slice(bytes).map_err(|e| PatchError::InvalidDocument {
            reason: e.to_string(),
        })?;
        Ok(patch.into())
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl From<Patch> for PatchDocument {
    fn from(patch: Patch) -> Self {
        Self::new(patch.0.into_iter().map(PatchOp::from).collect())
    }
}
