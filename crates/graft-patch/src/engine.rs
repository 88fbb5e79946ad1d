//! Patch document validation and transactional application.

use std::sync::Arc;

use graft_core::{ToValidationFailure, ValidationErrors, indexed_field};
use graft_mapping::MappingRegistry;
use graft_storage::GraphStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::adapter::{GraphMutationAdapter, PatchOutcome};
use crate::document::PatchDocument;
use crate::error::{ApplyError, PatchError};
use crate::operation::{PreparedOperation, prepare_operation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    pub max_operations: usize,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self { max_operations: 256 }
    }
}

impl PatchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_operations == 0 {
            return Err("patch.max_operations must be greater than 0".into());
        }
        Ok(())
    }
}

/// Validates patch documents against edit types and applies them.
#[derive(Debug, Clone)]
pub struct PatchEngine {
    registry: Arc<MappingRegistry>,
    config: PatchConfig,
}

impl PatchEngine {
    pub fn new(registry: Arc<MappingRegistry>, config: PatchConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Resolve and convert every operation without touching storage.
    ///
    /// All failing operations are reported, each under `operations[i]`.
    pub fn validate(&self, dto: &str, document: &PatchDocument) -> Result<Vec<PreparedOperation>, ValidationErrors> {
        if document.len() > self.config.max_operations {
            let err = PatchError::TooManyOperations {
                count: document.len(),
                max: self.config.max_operations,
            };
            return Err(ValidationErrors::single("operations", err.to_validation_failure()));
        }

        let mut errors = ValidationErrors::new();
        let mut prepared = Vec::with_capacity(document.len());
        for (index, op) in document.operations.iter().enumerate() {
            match prepare_operation(&self.registry, dto, index, op) {
                Ok(op) => prepared.push(op),
                Err(e) => errors.add(indexed_field("operations", index), e.to_validation_failure()),
            }
        }
        if !errors.is_empty() {
            tracing::debug!(dto, failures = errors.len(), "patch document rejected");
            return Err(errors);
        }
        tracing::debug!(dto, operations = prepared.len(), "patch document validated");
        Ok(prepared)
    }

    pub async fn apply<S>(
        &self,
        store: &S,
        dto: &str,
        document: &PatchDocument,
        cancel: &CancellationToken,
    ) -> Result<PatchOutcome, ApplyError>
    where
        S: GraphStore + ?Sized,
    {
        let prepared = self.validate(dto, document)?;
        GraphMutationAdapter::new(&self.registry)
            .apply(store, &prepared, cancel)
            .await
    }

    /// Parse a JSON body and apply it.
    pub async fn apply_json<S>(
        &self,
        store: &S,
        dto: &str,
        body: Value,
        cancel: &CancellationToken,
    ) -> Result<PatchOutcome, ApplyError>
    where
        S: GraphStore + ?Sized,
    {
        let document = PatchDocument::from_value(body).map_err(|e| {
            ApplyError::Invalid(ValidationErrors::single("operations", e.to_validation_failure()))
        })?;
        self.apply(store, dto, &document, cancel).await
    }
}
