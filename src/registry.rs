//! The model registry seam.
//!
//! The orchestrator only ever reads from the registry: specs are looked up
//! once per batch and copied into the results, never referenced live.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BenchError;

/// Identity and pricing of one candidate model, as supplied by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    /// Registry id, also the provider-side model id
    pub id: String,
    /// Human-readable display name
    pub name: String,
    /// Name of the upstream provider serving this model
    pub provider: String,
    /// Context window size in tokens
    pub context_length: u32,
    /// Price per prompt token, in USD
    pub prompt_price: f64,
    /// Price per completion token, in USD
    pub completion_price: f64,
    /// Whether the model weights are openly available
    pub open_source: bool,
    /// Whether the provider retains request data
    pub retains_data: bool,
}

/// Trait for looking up candidate models by id.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Returns the specs for the ids that exist, in request order.
    /// Unknown ids are silently skipped; deciding whether an empty result
    /// is fatal belongs to the caller.
    async fn find(&self, ids: &[String]) -> Result<Vec<ModelSpec>, BenchError>;
}

/// In-memory registry backed by a fixed model table.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    models: HashMap<String, ModelSpec>,
}

impl StaticRegistry {
    pub fn new(models: impl IntoIterator<Item = ModelSpec>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|spec| (spec.id.clone(), spec))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[async_trait]
impl ModelRegistry for StaticRegistry {
    async fn find(&self, ids: &[String]) -> Result<Vec<ModelSpec>, BenchError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.models.get(id).cloned())
            .collect())
    }
}
