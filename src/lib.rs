//! Comparative benchmarking of chat-completion models.
//!
//! `modelbench` runs a set of candidate models against a set of prompts,
//! asks an independent judge model to score the responses, and reports
//! per-pair results plus per-model aggregates (average score, cost, and
//! latency). Generation fans out concurrently across models and prompts
//! under a configurable in-flight cap; a single failing model or prompt
//! never poisons the rest of the batch.
//!
//! ```no_run
//! use std::sync::Arc;
//! use modelbench::{BatchRequest, Orchestrator, OpenRouter, StaticRegistry};
//!
//! # async fn demo(registry: StaticRegistry) -> Result<(), modelbench::BenchError> {
//! let provider = Arc::new(OpenRouter::new("sk-or-...", None, Some(120)));
//! let orchestrator = Orchestrator::new(provider, Arc::new(registry));
//!
//! let report = orchestrator
//!     .run(BatchRequest {
//!         selected_model_ids: vec!["openai/gpt-4o-mini".into(), "meta-llama/llama-3-70b".into()],
//!         system_prompt: String::new(),
//!         prompts: vec!["Explain TCP slow start in two sentences.".into()],
//!     })
//!     .await?;
//!
//! for model in &report.results {
//!     println!("{}: {}", model.model_name, model.average_score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The HTTP surface lives behind the `api` feature; see [`api`].

#[cfg(feature = "api")]
pub mod api;
mod bench;
pub mod chat;
mod cost;
mod error;
pub mod judge;
mod provider;
mod registry;
mod store;

pub use bench::{
    BatchReport, BatchRequest, BatchStats, BenchConfig, ModelResult, Orchestrator, PromptResult,
};
pub use cost::completion_cost;
pub use error::BenchError;
pub use judge::{JudgeConfig, ScoreRange};
pub use provider::{CallParams, ChatCompletion, ChatProvider, OpenRouter, OpenRouterConfig};
pub use registry::{ModelRegistry, ModelSpec, StaticRegistry};
pub use store::{persist_report, MemoryStore, ResultRecord, ResultStore, StoredRun};
