//! Standalone API server: wires the orchestrator to OpenRouter and an
//! in-memory result store.
//!
//! Configuration comes from the environment:
//! - `OPENROUTER_API_KEY` - upstream provider key (required)
//! - `MODELBENCH_MODELS`  - path to a JSON array of model specs
//!                          (default `models.json`)
//! - `MODELBENCH_ADDR`    - listen address (default `127.0.0.1:8080`)
//! - `MODELBENCH_AUTH_KEY`- bearer key for the API itself (optional)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use modelbench::api::{serve, ServerState};
use modelbench::{MemoryStore, ModelSpec, OpenRouter, Orchestrator, StaticRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let api_key =
        std::env::var("OPENROUTER_API_KEY").context("OPENROUTER_API_KEY is not set")?;

    let models_path =
        std::env::var("MODELBENCH_MODELS").unwrap_or_else(|_| "models.json".to_string());
    let models_json = std::fs::read_to_string(&models_path)
        .with_context(|| format!("failed to read model table from {models_path}"))?;
    let specs: Vec<ModelSpec> = serde_json::from_str(&models_json)
        .with_context(|| format!("invalid model table in {models_path}"))?;
    log::info!("loaded {} models from {models_path}", specs.len());

    let provider = Arc::new(OpenRouter::new(api_key, None, Some(120)));
    let registry = Arc::new(StaticRegistry::new(specs));
    let state = ServerState {
        orchestrator: Arc::new(Orchestrator::new(provider, registry)),
        store: Some(Arc::new(MemoryStore::new())),
        auth_key: std::env::var("MODELBENCH_AUTH_KEY").ok(),
    };

    let addr: SocketAddr = std::env::var("MODELBENCH_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()
        .context("invalid MODELBENCH_ADDR")?;

    serve(state, addr).await?;
    Ok(())
}
