//! Optional HTTP surface for the orchestrator, behind the `api` feature.
//!
//! One POST endpoint accepts a batch request, runs it, and returns the
//! report; persistence is kicked off fire-and-forget when the request
//! carries a resolved owner identity.

mod handlers;
mod server;

pub use handlers::handle_benchmark;
pub use server::{router, serve};

use std::sync::Arc;

use serde::Serialize;

use crate::bench::Orchestrator;
use crate::store::ResultStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,
    /// Persistence collaborator; `None` disables persistence entirely.
    pub store: Option<Arc<dyn ResultStore>>,
    /// Optional bearer key; when unset the API is open.
    pub auth_key: Option<String>,
}

/// Error body shape of every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
