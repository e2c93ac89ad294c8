use std::net::SocketAddr;

use axum::{routing::post, Router};
use tower_http::cors::CorsLayer;

use crate::error::BenchError;

use super::handlers::handle_benchmark;
use super::ServerState;

/// Builds the API router.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/v1/benchmarks", post(handle_benchmark))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves the API until the process is stopped.
pub async fn serve(state: ServerState, addr: SocketAddr) -> Result<(), BenchError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| BenchError::Http(e.to_string()))?;
    log::info!("modelbench API listening on {addr}");
    axum::serve(listener, router(state))
        .await
        .map_err(|e| BenchError::Http(e.to_string()))
}
