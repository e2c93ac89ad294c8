use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};

use crate::bench::{BatchReport, BatchRequest};
use crate::error::BenchError;
use crate::store::persist_report;

use super::{ErrorBody, ServerState};

pub type ApiResult<T> = Result<T, (StatusCode, Json<ErrorBody>)>;

/// POST /v1/benchmarks: run one batch and return the full report.
///
/// Persistence runs in the background only when an owner identity was
/// resolved upstream; its outcome never changes the response.
pub async fn handle_benchmark(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<BatchReport>> {
    validate_auth(&state, &headers)?;
    let owner = resolve_owner(&headers);

    let report = state
        .orchestrator
        .run(request)
        .await
        .map_err(error_response)?;

    if let (Some(store), Some(owner)) = (state.store.clone(), owner) {
        let snapshot = report.clone();
        tokio::spawn(async move {
            persist_report(store.as_ref(), &owner, &snapshot).await;
        });
    }

    Ok(Json(report))
}

fn validate_auth(state: &ServerState, headers: &HeaderMap) -> ApiResult<()> {
    let Some(key) = &state.auth_key else {
        return Ok(());
    };

    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| unauthorized("Missing authorization"))?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| unauthorized("Invalid authorization header"))?;

    if !auth_str.starts_with("Bearer ") || &auth_str[7..] != key {
        return Err(unauthorized("Invalid API key"));
    }

    Ok(())
}

/// Owner identity resolved by whatever fronts this service; absent means
/// the run is not persisted.
fn resolve_owner(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-owner-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn error_response(err: BenchError) -> (StatusCode, Json<ErrorBody>) {
    match err {
        BenchError::InvalidRequest(msg) => bad_request(msg),
        BenchError::ModelsNotFound(msg) => not_found(msg),
        other => internal_error(other.to_string()),
    }
}

fn bad_request(msg: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error: msg.into() }))
}

fn not_found(msg: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::NOT_FOUND, Json(ErrorBody { error: msg.into() }))
}

fn unauthorized(msg: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody { error: msg.into() }),
    )
}

fn internal_error(msg: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody { error: msg.into() }),
    )
}
