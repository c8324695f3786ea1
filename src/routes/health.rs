// src/routes/health.rs
//! Liveness endpoint for the Kobo forms adapter.
//!
//! `/health` answers without calling KoboToolbox, so orchestrators can probe
//! the process even when the upstream service or its credentials are broken.
//! The gateway (`mod.rs`) merges this subrouter into the top-level router.

use axum::{routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Handle `GET /health`.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Subrouter with the `/health` route, generic over the gateway's state.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
