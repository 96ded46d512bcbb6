use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::state::AppState;

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub ok: bool,
    pub version: String,
    /// Recognition backend in use.
    pub engine: String,
    pub cached_engines: usize,
}

/// `GET /healthz`
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthData),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthData> {
    let pool = state.ocr.pool();
    Json(HealthData {
        ok: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: pool.backend().to_string(),
        cached_engines: pool.cached_engines(),
    })
}
