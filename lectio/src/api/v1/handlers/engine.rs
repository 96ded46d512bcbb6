use axum::extract::State;
use axum::Json;

use crate::api::extractors::AppJson;
use crate::api::state::AppState;
use crate::api::v1::dto::{EngineConfigResponse, UpdateEngineConfigRequest};
use crate::api::v1::response::ErrorResponse;
use crate::error::LectioError;

fn snapshot(state: &AppState) -> EngineConfigResponse {
    let pool = state.ocr.pool();
    EngineConfigResponse {
        backend: pool.backend().to_string(),
        generation: pool.generation(),
        cached_engines: pool.cached_engines(),
        config: pool.base_config(),
    }
}

/// `GET /v1/engine/config`
#[utoipa::path(
    get,
    path = "/v1/engine/config",
    tag = "engine",
    responses(
        (status = 200, description = "Current base engine configuration", body = EngineConfigResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_engine_config(State(state): State<AppState>) -> Json<EngineConfigResponse> {
    Json(snapshot(&state))
}

/// `PUT /v1/engine/config`
///
/// Overlays the given fields on the base configuration. Cached engines are
/// dropped and rebuilt lazily with the new values.
#[utoipa::path(
    put,
    path = "/v1/engine/config",
    tag = "engine",
    request_body = UpdateEngineConfigRequest,
    responses(
        (status = 200, description = "Configuration applied", body = EngineConfigResponse),
        (status = 400, description = "Out-of-range value", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_engine_config(
    State(state): State<AppState>,
    AppJson(req): AppJson<UpdateEngineConfigRequest>,
) -> Result<Json<EngineConfigResponse>, LectioError> {
    let overrides = req.into_overrides()?;
    overrides.validate()?;

    let pool = state.ocr.pool();
    pool.update(|base| base.with_overrides(&overrides))?;

    tracing::info!(generation = pool.generation(), "Engine config updated via API");
    Ok(Json(snapshot(&state)))
}
