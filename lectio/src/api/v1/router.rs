use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;
use super::middleware::admin_auth_middleware;

pub fn v1_router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/ocr", post(handlers::ocr::recognize))
        .route("/ocr/submit", post(handlers::ocr::submit))
        .route("/openapi.json", get(super::openapi::openapi_json));

    let admin_routes = Router::new()
        .route(
            "/engine/config",
            get(handlers::engine::get_engine_config).put(handlers::engine::update_engine_config),
        )
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware));

    Router::new().merge(public_routes).merge(admin_routes)
}
