use axum::Json;
use utoipa::OpenApi;
use utoipa_redoc::{Redoc, Servable};

use super::dto;
use super::handlers;
use super::response;
use crate::ocr;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lectio API",
        version = "0.2.0",
        description = "Single-page OCR over HTTP.",
    ),
    paths(
        handlers::health::health_check,
        handlers::ocr::recognize,
        handlers::ocr::submit,
        handlers::engine::get_engine_config,
        handlers::engine::update_engine_config,
    ),
    components(schemas(
        response::ErrorCode,
        response::ApiError,
        response::ErrorResponse,
        ocr::RecognitionResult,
        ocr::TextBox,
        ocr::CharacterSet,
        ocr::EngineConfig,
        dto::OcrUrlRequest,
        dto::OcrUploadForm,
        dto::UpdateEngineConfigRequest,
        dto::EngineConfigResponse,
        handlers::health::HealthData,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "ocr", description = "Text recognition"),
        (name = "engine", description = "Engine configuration (admin key required)"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(utoipa::openapi::security::Http::new(
                utoipa::openapi::security::HttpAuthScheme::Bearer,
            )),
        );
    }
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn redoc_router<S: Clone + Send + Sync + 'static>() -> axum::Router<S> {
    Redoc::with_url("/docs", ApiDoc::openapi()).into()
}
