//! # Admin Bearer Authentication
//!
//! Guards the engine configuration routes. Tokens come from
//! `LECTIO_ADMIN_KEYS`; when none are configured the routes stay locked.
//! Rejections use the v1 error envelope.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::state::AppState;

use super::response::{ErrorCode, ErrorResponse};

fn unauthorized(message: &str) -> Response {
    ErrorResponse::new(ErrorCode::Unauthorized, message).into_response()
}

/// Passes the request through only with `Authorization: Bearer <admin key>`.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let keys = &state.config.server.admin_keys;
    if keys.is_empty() {
        return unauthorized("Admin keys not configured. Set LECTIO_ADMIN_KEYS to enable access.");
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match header {
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(token) => token.trim(),
            None => {
                return unauthorized(
                    "Invalid authorization header format. Expected: Bearer <token>",
                )
            }
        },
        None => return unauthorized("Missing authorization header"),
    };

    if keys.iter().any(|k| k == token) {
        next.run(request).await
    } else {
        tracing::warn!("Rejected admin request with unknown key");
        unauthorized("Invalid admin key")
    }
}
