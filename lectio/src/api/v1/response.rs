//! # V1 Error Envelope
//!
//! Successful responses carry their payload directly (`{"text": ...}`), which
//! is what existing OCR clients read. Every failure uses one shape:
//!
//! ```json
//! { "error": { "code": "invalid_request", "message": "file or file_url is required" } }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::LectioError;

/// Machine-readable error code included in every error response.
///
/// Serialized as a snake_case string on the wire (e.g. `"invalid_request"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Bad image, bad parameter, missing input or failed download. HTTP 400.
    InvalidRequest,
    /// Missing or wrong admin token. HTTP 401.
    Unauthorized,
    /// The server failed; recognition failures keep their message, anything
    /// else is reported generically. HTTP 500.
    InternalError,
    /// HTTP 501.
    NotImplemented,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::InternalError => write!(f, "internal_error"),
            Self::NotImplemented => write!(f, "not_implemented"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ApiError {
    pub code: ErrorCode,
    /// Human-readable description safe to show to end users.
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: ApiError,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ApiError {
                code,
                message: message.into(),
            },
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.error.code.status(), Json(self)).into_response()
    }
}

impl From<LectioError> for ErrorResponse {
    /// Internal details never reach the client: `Internal`, `Io` and `Json`
    /// errors are logged and replaced by a generic message.
    fn from(err: LectioError) -> Self {
        match err {
            LectioError::Decode(_) | LectioError::Config(_) => {
                tracing::debug!(error = %err, "Rejected OCR input");
                ErrorResponse::new(ErrorCode::InvalidRequest, err.to_string())
            }

            LectioError::Validation(msg) | LectioError::Download(msg) => {
                ErrorResponse::new(ErrorCode::InvalidRequest, msg)
            }

            LectioError::Unauthorized(msg) => ErrorResponse::new(ErrorCode::Unauthorized, msg),

            LectioError::NotImplemented(msg) => ErrorResponse::new(ErrorCode::NotImplemented, msg),

            LectioError::Recognition(_) => {
                tracing::error!(error = %err, "Recognition failed");
                ErrorResponse::new(ErrorCode::InternalError, err.to_string())
            }

            ref internal @ (LectioError::Json(_) | LectioError::Io(_) | LectioError::Internal(_)) => {
                tracing::error!(error = %internal, "Internal error mapped to v1 response");
                ErrorResponse::new(ErrorCode::InternalError, "An internal error occurred")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ErrorCode::InternalError.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ErrorCode::NotImplemented.status(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn error_code_serializes_snake_case() {
        let json = serde_json::to_value(&ErrorCode::InvalidRequest).expect("serialize");
        assert_eq!(json, "invalid_request");
        assert_eq!(ErrorCode::NotImplemented.to_string(), "not_implemented");
    }

    #[test]
    fn envelope_shape() {
        let resp = ErrorResponse::new(ErrorCode::InvalidRequest, "empty file data");
        let json = serde_json::to_value(&resp).expect("serialize");
        assert_eq!(json["error"]["code"], "invalid_request");
        assert_eq!(json["error"]["message"], "empty file data");
    }

    #[test]
    fn decode_and_config_errors_are_client_faults() {
        let resp = ErrorResponse::from(LectioError::Decode("bad header".into()));
        assert_eq!(resp.error.code, ErrorCode::InvalidRequest);
        assert_eq!(resp.error.message, "Failed to decode image: bad header");

        let resp = ErrorResponse::from(LectioError::Config("box_thresh out of range".into()));
        assert_eq!(resp.error.code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn download_message_passes_through() {
        let resp = ErrorResponse::from(LectioError::Download(
            "failed to download file_url: 404".into(),
        ));
        assert_eq!(resp.error.message, "failed to download file_url: 404");
    }

    #[test]
    fn recognition_error_keeps_message() {
        let resp = ErrorResponse::from(LectioError::Recognition("engine crashed".into()));
        assert_eq!(resp.error.code, ErrorCode::InternalError);
        assert_eq!(resp.error.message, "OCR failed: engine crashed");
    }

    #[test]
    fn internal_details_are_hidden() {
        let resp = ErrorResponse::from(LectioError::Internal("mutex poisoned at 0xdead".into()));
        assert_eq!(resp.error.code, ErrorCode::InternalError);
        assert_eq!(resp.error.message, "An internal error occurred");
    }
}
