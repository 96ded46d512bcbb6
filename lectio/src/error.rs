use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::api::v1::response::ErrorResponse;

#[derive(Error, Debug)]
pub enum LectioError {
    /// The submitted bytes are not a decodable image.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The recognition engine failed to build or run.
    #[error("OCR failed: {0}")]
    Recognition(String),

    /// A tunable or startup setting is out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Download(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for LectioError {
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

pub type Result<T> = std::result::Result<T, LectioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            LectioError::Decode("truncated".into()).to_string(),
            "Failed to decode image: truncated"
        );
        assert_eq!(
            LectioError::Recognition("model missing".into()).to_string(),
            "OCR failed: model missing"
        );
        assert_eq!(
            LectioError::Validation("file or file_url is required".into()).to_string(),
            "file or file_url is required"
        );
    }
}
