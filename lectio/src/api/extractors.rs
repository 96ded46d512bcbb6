use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::error::LectioError;

/// `Json` whose rejections become [`LectioError`] and so use the v1 error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(LectioError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for LectioError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> LectioError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            LectioError::Validation(format!("Invalid JSON: {}", err.body_text()))
        }
        JsonRejection::JsonSyntaxError(err) => {
            LectioError::Validation(format!("JSON syntax error: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => {
            LectioError::Validation("Missing `Content-Type: application/json` header".to_string())
        }
        JsonRejection::BytesRejection(err) => {
            LectioError::Validation(format!("Failed to read request body: {}", err.body_text()))
        }
        _ => LectioError::Validation(rejection.body_text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    #[derive(Debug, serde::Deserialize)]
    struct Probe {
        #[allow(dead_code)]
        value: f32,
    }

    async fn extract(content_type: &str, body: &'static str) -> Result<AppJson<Probe>, LectioError> {
        let request = Request::builder()
            .method("POST")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        AppJson::<Probe>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn syntax_error_is_validation() {
        let err = extract("application/json", "{not json").await.err().unwrap();
        assert!(matches!(err, LectioError::Validation(ref m) if m.starts_with("JSON syntax error")));
    }

    #[tokio::test]
    async fn wrong_type_is_validation() {
        let err = extract("application/json", r#"{"value":"high"}"#)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LectioError::Validation(ref m) if m.starts_with("Invalid JSON")));
    }

    #[tokio::test]
    async fn missing_content_type_is_validation() {
        let err = extract("text/plain", r#"{"value":1}"#).await.err().unwrap();
        assert!(matches!(err, LectioError::Validation(ref m) if m.contains("Content-Type")));
    }
}
