use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::Json;

use crate::api::extractors::AppJson;
use crate::api::state::AppState;
use crate::api::v1::dto::{OcrQuery, OcrUploadForm, OcrUrlRequest, RequestParams};
use crate::api::v1::response::ErrorResponse;
use crate::error::LectioError;
use crate::ocr::RecognitionResult;

const MISSING_INPUT: &str = "file or file_url is required";

/// Where the image bytes come from.
enum Source {
    Upload(Vec<u8>),
    Url(String),
}

/// `POST /v1/ocr`
///
/// Accepts either a multipart upload with a `file` field or a JSON body with
/// `file_url`. Tunables may be sent in the query string or in the body; body
/// values win.
#[utoipa::path(
    post,
    path = "/v1/ocr",
    tag = "ocr",
    params(OcrQuery),
    request_body(content(
        (OcrUploadForm = "multipart/form-data"),
        (OcrUrlRequest = "application/json"),
    )),
    responses(
        (status = 200, description = "Recognized text", body = RecognitionResult),
        (status = 400, description = "Bad image, parameter or download", body = ErrorResponse),
        (status = 500, description = "Recognition failed", body = ErrorResponse),
    )
)]
pub async fn recognize(
    State(state): State<AppState>,
    query: Result<Query<OcrQuery>, QueryRejection>,
    request: Request,
) -> Result<Json<RecognitionResult>, LectioError> {
    let Query(query) = query.map_err(|e| LectioError::Validation(e.body_text()))?;
    let query_params = query.into_params()?;

    let (body_params, source) = read_body(&state, request).await?;
    let params = query_params.merge(body_params);
    params.overrides.validate()?;

    let image = match source {
        Some(Source::Upload(bytes)) => bytes,
        Some(Source::Url(url)) => state.fetcher.fetch(&url).await?,
        None => return Err(LectioError::Validation(MISSING_INPUT.to_string())),
    };
    if image.is_empty() {
        return Err(LectioError::Validation("empty file data".to_string()));
    }

    let request = params.into_request(image)?;
    let result = state.ocr.recognize(request).await?;
    Ok(Json(result))
}

async fn read_body(
    state: &AppState,
    request: Request,
) -> Result<(RequestParams, Option<Source>), LectioError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| LectioError::Validation(e.body_text()))?;
        read_upload(multipart).await
    } else if content_type.starts_with("application/json") {
        let AppJson(body) = AppJson::<OcrUrlRequest>::from_request(request, state).await?;
        let params = body.params()?;
        let source = body
            .file_url
            .filter(|url| !url.trim().is_empty())
            .map(Source::Url);
        Ok((params, source))
    } else {
        Err(LectioError::Validation(MISSING_INPUT.to_string()))
    }
}

async fn read_upload(
    mut multipart: Multipart,
) -> Result<(RequestParams, Option<Source>), LectioError> {
    let mut params = RequestParams::default();
    let mut file = None;
    let mut file_url = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| LectioError::Validation(format!("invalid multipart body: {}", e.body_text())))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field.bytes().await.map_err(|e| {
                    LectioError::Validation(format!("failed to read file: {}", e.body_text()))
                })?;
                file = Some(bytes.to_vec());
            }
            _ => {
                let raw = field.text().await.map_err(|e| {
                    LectioError::Validation(format!("failed to read field {name}: {}", e.body_text()))
                })?;
                if name == "file_url" {
                    file_url = Some(raw).filter(|url| !url.trim().is_empty());
                } else {
                    params.apply_form_field(&name, &raw)?;
                }
            }
        }
    }

    let source = file.map(Source::Upload).or(file_url.map(Source::Url));
    Ok((params, source))
}

/// `POST /v1/ocr/submit`
#[utoipa::path(
    post,
    path = "/v1/ocr/submit",
    tag = "ocr",
    responses(
        (status = 501, description = "Asynchronous jobs are not available", body = ErrorResponse),
    )
)]
pub async fn submit() -> Result<Json<RecognitionResult>, LectioError> {
    Err(LectioError::NotImplemented(
        "async submit not implemented yet".to_string(),
    ))
}
