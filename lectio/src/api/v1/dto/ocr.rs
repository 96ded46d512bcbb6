//! OCR request DTOs.
//!
//! Parameters may arrive in the query string, as multipart text fields or in a
//! JSON body. Each source is parsed into [`RequestParams`]; body values win
//! over query values.

use serde::Deserialize;

use crate::config::parse_flag;
use crate::error::{LectioError, Result};
use crate::ocr::{CharacterSet, EngineOverrides, RecognitionRequest};

/// Language selector used when the caller sends none.
pub const DEFAULT_LANG: &str = "auto";

/// A 0/1 style flag that may be sent as a JSON bool, number or string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            FlagValue::Int(0) => Some(false),
            FlagValue::Int(1) => Some(true),
            FlagValue::Int(_) => None,
            FlagValue::Text(s) => parse_flag(s),
        }
    }
}

fn flag(name: &str, value: Option<&FlagValue>) -> Result<Option<bool>> {
    value
        .map(|v| {
            v.to_bool()
                .ok_or_else(|| LectioError::Validation(format!("{name} must be 0 or 1")))
        })
        .transpose()
}

fn text_flag(name: &str, value: Option<&str>) -> Result<Option<bool>> {
    value
        .map(|v| {
            parse_flag(v).ok_or_else(|| LectioError::Validation(format!("{name} must be 0 or 1")))
        })
        .transpose()
}

fn char_type(value: Option<&str>) -> Result<Option<CharacterSet>> {
    value
        .map(|v| v.parse::<CharacterSet>().map_err(LectioError::Validation))
        .transpose()
}

fn number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| LectioError::Validation(format!("{name} must be a number, got '{raw}'")))
}

/// Parameters gathered from one source of an OCR request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    pub lang: Option<String>,
    pub return_boxes: Option<bool>,
    pub overrides: EngineOverrides,
}

impl RequestParams {
    /// Overlays `higher` on `self`; values present in `higher` win.
    pub fn merge(self, higher: RequestParams) -> Self {
        Self {
            lang: higher.lang.or(self.lang),
            return_boxes: higher.return_boxes.or(self.return_boxes),
            overrides: self.overrides.merge(higher.overrides),
        }
    }

    /// Applies one multipart text field. Unknown field names are ignored.
    pub fn apply_form_field(&mut self, name: &str, raw: &str) -> Result<()> {
        match name {
            "lang" => self.lang = Some(raw.to_string()),
            "return_boxes" => self.return_boxes = text_flag(name, Some(raw))?,
            "char_type" => self.overrides.char_type = char_type(Some(raw))?,
            "box_thresh" => self.overrides.box_thresh = Some(number(name, raw)?),
            "unclip_ratio" => self.overrides.unclip_ratio = Some(number(name, raw)?),
            "drop_score" => self.overrides.drop_score = Some(number(name, raw)?),
            "max_text_length" => self.overrides.max_text_length = Some(number(name, raw)?),
            "preprocess" => self.overrides.preprocess = text_flag(name, Some(raw))?,
            _ => {}
        }
        Ok(())
    }

    /// Final request; rejects out-of-range tunables before any work is done.
    pub fn into_request(self, image: Vec<u8>) -> Result<RecognitionRequest> {
        self.overrides.validate()?;
        Ok(RecognitionRequest {
            image,
            language: self.lang.unwrap_or_else(|| DEFAULT_LANG.to_string()),
            return_boxes: self.return_boxes.unwrap_or(false),
            overrides: self.overrides,
        })
    }
}

/// Query parameters of `POST /v1/ocr`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OcrQuery {
    /// `auto`, `ch`, `en` or `ch_en`; unknown values fall back to `ch`.
    pub lang: Option<String>,
    /// `1`/`true` to include per-line boxes.
    pub return_boxes: Option<String>,
    /// `default` or `en_sensitive`.
    pub char_type: Option<String>,
    pub box_thresh: Option<f32>,
    pub unclip_ratio: Option<f32>,
    pub drop_score: Option<f32>,
    pub max_text_length: Option<u32>,
    /// `0` skips image cleanup.
    pub preprocess: Option<String>,
}

impl OcrQuery {
    pub fn into_params(self) -> Result<RequestParams> {
        Ok(RequestParams {
            return_boxes: text_flag("return_boxes", self.return_boxes.as_deref())?,
            overrides: EngineOverrides {
                char_type: char_type(self.char_type.as_deref())?,
                box_thresh: self.box_thresh,
                unclip_ratio: self.unclip_ratio,
                drop_score: self.drop_score,
                max_text_length: self.max_text_length,
                preprocess: text_flag("preprocess", self.preprocess.as_deref())?,
            },
            lang: self.lang,
        })
    }
}

/// JSON body of `POST /v1/ocr` for remote images.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct OcrUrlRequest {
    /// http(s) URL of the image to download.
    pub file_url: Option<String>,
    pub lang: Option<String>,
    #[schema(value_type = Option<bool>)]
    pub return_boxes: Option<FlagValue>,
    #[schema(value_type = Option<CharacterSet>)]
    pub char_type: Option<String>,
    pub box_thresh: Option<f32>,
    pub unclip_ratio: Option<f32>,
    pub drop_score: Option<f32>,
    pub max_text_length: Option<u32>,
    #[schema(value_type = Option<u8>)]
    pub preprocess: Option<FlagValue>,
}

impl OcrUrlRequest {
    pub fn params(&self) -> Result<RequestParams> {
        Ok(RequestParams {
            lang: self.lang.clone(),
            return_boxes: flag("return_boxes", self.return_boxes.as_ref())?,
            overrides: EngineOverrides {
                char_type: char_type(self.char_type.as_deref())?,
                box_thresh: self.box_thresh,
                unclip_ratio: self.unclip_ratio,
                drop_score: self.drop_score,
                max_text_length: self.max_text_length,
                preprocess: flag("preprocess", self.preprocess.as_ref())?,
            },
        })
    }
}

/// Multipart body of `POST /v1/ocr`, for documentation only.
#[derive(Debug, utoipa::ToSchema)]
#[allow(dead_code)]
pub struct OcrUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub lang: Option<String>,
    pub return_boxes: Option<String>,
    pub char_type: Option<String>,
    pub box_thresh: Option<f32>,
    pub unclip_ratio: Option<f32>,
    pub drop_score: Option<f32>,
    pub max_text_length: Option<u32>,
    pub preprocess: Option<String>,
}
