//! Admin DTOs for the base engine configuration.

use serde::{Deserialize, Serialize};

use super::ocr::FlagValue;
use crate::error::{LectioError, Result};
use crate::ocr::{CharacterSet, EngineConfig, EngineOverrides};

/// Body of `PUT /v1/engine/config`. Omitted fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
pub struct UpdateEngineConfigRequest {
    pub char_type: Option<CharacterSet>,
    pub box_thresh: Option<f32>,
    pub unclip_ratio: Option<f32>,
    pub drop_score: Option<f32>,
    pub max_text_length: Option<u32>,
    #[schema(value_type = Option<u8>)]
    pub preprocess: Option<FlagValue>,
}

impl UpdateEngineConfigRequest {
    pub fn into_overrides(self) -> Result<EngineOverrides> {
        let preprocess = match self.preprocess {
            Some(value) => Some(value.to_bool().ok_or_else(|| {
                LectioError::Validation("preprocess must be 0 or 1".to_string())
            })?),
            None => None,
        };

        Ok(EngineOverrides {
            char_type: self.char_type,
            box_thresh: self.box_thresh,
            unclip_ratio: self.unclip_ratio,
            drop_score: self.drop_score,
            max_text_length: self.max_text_length,
            preprocess,
        })
    }
}

/// Current base configuration of the engine pool.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfigResponse {
    pub backend: String,
    /// Bumped every time the configuration is replaced.
    pub generation: u64,
    pub cached_engines: usize,
    pub config: EngineConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_converts_to_overrides() {
        let req: UpdateEngineConfigRequest =
            serde_json::from_str(r#"{"box_thresh":0.5,"char_type":"default","preprocess":"0"}"#)
                .unwrap();
        let overrides = req.into_overrides().unwrap();

        assert_eq!(overrides.box_thresh, Some(0.5));
        assert_eq!(overrides.char_type, Some(CharacterSet::Default));
        assert_eq!(overrides.preprocess, Some(false));
        assert_eq!(overrides.drop_score, None);
    }

    #[test]
    fn response_serializes_camel_case() {
        let resp = EngineConfigResponse {
            backend: "tesseract".into(),
            generation: 2,
            cached_engines: 1,
            config: EngineConfig::default(),
        };
        let json = serde_json::to_value(&resp).unwrap();

        assert_eq!(json["cachedEngines"], 1);
        assert_eq!(json["config"]["char_type"], "en_sensitive");
        assert_eq!(json["config"]["max_text_length"], 128);
    }
}
