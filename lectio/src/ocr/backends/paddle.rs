//! PaddleOCR ONNX backend via `oar-ocr`.
//!
//! Models are read from `<model_dir>/<lang>/`: `det.onnx`, `rec.onnx` and
//! `dict.txt` are required. `dict_en_sensitive.txt` is used for the
//! `en_sensitive` character set when present, and `cls.onnx` enables text line
//! orientation classification.

use image::RgbImage;
use oar_ocr::domain::tasks::{TextDetectionConfig, TextRecognitionConfig};
use oar_ocr::oarocr::{OAROCRBuilder, OAROCR};
use std::path::{Path, PathBuf};

use crate::error::{LectioError, Result};
use crate::ocr::engine::{EngineFactory, Quad, RawRegion, RecognitionEngine};
use crate::ocr::language::LanguageKey;
use crate::ocr::params::{CharacterSet, EngineConfig};

pub struct PaddleFactory {
    model_dir: PathBuf,
}

impl PaddleFactory {
    pub fn new(model_dir: PathBuf) -> Self {
        Self { model_dir }
    }

    fn dictionary(dir: &Path, char_type: CharacterSet) -> PathBuf {
        let sensitive = dir.join("dict_en_sensitive.txt");
        if char_type == CharacterSet::EnSensitive && sensitive.exists() {
            sensitive
        } else {
            dir.join("dict.txt")
        }
    }
}

fn require(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(LectioError::Recognition(format!(
            "Model file not found: {}",
            path.display()
        )))
    }
}

impl EngineFactory for PaddleFactory {
    fn name(&self) -> &'static str {
        "paddle"
    }

    fn build(&self, language: LanguageKey, config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>> {
        let dir = self.model_dir.join(language.as_str());
        let det = dir.join("det.onnx");
        let rec = dir.join("rec.onnx");
        let dict = Self::dictionary(&dir, config.char_type);
        for path in [&det, &rec, &dict] {
            require(path)?;
        }

        let det_config = TextDetectionConfig {
            box_threshold: config.box_thresh,
            unclip_ratio: config.unclip_ratio,
            ..Default::default()
        };
        let rec_config = TextRecognitionConfig {
            score_threshold: config.drop_score,
            max_text_length: config.max_text_length as usize,
        };

        let mut builder = OAROCRBuilder::new(det, rec, dict)
            .text_detection_config(det_config)
            .text_recognition_config(rec_config);

        let cls = dir.join("cls.onnx");
        if cls.exists() {
            builder = builder.with_text_line_orientation_classification(cls);
        }

        let ocr = builder
            .build()
            .map_err(|e| LectioError::Recognition(format!("Failed to build PaddleOCR pipeline: {e}")))?;

        Ok(Box::new(PaddleEngine { ocr }))
    }
}

struct PaddleEngine {
    ocr: OAROCR,
}

impl RecognitionEngine for PaddleEngine {
    fn detect_and_recognize(&self, image: &RgbImage) -> Result<Vec<RawRegion>> {
        let results = self
            .ocr
            .predict(vec![image.clone()])
            .map_err(|e| LectioError::Recognition(e.to_string()))?;

        let Some(result) = results.into_iter().next() else {
            return Ok(Vec::new());
        };

        Ok(result
            .text_regions
            .into_iter()
            .filter_map(|region| {
                // Regions below the score threshold come back without text.
                let text = region.text?;
                let points: Vec<[f32; 2]> = region
                    .bounding_box
                    .points
                    .iter()
                    .map(|p| [p.x, p.y])
                    .collect();
                Some(RawRegion::new(
                    to_quad(&points),
                    text.to_string(),
                    region.confidence.unwrap_or(0.0),
                ))
            })
            .collect())
    }
}

/// Exactly four points are kept as-is; other polygons collapse to their bounding rectangle.
fn to_quad(points: &[[f32; 2]]) -> Quad {
    if let Ok(quad) = <Quad>::try_from(points) {
        return quad;
    }
    if points.is_empty() {
        return [[0.0, 0.0]; 4];
    }
    let (mut x1, mut y1, mut x2, mut y2) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
    for &[x, y] in points {
        x1 = x1.min(x);
        y1 = y1.min(y);
        x2 = x2.max(x);
        y2 = y2.max(y);
    }
    [[x1, y1], [x2, y1], [x2, y2], [x1, y2]]
}
