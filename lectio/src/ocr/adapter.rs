use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::engine::{Quad, RawRegion};
use super::pool::PooledEngine;

/// One recognized line with its box in original image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TextBox {
    pub text: String,
    /// `[x1, y1, x2, y2]` with `x1 <= x2` and `y1 <= y2`.
    #[schema(value_type = Vec<i32>)]
    pub bbox: [i32; 4],
    /// Recognition score in `[0, 1]`.
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RecognitionResult {
    /// Recognized lines joined with `\n`, in detection order.
    pub text: String,
    /// Present only when boxes were requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boxes: Option<Vec<TextBox>>,
}

/// Geometry of the image the caller submitted, and how much the engine's
/// input was scaled relative to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
}

impl Frame {
    pub fn unscaled(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scale: 1.0,
        }
    }
}

/// Axis-aligned `[min_x, min_y, max_x, max_y]` of a quad.
pub fn quad_to_bbox(quad: &Quad) -> [f32; 4] {
    let mut bbox = [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY];
    for &[x, y] in quad {
        let (x, y) = (finite_or_zero(x), finite_or_zero(y));
        bbox[0] = bbox[0].min(x);
        bbox[1] = bbox[1].min(y);
        bbox[2] = bbox[2].max(x);
        bbox[3] = bbox[3].max(y);
    }
    bbox
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn clamp_confidence(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

fn to_frame_bbox(quad: &Quad, frame: Frame) -> [i32; 4] {
    let [x1, y1, x2, y2] = quad_to_bbox(quad);
    let scale = if frame.scale > 0.0 { frame.scale } else { 1.0 };
    let (w, h) = (f64::from(frame.width), f64::from(frame.height));

    let map = |v: f32, limit: f64| (f64::from(v) / scale).clamp(0.0, limit);
    [
        map(x1, w).floor() as i32,
        map(y1, h).floor() as i32,
        map(x2, w).ceil() as i32,
        map(y2, h).ceil() as i32,
    ]
}

/// Turns raw engine output into the response shape.
pub fn normalize(regions: Vec<RawRegion>, return_boxes: bool, frame: Frame) -> RecognitionResult {
    let text = regions
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let boxes = return_boxes.then(|| {
        regions
            .into_iter()
            .map(|region| TextBox {
                bbox: to_frame_bbox(&region.quad, frame),
                confidence: clamp_confidence(region.score),
                text: region.text,
            })
            .collect()
    });

    RecognitionResult { text, boxes }
}

/// Runs `engine` on `image` and normalizes its output. Engine failures are
/// returned as-is.
pub fn recognize(
    engine: &PooledEngine,
    image: &RgbImage,
    return_boxes: bool,
    frame: Frame,
) -> Result<RecognitionResult> {
    let regions = engine.run(image)?;
    tracing::debug!(
        regions = regions.len(),
        language = %engine.language(),
        char_type = %engine.config().char_type,
        generation = engine.generation(),
        "Engine returned regions"
    );
    Ok(normalize(regions, return_boxes, frame))
}
