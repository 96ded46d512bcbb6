use image::RgbImage;

use crate::error::Result;

use super::language::LanguageKey;
use super::params::EngineConfig;

/// Four corner points `[x, y]` of a detected text region, in engine order.
pub type Quad = [[f32; 2]; 4];

/// One detected line as reported by a recognition engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRegion {
    pub quad: Quad,
    pub text: String,
    pub score: f32,
}

impl RawRegion {
    pub fn new(quad: Quad, text: impl Into<String>, score: f32) -> Self {
        Self {
            quad,
            text: text.into(),
            score,
        }
    }

    /// Region spanning an axis-aligned rectangle.
    pub fn from_rect(left: f32, top: f32, right: f32, bottom: f32, text: impl Into<String>, score: f32) -> Self {
        Self::new(
            [[left, top], [right, top], [right, bottom], [left, bottom]],
            text,
            score,
        )
    }
}

/// A built detector + recognizer.
///
/// Implementations that are not internally thread-safe serialize their own
/// calls; the pool shares one instance between concurrent requests.
pub trait RecognitionEngine: Send + Sync {
    fn detect_and_recognize(&self, image: &RgbImage) -> Result<Vec<RawRegion>>;
}

/// Builds engines for the pool. Building typically loads model files and is slow.
pub trait EngineFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn build(&self, language: LanguageKey, config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>>;
}
