use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::error::{LectioError, Result};

use super::adapter::{self, Frame, RecognitionResult};
use super::backends;
use super::decoder::decode_image;
use super::engine::EngineFactory;
use super::language::LanguageKey;
use super::params::EngineOverrides;
use super::pool::EnginePool;
use super::preprocessing::{Enhanced, Preprocessor};

/// One OCR call: the image plus everything that tunes it.
#[derive(Debug, Clone, Default)]
pub struct RecognitionRequest {
    pub image: Vec<u8>,
    /// Caller's language selector, resolved leniently.
    pub language: String,
    pub return_boxes: bool,
    pub overrides: EngineOverrides,
}

/// Decode, preprocess, recognize, normalize.
#[derive(Clone)]
pub struct OcrService {
    pool: EnginePool,
    preprocessor: Arc<Preprocessor>,
}

impl OcrService {
    pub fn new(pool: EnginePool, preprocessor: Preprocessor) -> Self {
        Self {
            pool,
            preprocessor: Arc::new(preprocessor),
        }
    }

    /// Service wired to the backend named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let factory = backends::create_factory(&config.engine)?;
        Self::with_factory(config, factory)
    }

    pub fn with_factory(config: &Config, factory: Arc<dyn EngineFactory>) -> Result<Self> {
        let pool = EnginePool::new(factory, config.defaults, config.engine.pool_capacity)?;
        Ok(Self::new(pool, Preprocessor::new(config.preprocess.clone())))
    }

    pub fn pool(&self) -> &EnginePool {
        &self.pool
    }

    /// Runs the whole pipeline on the calling thread.
    pub fn recognize_blocking(&self, request: &RecognitionRequest) -> Result<RecognitionResult> {
        let start = Instant::now();

        request.overrides.validate()?;
        let config = self.pool.base_config().with_overrides(&request.overrides);
        config.validate()?;
        let language: LanguageKey = self.pool.resolve_language(&request.language);

        let image = decode_image(&request.image)?;
        let (width, height) = image.dimensions();

        let enhanced = if config.preprocess {
            self.preprocessor.try_enhance(&image)
        } else {
            Enhanced::unchanged(image)
        };

        let engine = self.pool.get_with(language, &config)?;
        let frame = Frame {
            width,
            height,
            scale: enhanced.scale,
        };
        let result = adapter::recognize(&engine, &enhanced.image, request.return_boxes, frame)?;

        info!(
            language = %language,
            width,
            height,
            preprocess = config.preprocess,
            chars = result.text.chars().count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OCR request completed"
        );
        Ok(result)
    }

    /// Runs the pipeline on the blocking thread pool.
    pub async fn recognize(&self, request: RecognitionRequest) -> Result<RecognitionResult> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.recognize_blocking(&request))
            .await
            .map_err(|e| LectioError::Internal(format!("OCR task panicked: {e}")))?
    }

    /// Builds engines ahead of traffic on the blocking pool.
    pub async fn warmup(&self, languages: Vec<LanguageKey>) -> Result<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || pool.warmup(&languages))
            .await
            .map_err(|e| LectioError::Internal(format!("Warmup task panicked: {e}")))?
    }
}
