//! Concrete recognition engines, selected with `OCR_ENGINE`.

#[cfg(feature = "paddle")]
mod paddle;
#[cfg(feature = "tesseract")]
mod tesseract;

use std::sync::Arc;

use crate::config::{EngineBackend, EngineSettings};
use crate::error::Result;

use super::engine::EngineFactory;

/// Factory for the configured backend. Fails when the backend was not compiled in.
pub fn create_factory(settings: &EngineSettings) -> Result<Arc<dyn EngineFactory>> {
    match settings.backend {
        EngineBackend::Paddle => paddle_factory(settings),
        EngineBackend::Tesseract => tesseract_factory(settings),
    }
}

#[cfg(feature = "paddle")]
fn paddle_factory(settings: &EngineSettings) -> Result<Arc<dyn EngineFactory>> {
    Ok(Arc::new(paddle::PaddleFactory::new(settings.model_dir.clone())))
}

#[cfg(not(feature = "paddle"))]
fn paddle_factory(_settings: &EngineSettings) -> Result<Arc<dyn EngineFactory>> {
    Err(crate::error::LectioError::Config(
        "OCR_ENGINE=paddle requires building with the `paddle` feature".to_string(),
    ))
}

#[cfg(feature = "tesseract")]
fn tesseract_factory(settings: &EngineSettings) -> Result<Arc<dyn EngineFactory>> {
    Ok(Arc::new(tesseract::TesseractFactory::new(
        settings.tessdata.clone(),
    )))
}

#[cfg(not(feature = "tesseract"))]
fn tesseract_factory(_settings: &EngineSettings) -> Result<Arc<dyn EngineFactory>> {
    Err(crate::error::LectioError::Config(
        "OCR_ENGINE=tesseract requires building with the `tesseract` feature".to_string(),
    ))
}
