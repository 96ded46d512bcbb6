#![allow(dead_code)]

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use image::{ImageFormat, Rgb, RgbImage};

use lectio::config::{Config, EngineBackend, EngineSettings, FetchConfig, PreprocessConfig, ServerConfig};
use lectio::error::{LectioError, Result};
use lectio::ocr::{EngineConfig, EngineFactory, LanguageKey, RawRegion, RecognitionEngine};

/// What a fake engine reports back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behaviour {
    /// One line covering the whole input image.
    FullPage,
    /// No regions at all.
    Blank,
    /// Every run fails.
    Fail,
}

/// Records every build and every image it is asked to read.
pub struct FakeFactory {
    behaviour: Behaviour,
    pub builds: Mutex<Vec<(LanguageKey, EngineConfig)>>,
    pub inputs: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl FakeFactory {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            builds: Mutex::new(Vec::new()),
            inputs: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn build_count(&self) -> usize {
        self.builds.lock().unwrap().len()
    }

    pub fn last_input(&self) -> Option<(u32, u32)> {
        self.inputs.lock().unwrap().last().copied()
    }
}

struct FakeEngine {
    behaviour: Behaviour,
    inputs: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl RecognitionEngine for FakeEngine {
    fn detect_and_recognize(&self, image: &RgbImage) -> Result<Vec<RawRegion>> {
        let (w, h) = image.dimensions();
        self.inputs.lock().unwrap().push((w, h));
        match self.behaviour {
            Behaviour::FullPage => Ok(vec![RawRegion::from_rect(
                0.0,
                0.0,
                w as f32,
                h as f32,
                "invoice 42",
                0.87,
            )]),
            Behaviour::Blank => Ok(Vec::new()),
            Behaviour::Fail => Err(LectioError::Recognition("model exploded".to_string())),
        }
    }
}

impl EngineFactory for FakeFactory {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn build(&self, language: LanguageKey, config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>> {
        self.builds.lock().unwrap().push((language, *config));
        Ok(Box::new(FakeEngine {
            behaviour: self.behaviour,
            inputs: Arc::clone(&self.inputs),
        }))
    }
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            admin_keys: vec!["admin-secret".to_string()],
            max_upload_bytes: 2 * 1024 * 1024,
        },
        engine: EngineSettings {
            backend: EngineBackend::Tesseract,
            warmup_language: "ch".to_string(),
            warmup: false,
            model_dir: PathBuf::from("models"),
            tessdata: None,
            pool_capacity: 4,
        },
        defaults: EngineConfig::default(),
        preprocess: PreprocessConfig::default(),
        fetch: FetchConfig {
            timeout_secs: 5,
            max_bytes: 1024 * 1024,
        },
    }
}

/// A white page with a dark bar, encoded as `format`.
pub fn page(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut img = RgbImage::from_pixel(width, height, Rgb([250, 250, 250]));
    for y in height / 3..(2 * height / 3).max(height / 3 + 1) {
        for x in width / 10..width - width / 10 {
            img.put_pixel(x, y, Rgb([20, 20, 20]));
        }
    }
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    page(width, height, ImageFormat::Png)
}
