use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{LectioError, Result};
use crate::ocr::{CharacterSet, EngineConfig};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

/// Accepts the usual spellings of a boolean flag (`1`, `true`, `yes`, `on` and their negatives).
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_flag_or(var: &str, default: bool) -> bool {
    match env::var(var) {
        Ok(val) => parse_flag(&val).unwrap_or_else(|| {
            tracing::warn!("Invalid value '{}' for {}. Using default.", val, var);
            default
        }),
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub engine: EngineSettings,
    /// Base recognition tunables every request starts from.
    pub defaults: EngineConfig,
    pub preprocess: PreprocessConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub admin_keys: Vec<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    Paddle,
    Tesseract,
}

impl EngineBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineBackend::Paddle => "paddle",
            EngineBackend::Tesseract => "tesseract",
        }
    }
}

impl Default for EngineBackend {
    fn default() -> Self {
        if cfg!(feature = "paddle") {
            EngineBackend::Paddle
        } else {
            EngineBackend::Tesseract
        }
    }
}

impl fmt::Display for EngineBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paddle" | "paddleocr" => Ok(EngineBackend::Paddle),
            "tesseract" | "local/tesseract" => Ok(EngineBackend::Tesseract),
            other => Err(format!("unknown OCR engine '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    pub backend: EngineBackend,
    /// Language selector for the engine built at startup.
    pub warmup_language: String,
    pub warmup: bool,
    /// Root of the PaddleOCR model tree (`<dir>/<lang>/det.onnx`, ...).
    pub model_dir: PathBuf,
    pub tessdata: Option<String>,
    pub pool_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessConfig {
    pub target_height: u32,
    pub max_upscale: f32,
    pub bilateral_diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
    pub clahe_clip_limit: f32,
    pub clahe_tiles: u32,
    /// Radius of the closing kernel; 0 disables the step.
    pub close_radius: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            target_height: 48,
            max_upscale: 3.0,
            bilateral_diameter: 5,
            sigma_color: 30.0,
            sigma_space: 30.0,
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            close_radius: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_bytes: usize,
}

const TWENTY_MIB: usize = 20 * 1024 * 1024;

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_bytes: TWENTY_MIB,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let base = EngineConfig::default();
        let preprocess = PreprocessConfig::default();
        let fetch = FetchConfig::default();

        Self {
            server: ServerConfig {
                host: env::var("LECTIO_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("LECTIO_PORT", 8000),
                admin_keys: env::var("LECTIO_ADMIN_KEYS")
                    .map(|s| {
                        s.split(',')
                            .map(|k| k.trim().to_string())
                            .filter(|k| !k.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
                max_upload_bytes: parse_env_or("LECTIO_MAX_UPLOAD_BYTES", TWENTY_MIB),
            },
            engine: EngineSettings {
                backend: parse_env_or("OCR_ENGINE", EngineBackend::default()),
                warmup_language: env::var("OCR_LANG").unwrap_or_else(|_| "ch".to_string()),
                warmup: env_flag_or("OCR_WARMUP", true),
                model_dir: env::var("OCR_MODEL_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("models")),
                tessdata: env::var("OCR_TESSDATA").ok().filter(|s| !s.is_empty()),
                pool_capacity: parse_env_or("OCR_POOL_CAPACITY", 8),
            },
            defaults: EngineConfig {
                char_type: parse_env_or::<CharacterSet>("OCR_CHAR_TYPE", base.char_type),
                box_thresh: parse_env_or("OCR_BOX_THRESH", base.box_thresh),
                unclip_ratio: parse_env_or("OCR_UNCLIP_RATIO", base.unclip_ratio),
                drop_score: parse_env_or("OCR_DROP_SCORE", base.drop_score),
                max_text_length: parse_env_or("OCR_MAX_TEXT_LENGTH", base.max_text_length),
                preprocess: env_flag_or("OCR_PREPROCESS", base.preprocess),
            },
            preprocess: PreprocessConfig {
                target_height: parse_env_or("PREPROCESS_TARGET_HEIGHT", preprocess.target_height),
                max_upscale: parse_env_or("PREPROCESS_MAX_UPSCALE", preprocess.max_upscale),
                bilateral_diameter: parse_env_or(
                    "PREPROCESS_BILATERAL_DIAMETER",
                    preprocess.bilateral_diameter,
                ),
                sigma_color: parse_env_or("PREPROCESS_SIGMA_COLOR", preprocess.sigma_color),
                sigma_space: parse_env_or("PREPROCESS_SIGMA_SPACE", preprocess.sigma_space),
                clahe_clip_limit: parse_env_or("PREPROCESS_CLAHE_CLIP", preprocess.clahe_clip_limit),
                clahe_tiles: parse_env_or("PREPROCESS_CLAHE_TILES", preprocess.clahe_tiles),
                close_radius: parse_env_or("PREPROCESS_CLOSE_RADIUS", preprocess.close_radius),
            },
            fetch: FetchConfig {
                timeout_secs: parse_env_opt("FETCH_TIMEOUT_SECS").unwrap_or(fetch.timeout_secs),
                max_bytes: parse_env_opt("FETCH_MAX_BYTES").unwrap_or(fetch.max_bytes),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Rejects settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        self.defaults.validate()?;

        if self.engine.pool_capacity == 0 {
            return Err(LectioError::Config(
                "OCR_POOL_CAPACITY must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(LectioError::Config(
                "FETCH_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
