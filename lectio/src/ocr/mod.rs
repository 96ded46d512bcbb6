//! OCR core: image decoding, cleanup, the engine pool and result normalization.
//!
//! # Architecture
//!
//! - [`decode_image`] turns uploaded bytes into an RGB buffer
//! - [`Preprocessor`] runs the optional cleanup chain
//! - [`EnginePool`] caches engines per language and engine config
//! - [`adapter`] converts engine regions into [`RecognitionResult`]
//! - [`OcrService`] ties them together for one request
//!
//! Concrete engines live in `backends` behind the [`EngineFactory`] and
//! [`RecognitionEngine`] traits.

pub mod adapter;
mod backends;
mod decoder;
mod engine;
mod language;
mod params;
mod pool;
mod preprocessing;
mod service;

pub use adapter::{quad_to_bbox, Frame, RecognitionResult, TextBox};
pub use backends::create_factory;
pub use decoder::decode_image;
pub use engine::{EngineFactory, Quad, RawRegion, RecognitionEngine};
pub use language::{resolve_language, LanguageKey};
pub use params::{CharacterSet, EngineConfig, EngineKey, EngineOverrides};
pub use pool::{EnginePool, PooledEngine};
pub use preprocessing::{upscale_factor, Enhanced, Preprocessor};
pub use service::{OcrService, RecognitionRequest};
