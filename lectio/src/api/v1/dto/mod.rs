//! v1 API Data Transfer Objects.
//!
//! Field names are snake_case on the wire to match the query parameters
//! existing OCR clients send.

pub mod engine;
pub mod ocr;

pub use engine::*;
pub use ocr::*;
