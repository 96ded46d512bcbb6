//! Lectio: single-page OCR over HTTP.
//!
//! The library exposes the OCR core ([`ocr`]), configuration and the axum
//! router so the binary and the integration tests share one wiring.

pub mod api;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ocr;
