pub mod engine;
pub(crate) mod health;
pub mod ocr;

pub use health::health_check;
