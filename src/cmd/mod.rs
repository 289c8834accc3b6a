//! Command-line entry points.

pub mod cache;
pub mod ocr;
pub mod schema;
