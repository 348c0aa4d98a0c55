//! Color subsystem errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ColorError {
    #[error("{name} out of range: {value} (expected -1.0..=1.0)")]
    OutOfRange { name: &'static str, value: f64 },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}
