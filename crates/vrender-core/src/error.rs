//! Error types for VRender.

use thiserror::Error;

/// Main error type for VRender operations.
#[derive(Error, Debug)]
pub enum VRenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Shader compilation error: {0}")]
    Shader(String),

    /// Upload attempted into a texture slot whose allocation does not match
    /// the frame's plane geometry.
    #[error("Format mismatch on texture slot {slot}: allocated {expected:?}, frame needs {got:?}")]
    FormatMismatch {
        slot: usize,
        expected: (u32, u32),
        got: (u32, u32),
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for VRender operations.
pub type Result<T> = std::result::Result<T, VRenderError>;
