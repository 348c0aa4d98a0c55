//! VRender Color: color correction, YCbCr conversion and convolution kernels.

pub mod convert;
pub mod error;
pub mod kernel;
pub mod matrix;
pub mod property;

pub use convert::{frame_from_rgba, save_image, test_pattern, FrameImageExt};
pub use error::ColorError;
pub use kernel::Kernel3x3;
pub use matrix::{ColorRange, YuvColorSpace, YuvToRgb};
pub use property::{ColorCoefficients, ColorProperty};
