//! YCbCr ↔ RGB conversion constants.
#![allow(clippy::excessive_precision)]

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// YCbCr matrix coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum YuvColorSpace {
    /// ITU-R BT.601 (SD content)
    #[default]
    Bt601,
    /// ITU-R BT.709 (HD content)
    Bt709,
}

impl YuvColorSpace {
    /// Luma weights (Kr, Kb).
    pub fn weights(self) -> (f32, f32) {
        match self {
            Self::Bt601 => (0.299, 0.114),
            Self::Bt709 => (0.2126, 0.0722),
        }
    }
}

/// Quantization range of YCbCr samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorRange {
    /// Y in 16..=235, chroma in 16..=240.
    #[default]
    Limited,
    /// Full 0..=255.
    Full,
}

impl ColorRange {
    /// (luma offset, luma scale, chroma scale) for normalized samples.
    fn terms(self) -> (f32, f32, f32) {
        match self {
            Self::Limited => (16.0 / 255.0, 255.0 / 219.0, 255.0 / 224.0),
            Self::Full => (0.0, 1.0, 1.0),
        }
    }
}

const CHROMA_ZERO: f32 = 128.0 / 255.0;

/// Affine YCbCr → RGB transform on normalized samples: `rgb = matrix * yuv + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YuvToRgb {
    pub matrix: Mat3,
    pub offset: Vec3,
}

impl YuvToRgb {
    pub fn new(space: YuvColorSpace, range: ColorRange) -> Self {
        let (kr, kb) = space.weights();
        let kg = 1.0 - kr - kb;
        let (y0, ys, cs) = range.terms();

        // Columns are the contributions of Y, Cb and Cr.
        let matrix = Mat3::from_cols(
            Vec3::splat(ys),
            Vec3::new(0.0, -cs * 2.0 * kb * (1.0 - kb) / kg, cs * 2.0 * (1.0 - kb)),
            Vec3::new(cs * 2.0 * (1.0 - kr), -cs * 2.0 * kr * (1.0 - kr) / kg, 0.0),
        );
        let offset = -(matrix * Vec3::new(y0, CHROMA_ZERO, CHROMA_ZERO));
        Self { matrix, offset }
    }

    /// Luma black level in normalized units.
    pub fn luma_offset(range: ColorRange) -> f32 {
        range.terms().0
    }

    /// Convert one 8-bit sample triple.
    pub fn apply(&self, y: u8, u: u8, v: u8) -> [u8; 3] {
        let yuv = Vec3::new(y as f32, u as f32, v as f32) / 255.0;
        let rgb = (self.matrix * yuv + self.offset).clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
        [
            rgb.x.round() as u8,
            rgb.y.round() as u8,
            rgb.z.round() as u8,
        ]
    }

    /// Columns as three padded vectors, laid out for a WGSL `mat3x3<f32>`.
    pub fn matrix_columns(&self) -> [[f32; 4]; 3] {
        let c = self.matrix.to_cols_array_2d();
        [
            [c[0][0], c[0][1], c[0][2], 0.0],
            [c[1][0], c[1][1], c[1][2], 0.0],
            [c[2][0], c[2][1], c[2][2], 0.0],
        ]
    }
}

impl Default for YuvToRgb {
    fn default() -> Self {
        Self::new(YuvColorSpace::default(), ColorRange::default())
    }
}

/// Convert one RGB triple to 8-bit YCbCr.
pub fn rgb_to_yuv(space: YuvColorSpace, range: ColorRange, rgb: [u8; 3]) -> [u8; 3] {
    let (kr, kb) = space.weights();
    let kg = 1.0 - kr - kb;
    let (y0, ys, cs) = range.terms();
    let [r, g, b] = rgb.map(|c| c as f32 / 255.0);

    let luma = kr * r + kg * g + kb * b;
    let cb = (b - luma) / (2.0 * (1.0 - kb));
    let cr = (r - luma) / (2.0 * (1.0 - kr));

    let y = luma / ys + y0;
    let u = cb / cs + CHROMA_ZERO;
    let v = cr / cs + CHROMA_ZERO;
    [y, u, v].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}
