//! User-facing color correction properties.

use std::f64::consts::PI;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ColorError;

/// Brightness, contrast, saturation and hue, each in [-1, 1]; 0 is neutral.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorProperty {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub hue: f64,
}

/// Shader-ready terms derived from a [`ColorProperty`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCoefficients {
    /// Added to luma, in [-1, 1].
    pub brightness: f32,
    /// Luma gain, in [0, 2].
    pub contrast: f32,
    /// `(s·cos h, s·sin h)`: rotates and scales the chroma vector.
    pub sat_hue: [f32; 2],
}

impl ColorProperty {
    /// Create a property set, clamping each component to [-1, 1].
    pub fn new(brightness: f64, contrast: f64, saturation: f64, hue: f64) -> Self {
        Self {
            brightness,
            contrast,
            saturation,
            hue,
        }
        .clamped()
    }

    /// Neutral values leave the picture untouched.
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// Copy with every component clamped to [-1, 1].
    pub fn clamped(self) -> Self {
        Self {
            brightness: self.brightness.clamp(-1.0, 1.0),
            contrast: self.contrast.clamp(-1.0, 1.0),
            saturation: self.saturation.clamp(-1.0, 1.0),
            hue: self.hue.clamp(-1.0, 1.0),
        }
    }

    /// Reject components outside [-1, 1].
    pub fn validate(&self) -> Result<(), ColorError> {
        for (name, value) in [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
            ("hue", self.hue),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(ColorError::OutOfRange { name, value });
            }
        }
        Ok(())
    }

    /// Terms consumed by the fragment program.
    pub fn coefficients(&self) -> ColorCoefficients {
        let sat = (self.saturation + 1.0).clamp(0.0, 2.0);
        let hue = (self.hue * PI).clamp(-PI, PI);
        ColorCoefficients {
            brightness: self.brightness.clamp(-1.0, 1.0) as f32,
            contrast: (self.contrast + 1.0).clamp(0.0, 2.0) as f32,
            sat_hue: [(sat * hue.cos()) as f32, (sat * hue.sin()) as f32],
        }
    }
}

/// Parses `"brightness,contrast,saturation,hue"`.
impl FromStr for ColorProperty {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|e| ColorError::Parse(format!("{v:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let [brightness, contrast, saturation, hue] = values[..] else {
            return Err(ColorError::DimensionMismatch {
                expected: 4,
                got: values.len(),
            });
        };
        let prop = Self {
            brightness,
            contrast,
            saturation,
            hue,
        };
        prop.validate()?;
        Ok(prop)
    }
}
