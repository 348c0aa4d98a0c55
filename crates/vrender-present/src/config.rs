//! Renderer configuration.
//!
//! Stored as JSON. Every field is optional; missing fields take their
//! default.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vrender_color::{ColorProperty, ColorRange, YuvColorSpace};
use vrender_core::{Alignment, Effects, Point, Result, VRenderError};

/// Initial state applied to a [`Renderer`](crate::Renderer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Aspect override: > 0 forces a ratio, 0 follows the item box, < 0
    /// uses the stream's own aspect.
    pub aspect_ratio: f64,
    /// Crop override, with the same sentinels as `aspect_ratio`.
    pub crop_ratio: f64,
    pub alignment: Alignment,
    /// Offset in percent of the letterbox size.
    pub offset: [i32; 2],
    pub effects: Effects,
    pub color: ColorProperty,
    pub color_space: YuvColorSpace,
    pub color_range: ColorRange,
    /// Draw the subtitle/OSD layer.
    pub osd: bool,
    /// RGBA clear color of the bars around the video.
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: -1.0,
            crop_ratio: -1.0,
            alignment: Alignment::CENTER,
            offset: [0, 0],
            effects: Effects::empty(),
            color: ColorProperty::default(),
            color_space: YuvColorSpace::Bt601,
            color_range: ColorRange::Limited,
            osd: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl RendererConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VRenderError::Config(format!("Failed to parse renderer config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| VRenderError::Config(format!("Failed to serialize renderer config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        self.color
            .validate()
            .map_err(|e| VRenderError::Config(e.to_string()))?;
        if self.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(VRenderError::Config(format!(
                "clear_color components must be within 0..=1, got {:?}",
                self.clear_color
            )));
        }
        if !self.aspect_ratio.is_finite() || !self.crop_ratio.is_finite() {
            return Err(VRenderError::Config("aspect and crop ratios must be finite".to_string()));
        }
        Ok(())
    }

    #[inline]
    pub fn offset_point(&self) -> Point {
        Point::new(self.offset[0], self.offset[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = RendererConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RendererConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let json = r#"{
            "aspect_ratio": 2.35,
            "color_space": "Bt709",
            "color": { "brightness": 0.25 },
            "offset": [5, -10]
        }"#;
        let config = RendererConfig::from_json_str(json).unwrap();
        assert_eq!(config.aspect_ratio, 2.35);
        assert_eq!(config.color_space, YuvColorSpace::Bt709);
        assert_eq!(config.color.brightness, 0.25);
        assert_eq!(config.color.contrast, 0.0);
        assert_eq!(config.offset_point(), Point::new(5, -10));
        assert!(config.osd);
    }

    #[test]
    fn test_json_round_trip() {
        let config = RendererConfig {
            effects: Effects::FLIP_HORIZONTALLY | Effects::SHARPEN,
            alignment: Alignment::LEFT | Alignment::TOP,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(RendererConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let err = RendererConfig::from_json_str(r#"{ "color": { "hue": 3.0 } }"#).unwrap_err();
        assert!(matches!(err, VRenderError::Config(_)));
        let err = RendererConfig::from_json_str(r#"{ "clear_color": [0, 0, 2, 1] }"#).unwrap_err();
        assert!(matches!(err, VRenderError::Config(_)));
        assert!(RendererConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = RendererConfig::load(Path::new("/nonexistent/vrender.json")).unwrap_err();
        assert!(matches!(err, VRenderError::Io(_)));
    }
}
