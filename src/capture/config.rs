//! Camera stream constraints and capture configuration.
//!
//! The stream request mirrors what a browser `getUserMedia` call asks
//! for: an ideal resolution, a lens preference, and optionally an exact
//! device.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Default JPEG quality factor (0.8 on a 0-1 scale).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Preferred lens direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Outward-facing lens, pointed at the food.
    #[default]
    Environment,
    /// Lens facing the user.
    User,
}

/// Configuration for camera capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Ideal frame width in pixels.
    pub ideal_width: u32,
    /// Ideal frame height in pixels.
    pub ideal_height: u32,
    /// Preferred lens direction.
    pub facing: Facing,
    /// JPEG quality for captured stills (1-100).
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            facing: Facing::Environment,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl CameraConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ideal_width == 0 || self.ideal_height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConfigError::InvalidQuality(self.jpeg_quality));
        }
        Ok(())
    }

    /// Stream constraints with no device pinned.
    pub fn constraints(&self) -> StreamConstraints {
        StreamConstraints {
            ideal_width: self.ideal_width,
            ideal_height: self.ideal_height,
            facing: self.facing,
            device_id: None,
        }
    }
}

/// What a camera stream request asks the platform for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: Facing,
    /// Exact device match when present.
    pub device_id: Option<String>,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        CameraConfig::default().constraints()
    }
}

impl StreamConstraints {
    /// Bare request used to unlock device labels.
    pub fn probe() -> Self {
        Self {
            device_id: None,
            ..Self::default()
        }
    }

    /// Returns a copy pinned to `device_id`, or unpinned for `None`.
    pub fn for_device(&self, device_id: Option<&str>) -> Self {
        Self {
            device_id: device_id.map(str::to_owned),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = CameraConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ideal_width, 1280);
        assert_eq!(config.ideal_height, 720);
        assert_eq!(config.facing, Facing::Environment);
    }

    #[test]
    fn test_zero_quality_invalid() {
        let config = CameraConfig {
            jpeg_quality: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidQuality(0))
        ));
    }

    #[test]
    fn test_for_device_pins_exact_id() {
        let base = StreamConstraints::default();
        let pinned = base.for_device(Some("cam-2"));
        assert_eq!(pinned.device_id.as_deref(), Some("cam-2"));
        assert_eq!(pinned.ideal_width, base.ideal_width);
        assert_eq!(pinned.for_device(None).device_id, None);
    }
}
