//! Session configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a single visualization session.
///
/// Every field is optional in a config file; missing fields take the
/// defaults below. The session fields also accept their camelCase names
/// (`maxPoints`, ...). Unknown keys are an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Trail ring capacity (default: 2000)
    #[serde(alias = "maxPoints")]
    pub max_points: usize,

    /// History cap for hover lookup and export (default: 10000)
    #[serde(alias = "maxSavedPoints")]
    pub max_saved_points: usize,

    /// Nominal scene size, drives camera distance and grid offset (default: 10)
    #[serde(alias = "boxSize")]
    pub box_size: f64,

    /// Raw-to-scene multiplier (default: 1.0)
    #[serde(alias = "visualScale")]
    pub visual_scale: f64,

    /// Use the internal sample generator instead of a live transport
    pub simulate: bool,

    /// Render cadence in Hz (default: 60)
    pub frame_rate_hz: u32,

    /// Maximum pixel distance for a hover hit (default: 18)
    pub pick_tolerance_px: f64,

    /// Number of most recent history entries the picker scans (default: 1500)
    pub pick_scan_limit: usize,

    /// Vertical field of view in degrees (default: 60)
    pub fov_y_degrees: f64,

    /// Near clip plane (default: 0.1)
    pub near: f64,

    /// Far clip plane (default: 1000)
    pub far: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_points: 2000,
            max_saved_points: 10_000,
            box_size: 10.0,
            visual_scale: 1.0,
            simulate: false,
            frame_rate_hz: 60,
            pick_tolerance_px: 18.0,
            pick_scan_limit: 1500,
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl SessionConfig {
    /// Loads a config from a JSON file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: SessionConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the buffers and camera rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_points == 0 {
            return Err(ConfigError::ZeroCapacity { field: "max_points" });
        }
        if self.max_saved_points == 0 {
            return Err(ConfigError::ZeroCapacity { field: "max_saved_points" });
        }
        if self.frame_rate_hz == 0 {
            return Err(ConfigError::ZeroCapacity { field: "frame_rate_hz" });
        }
        if !self.visual_scale.is_finite() || self.visual_scale == 0.0 {
            return Err(ConfigError::InvalidScale(self.visual_scale));
        }
        if !self.box_size.is_finite() || self.box_size <= 0.0 {
            return Err(ConfigError::InvalidBoxSize(self.box_size));
        }
        // nalgebra's perspective asserts on superimposed planes
        if !(self.near.is_finite() && self.far.is_finite() && 0.0 < self.near && self.near < self.far) {
            return Err(ConfigError::InvalidClipPlanes {
                near: self.near,
                far: self.far,
            });
        }
        if !(self.fov_y_degrees.is_finite() && self.fov_y_degrees > 0.0 && self.fov_y_degrees < 180.0) {
            return Err(ConfigError::InvalidFieldOfView(self.fov_y_degrees));
        }
        if !(self.pick_tolerance_px.is_finite() && self.pick_tolerance_px >= 0.0) {
            return Err(ConfigError::InvalidPickTolerance(self.pick_tolerance_px));
        }
        if self.pick_scan_limit == 0 {
            return Err(ConfigError::ZeroCapacity { field: "pick_scan_limit" });
        }
        Ok(())
    }

    /// Duration of one render tick.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.frame_rate_hz.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.max_points, 2000);
        assert_eq!(config.max_saved_points, 10_000);
        assert_eq!(config.box_size, 10.0);
        assert_eq!(config.visual_scale, 1.0);
        assert!(!config.simulate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"max_points": 64, "simulate": true}"#).unwrap();
        assert_eq!(config.max_points, 64);
        assert!(config.simulate);
        assert_eq!(config.max_saved_points, 10_000);
    }

    #[test]
    fn test_camel_case_keys_are_accepted() {
        let config: SessionConfig = serde_json::from_str(
            r#"{"maxPoints": 64, "maxSavedPoints": 128, "boxSize": 20.0, "visualScale": 0.5}"#,
        )
        .unwrap();
        assert_eq!(config.max_points, 64);
        assert_eq!(config.max_saved_points, 128);
        assert_eq!(config.box_size, 20.0);
        assert_eq!(config.visual_scale, 0.5);
    }

    #[test]
    fn test_unknown_key_is_refused() {
        let result = serde_json::from_str::<SessionConfig>(r#"{"max_pionts": 64}"#);
        assert!(result.is_err());

        let path = std::env::temp_dir().join(format!("locator-config-typo-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"visualscale": 2.0}"#).unwrap();
        assert!(matches!(SessionConfig::from_json_file(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = SessionConfig {
            max_points: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroCapacity { field: "max_points" })));

        let config = SessionConfig {
            visual_scale: f64::NAN,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidScale(_))));

        let config = SessionConfig {
            box_size: -1.0,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBoxSize(_))));
    }

    #[test]
    fn test_validate_rejects_degenerate_projection() {
        let config: SessionConfig = serde_json::from_str(r#"{"near": 5.0, "far": 5.0}"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidClipPlanes { near, far }) if near == 5.0 && far == 5.0
        ));

        for (near, far) in [(0.0, 10.0), (10.0, 1.0), (0.1, f64::INFINITY), (f64::NAN, 1.0)] {
            let config = SessionConfig {
                near,
                far,
                ..SessionConfig::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::InvalidClipPlanes { .. })), "{near} {far}");
        }

        for fov in [f64::NAN, 0.0, 180.0, -30.0] {
            let config = SessionConfig {
                fov_y_degrees: fov,
                ..SessionConfig::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::InvalidFieldOfView(_))), "{fov}");
        }
    }

    #[test]
    fn test_validate_rejects_bad_pick_settings() {
        for tolerance in [-1.0, f64::NAN, f64::INFINITY] {
            let config = SessionConfig {
                pick_tolerance_px: tolerance,
                ..SessionConfig::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::InvalidPickTolerance(_))));
        }

        let config = SessionConfig {
            pick_scan_limit: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroCapacity { field: "pick_scan_limit" })
        ));

        let config = SessionConfig {
            pick_tolerance_px: 0.0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_with_equal_clip_planes_is_refused() {
        let path = std::env::temp_dir().join(format!("locator-config-clip-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"near": 5.0, "far": 5.0}"#).unwrap();

        let result = SessionConfig::from_json_file(&path);
        assert!(matches!(result, Err(ConfigError::InvalidClipPlanes { .. })));

        std::fs::remove_file(&path).unwrap();
    }
}
