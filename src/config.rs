//! Configuration loading for the fusion engine

use crate::error::{FusionError, Result};
use crate::perception::sensors::{HeadingSource, Platform};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct FusionConfig {
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub fusion: FusionParams,
    #[serde(default)]
    pub route: RouteConfig,
}

/// Floor plan dimensions and metric scale
#[derive(Clone, Debug, Deserialize)]
pub struct MapConfig {
    /// Floor plan width in map pixels (default: 675)
    #[serde(default = "default_map_width")]
    pub width_px: f64,

    /// Floor plan height in map pixels (default: 878)
    #[serde(default = "default_map_height")]
    pub height_px: f64,

    /// Map pixels per metre of AR camera travel (default: 100)
    #[serde(default = "default_pixels_per_meter")]
    pub pixels_per_meter: f64,
}

/// Heading and motion fusion parameters
#[derive(Clone, Debug, Deserialize)]
pub struct FusionParams {
    /// Host platform, selects the AR rotation sign (default: ios)
    #[serde(default)]
    pub platform: Platform,

    /// Yaw source used for heading fusion (default: device_yaw)
    #[serde(default)]
    pub heading_source: HeadingSource,

    /// Display yaw drift only, ignoring the origin heading (default: false)
    #[serde(default)]
    pub yaw_only: bool,

    /// Rotate camera displacement with the live yaw instead of the anchor yaw
    /// (default: false)
    #[serde(default)]
    pub rotate_with_current_yaw: bool,

    /// Weight of a new yaw sample, 1.0 disables smoothing (default: 1.0)
    #[serde(default = "default_yaw_smoothing")]
    pub yaw_smoothing: f64,

    /// Weight of the previous position, 0.0 disables smoothing (default: 0.0)
    #[serde(default)]
    pub position_smoothing: f64,

    /// Camera travel dead-zone in metres; a sample is skipped only when both
    /// dead-zones hold (default: 0.0)
    #[serde(default)]
    pub deadzone_m: f64,

    /// Map displacement dead-zone in pixels (default: 0.0)
    #[serde(default)]
    pub deadzone_px: f64,

    /// Re-anchor after the AR session recovers from degraded tracking
    /// (default: true)
    #[serde(default = "default_true")]
    pub reanchor_on_tracking_recovery: bool,

    /// Vertical offset of AR route anchors relative to the anchor camera
    /// height, in metres (default: -0.05)
    #[serde(default = "default_route_y_offset")]
    pub route_y_offset_m: f64,
}

/// Route progress parameters
#[derive(Clone, Debug, Deserialize)]
pub struct RouteConfig {
    /// Radius around a waypoint that counts as reached, in metres (default: 1.0)
    #[serde(default = "default_waypoint_radius")]
    pub waypoint_radius_m: f64,

    /// Walking speed used for the ETA, in m/s (default: 1.2)
    #[serde(default = "default_walking_speed")]
    pub walking_speed_mps: f64,
}

fn default_map_width() -> f64 {
    675.0
}
fn default_map_height() -> f64 {
    878.0
}
fn default_pixels_per_meter() -> f64 {
    100.0
}
fn default_yaw_smoothing() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}
fn default_route_y_offset() -> f64 {
    -0.05
}
fn default_waypoint_radius() -> f64 {
    1.0
}
fn default_walking_speed() -> f64 {
    1.2
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width_px: default_map_width(),
            height_px: default_map_height(),
            pixels_per_meter: default_pixels_per_meter(),
        }
    }
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            heading_source: HeadingSource::default(),
            yaw_only: false,
            rotate_with_current_yaw: false,
            yaw_smoothing: default_yaw_smoothing(),
            position_smoothing: 0.0,
            deadzone_m: 0.0,
            deadzone_px: 0.0,
            reanchor_on_tracking_recovery: true,
            route_y_offset_m: default_route_y_offset(),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            waypoint_radius_m: default_waypoint_radius(),
            walking_speed_mps: default_walking_speed(),
        }
    }
}

impl FusionConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FusionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        positive("map.width_px", self.map.width_px)?;
        positive("map.height_px", self.map.height_px)?;
        positive("map.pixels_per_meter", self.map.pixels_per_meter)?;

        let f = &self.fusion;
        if !(f.yaw_smoothing > 0.0 && f.yaw_smoothing <= 1.0) {
            return Err(FusionError::Config(
                "fusion.yaw_smoothing must be in (0, 1]".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&f.position_smoothing) {
            return Err(FusionError::Config(
                "fusion.position_smoothing must be in [0, 1)".to_string(),
            ));
        }
        non_negative("fusion.deadzone_m", f.deadzone_m)?;
        non_negative("fusion.deadzone_px", f.deadzone_px)?;
        if !f.route_y_offset_m.is_finite() {
            return Err(FusionError::NonFinite("fusion.route_y_offset_m"));
        }

        positive("route.waypoint_radius_m", self.route.waypoint_radius_m)?;
        positive("route.walking_speed_mps", self.route.walking_speed_mps)?;
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FusionError::Config(format!("{} must be positive", name)))
    }
}

fn non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FusionError::Config(format!("{} must be non-negative", name)))
    }
}
