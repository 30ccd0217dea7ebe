//! Map frame geometry
//!
//! The floor plan is a pixel image with a fixed metric scale. This module
//! owns its bounds and the pixel <-> metre conversions used by motion
//! integration, route progress and AR route placement.

use crate::common::MapPoint;
use crate::config::MapConfig;
use crate::error::{FusionError, Result};
use nalgebra::Vector2;

/// Metric world coordinate on the floor plane, y up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

/// Bounds and scale of the floor plan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapFrame {
    pub width: f64,
    pub height: f64,
    pub pixels_per_meter: f64,
}

impl MapFrame {
    pub fn new(width: f64, height: f64, pixels_per_meter: f64) -> Result<Self> {
        let frame = MapFrame {
            width,
            height,
            pixels_per_meter,
        };
        frame.validate()?;
        Ok(frame)
    }

    pub fn from_config(config: &MapConfig) -> Result<Self> {
        Self::new(config.width_px, config.height_px, config.pixels_per_meter)
    }

    fn validate(&self) -> Result<()> {
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(FusionError::Config("Map width must be positive".to_string()));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(FusionError::Config("Map height must be positive".to_string()));
        }
        if !(self.pixels_per_meter.is_finite() && self.pixels_per_meter > 0.0) {
            return Err(FusionError::Config(
                "Pixels per meter must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Change the metric scale
    pub fn set_pixels_per_meter(&mut self, pixels_per_meter: f64) -> Result<()> {
        let mut next = *self;
        next.pixels_per_meter = pixels_per_meter;
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn contains(&self, p: &MapPoint) -> bool {
        (0.0..=self.width).contains(&p.x) && (0.0..=self.height).contains(&p.y)
    }

    /// Clamp a point onto the floor plan
    pub fn clamp(&self, p: MapPoint) -> MapPoint {
        MapPoint::new(p.x.clamp(0.0, self.width), p.y.clamp(0.0, self.height))
    }

    pub fn pixels_to_meters(&self, pixels: f64) -> f64 {
        pixels / self.pixels_per_meter
    }

    pub fn meters_to_pixels(&self, meters: f64) -> f64 {
        meters * self.pixels_per_meter
    }

    /// Map point to metres relative to `origin`, y flipped to point up
    pub fn map_to_world(&self, p: MapPoint, origin: MapPoint) -> WorldPoint {
        WorldPoint {
            x: (p.x - origin.x) / self.pixels_per_meter,
            y: -(p.y - origin.y) / self.pixels_per_meter,
        }
    }

    /// Metric y-up displacement to a map pixel displacement
    pub fn displacement_to_pixels(&self, meters_up: Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            meters_up.x * self.pixels_per_meter,
            -meters_up.y * self.pixels_per_meter,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_bad_dimensions() {
        assert!(MapFrame::new(0.0, 10.0, 100.0).is_err());
        assert!(MapFrame::new(10.0, f64::NAN, 100.0).is_err());
        assert!(MapFrame::new(10.0, 10.0, -1.0).is_err());

        let mut frame = MapFrame::new(10.0, 10.0, 100.0).unwrap();
        assert!(frame.set_pixels_per_meter(0.0).is_err());
        assert_eq!(frame.pixels_per_meter, 100.0);
    }

    #[test]
    fn test_clamp() {
        let frame = MapFrame::new(675.0, 878.0, 100.0).unwrap();
        assert_eq!(frame.clamp(MapPoint::new(-5.0, 900.0)), MapPoint::new(0.0, 878.0));
        assert_eq!(frame.clamp(MapPoint::new(10.0, 20.0)), MapPoint::new(10.0, 20.0));
        assert!(frame.contains(&MapPoint::new(675.0, 0.0)));
        assert!(!frame.contains(&MapPoint::new(675.1, 0.0)));
    }

    #[test]
    fn test_map_to_world_points_up() {
        let frame = MapFrame::new(675.0, 878.0, 80.0).unwrap();
        let origin = MapPoint::new(100.0, 200.0);
        let w = frame.map_to_world(MapPoint::new(180.0, 120.0), origin);
        assert_relative_eq!(w.x, 1.0);
        assert_relative_eq!(w.y, 1.0);
        let d = frame.displacement_to_pixels(Vector2::new(w.x, w.y));
        assert_eq!(origin.offset(d), MapPoint::new(180.0, 120.0));
    }
}
