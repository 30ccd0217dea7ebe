//! Map <-> screen coordinate transforms
//!
//! Two stages: a fit-to-viewport stage in map space (uniform scale plus a
//! centring offset) and an optional pan/zoom stage in screen space. Every
//! function here is pure and has an exact inverse.

use crate::common::MapPoint;
use crate::error::{FusionError, Result};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f64 = 0.6;
pub const MAX_ZOOM: f64 = 3.0;

/// A position in screen pixels (origin top-left, +y down)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        ScreenPoint { x, y }
    }
}

/// `screen = offset + p * scale`
pub fn map_to_screen(p: MapPoint, scale: f64, offset: ScreenPoint) -> ScreenPoint {
    ScreenPoint::new(offset.x + p.x * scale, offset.y + p.y * scale)
}

/// Exact inverse of [`map_to_screen`]
pub fn screen_to_map(s: ScreenPoint, scale: f64, offset: ScreenPoint) -> MapPoint {
    MapPoint::new((s.x - offset.x) / scale, (s.y - offset.y) / scale)
}

/// Uniform scale and centring offset that fit the whole map in a viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportFit {
    pub scale: f64,
    pub offset: ScreenPoint,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl ViewportFit {
    pub fn fit(viewport_width: f64, viewport_height: f64, map_width: f64, map_height: f64) -> Result<Self> {
        let dims = [viewport_width, viewport_height, map_width, map_height];
        if !dims.iter().all(|d| d.is_finite() && *d > 0.0) {
            return Err(FusionError::Config(format!(
                "cannot fit a {}x{} map into a {}x{} viewport",
                map_width, map_height, viewport_width, viewport_height
            )));
        }
        let scale = (viewport_width / map_width).min(viewport_height / map_height);
        let offset = ScreenPoint::new(
            (viewport_width - map_width * scale) / 2.0,
            (viewport_height - map_height * scale) / 2.0,
        );
        Ok(ViewportFit {
            scale,
            offset,
            viewport_width,
            viewport_height,
        })
    }

    pub fn map_to_screen(&self, p: MapPoint) -> ScreenPoint {
        map_to_screen(p, self.scale, self.offset)
    }

    pub fn screen_to_map(&self, s: ScreenPoint) -> MapPoint {
        screen_to_map(s, self.scale, self.offset)
    }
}

/// Screen-space pan and zoom applied after the fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanZoom {
    pub pan: ScreenPoint,
    zoom: f64,
}

impl Default for PanZoom {
    fn default() -> Self {
        PanZoom {
            pan: ScreenPoint::default(),
            zoom: 1.0,
        }
    }
}

impl PanZoom {
    pub fn new(pan: ScreenPoint, zoom: f64) -> Self {
        PanZoom {
            pan,
            zoom: clamp_zoom(zoom),
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = clamp_zoom(zoom);
    }

    /// `display = base * zoom + pan`
    pub fn apply(&self, s: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new(s.x * self.zoom + self.pan.x, s.y * self.zoom + self.pan.y)
    }

    /// `base = (display - pan) / zoom`
    pub fn invert(&self, s: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new((s.x - self.pan.x) / self.zoom, (s.y - self.pan.y) / self.zoom)
    }
}

fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_finite() {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}

/// Full map -> display transform: fit, then pan/zoom
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub fit: ViewportFit,
    pub pan_zoom: PanZoom,
}

impl ViewTransform {
    pub fn new(fit: ViewportFit) -> Self {
        ViewTransform {
            fit,
            pan_zoom: PanZoom::default(),
        }
    }

    pub fn with_pan_zoom(mut self, pan_zoom: PanZoom) -> Self {
        self.pan_zoom = pan_zoom;
        self
    }

    /// Map pixels per display pixel after zoom
    pub fn scale(&self) -> f64 {
        self.fit.scale * self.pan_zoom.zoom()
    }

    pub fn map_to_screen(&self, p: MapPoint) -> ScreenPoint {
        self.pan_zoom.apply(self.fit.map_to_screen(p))
    }

    pub fn screen_to_map(&self, s: ScreenPoint) -> MapPoint {
        self.fit.screen_to_map(self.pan_zoom.invert(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_centres_map() {
        let fit = ViewportFit::fit(400.0, 800.0, 675.0, 878.0).unwrap();
        assert_relative_eq!(fit.scale, 400.0 / 675.0);
        assert_relative_eq!(fit.offset.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(fit.offset.y, (800.0 - 878.0 * fit.scale) / 2.0);

        let corner = fit.map_to_screen(MapPoint::new(675.0, 878.0));
        assert_relative_eq!(corner.x, 400.0, epsilon = 1e-9);
        assert_relative_eq!(corner.y, 800.0 - fit.offset.y, epsilon = 1e-9);

        assert!(ViewportFit::fit(0.0, 800.0, 675.0, 878.0).is_err());
    }

    #[test]
    fn test_round_trip() {
        let fit = ViewportFit::fit(390.0, 422.0, 675.0, 878.0).unwrap();
        let view = ViewTransform::new(fit).with_pan_zoom(PanZoom::new(ScreenPoint::new(-37.5, 12.25), 2.3));
        for &(x, y) in &[(0.0, 0.0), (675.0, 878.0), (123.456, 789.012), (337.5, 0.001)] {
            let p = MapPoint::new(x, y);
            let back = view.screen_to_map(view.map_to_screen(p));
            assert!((back.x - p.x).abs() < 1e-6);
            assert!((back.y - p.y).abs() < 1e-6);

            let raw = screen_to_map(map_to_screen(p, 0.57, ScreenPoint::new(3.0, 9.0)), 0.57, ScreenPoint::new(3.0, 9.0));
            assert!((raw.x - p.x).abs() < 1e-6 && (raw.y - p.y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zoom_clamped() {
        let mut pz = PanZoom::new(ScreenPoint::default(), 10.0);
        assert_eq!(pz.zoom(), MAX_ZOOM);
        pz.set_zoom(0.1);
        assert_eq!(pz.zoom(), MIN_ZOOM);
        pz.set_zoom(f64::NAN);
        assert_eq!(pz.zoom(), 1.0);
    }

    #[test]
    fn test_pan_zoom_is_screen_space() {
        let fit = ViewportFit::fit(100.0, 100.0, 100.0, 100.0).unwrap();
        let view = ViewTransform::new(fit).with_pan_zoom(PanZoom::new(ScreenPoint::new(10.0, -5.0), 2.0));
        assert_eq!(view.map_to_screen(MapPoint::new(20.0, 20.0)), ScreenPoint::new(50.0, 35.0));
        assert_eq!(view.scale(), 2.0);
    }
}
