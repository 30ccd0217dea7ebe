//! 2D overlay composition
//!
//! Turns the fused state and the route into a display list in screen space.
//! Drawing the list is left to the host (or to [`super::svg`]).

use super::transform::{ScreenPoint, ViewTransform};
use crate::common::angles::{map_heading_to_screen, normalize_deg};
use crate::common::{FusedState, MapPoint};
use serde::Deserialize;

/// Default heading arrow length in screen pixels
pub const ARROW_SIZE: f64 = 24.0;

/// Axis-aligned screen rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Triangle pointing along a screen heading (0° = up, clockwise)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingArrow {
    pub tip: ScreenPoint,
    pub left: ScreenPoint,
    pub right: ScreenPoint,
}

impl HeadingArrow {
    pub fn new(center: ScreenPoint, screen_heading_deg: f64, size: f64) -> Self {
        let angle = screen_heading_deg.to_radians();
        let back = size * 0.6;
        let half_width = size * 0.4;
        // Screen up is -y
        let (dx, dy) = (angle.sin(), -angle.cos());
        let (px, py) = (dy, -dx);
        let base = ScreenPoint::new(center.x - dx * back, center.y - dy * back);
        HeadingArrow {
            tip: ScreenPoint::new(center.x + dx * size, center.y + dy * size),
            left: ScreenPoint::new(base.x + px * half_width, base.y + py * half_width),
            right: ScreenPoint::new(base.x - px * half_width, base.y - py * half_width),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserMarker {
    pub position: ScreenPoint,
    /// Heading in the map convention
    pub heading_deg: f64,
    pub arrow: HeadingArrow,
    pub label: String,
}

/// Store area drawn on the floor plan
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub polygon: Vec<MapPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryLabel {
    pub name: String,
    pub position: ScreenPoint,
}

/// Area centroid of a simple polygon; mean of the vertices when the area
/// is degenerate. `None` for an empty polygon.
pub fn polygon_centroid(points: &[MapPoint]) -> Option<MapPoint> {
    if points.is_empty() {
        return None;
    }
    let mut area = 0.0;
    let (mut cx, mut cy) = (0.0, 0.0);
    let mut j = points.len() - 1;
    for (i, p1) in points.iter().enumerate() {
        let p0 = &points[j];
        let cross = p0.x * p1.y - p1.x * p0.y;
        area += cross;
        cx += (p0.x + p1.x) * cross;
        cy += (p0.y + p1.y) * cross;
        j = i;
    }
    if area.abs() < 1e-5 {
        let n = points.len() as f64;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        return Some(MapPoint::new(sx / n, sy / n));
    }
    // cx / (6 * A) with A = area / 2
    Some(MapPoint::new(cx / (3.0 * area), cy / (3.0 * area)))
}

/// One composed overlay frame
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFrame {
    pub viewport_width: f64,
    pub viewport_height: f64,
    /// Where the floor image is drawn
    pub map_rect: ScreenRect,
    /// Rotation of the map layer about the user marker, degrees clockwise
    pub map_rotation_deg: f64,
    pub route: Vec<ScreenPoint>,
    pub user: Option<UserMarker>,
    pub labels: Vec<CategoryLabel>,
}

/// Composes overlay frames for a fitted map
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    view: ViewTransform,
    map_width: f64,
    map_height: f64,
    rotate_map: bool,
    heading_invert: bool,
    arrow_size: f64,
    categories: Vec<Category>,
}

impl OverlayRenderer {
    pub fn new(view: ViewTransform, map_width: f64, map_height: f64) -> Self {
        OverlayRenderer {
            view,
            map_width,
            map_height,
            rotate_map: false,
            heading_invert: false,
            arrow_size: ARROW_SIZE,
            categories: Vec::new(),
        }
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    /// Rotate the map under a fixed, upward arrow instead of turning the arrow
    pub fn set_rotate_map(&mut self, rotate_map: bool) {
        self.rotate_map = rotate_map;
    }

    /// Turn the arrow and the rotated map the opposite way
    pub fn set_heading_invert(&mut self, heading_invert: bool) {
        self.heading_invert = heading_invert;
    }

    pub fn set_arrow_size(&mut self, size: f64) {
        self.arrow_size = size;
    }

    pub fn set_categories(&mut self, categories: Vec<Category>) {
        self.categories = categories;
    }

    fn screen_heading(&self, heading_deg: f64) -> f64 {
        let screen = map_heading_to_screen(heading_deg);
        if self.heading_invert {
            normalize_deg(-screen)
        } else {
            screen
        }
    }

    pub fn render(&self, fused: Option<&FusedState>, route: &[MapPoint]) -> OverlayFrame {
        let origin = self.view.map_to_screen(MapPoint::new(0.0, 0.0));
        let scale = self.view.scale();

        let user = fused.map(|state| {
            let position = self.view.map_to_screen(state.user_position);
            let screen_heading = self.screen_heading(state.heading_deg);
            let arrow_heading = if self.rotate_map { 0.0 } else { screen_heading };
            UserMarker {
                position,
                heading_deg: state.heading_deg,
                arrow: HeadingArrow::new(position, arrow_heading, self.arrow_size),
                label: format!("{:.0}°", state.heading_deg),
            }
        });
        let map_rotation_deg = match fused {
            Some(state) if self.rotate_map => -self.screen_heading(state.heading_deg),
            _ => 0.0,
        };

        let labels = self
            .categories
            .iter()
            .filter_map(|c| {
                polygon_centroid(&c.polygon).map(|centroid| CategoryLabel {
                    name: c.name.clone(),
                    position: self.view.map_to_screen(centroid),
                })
            })
            .collect();

        OverlayFrame {
            viewport_width: self.view.fit.viewport_width,
            viewport_height: self.view.fit.viewport_height,
            map_rect: ScreenRect {
                x: origin.x,
                y: origin.y,
                width: self.map_width * scale,
                height: self.map_height * scale,
            },
            map_rotation_deg,
            route: route.iter().map(|&p| self.view.map_to_screen(p)).collect(),
            user,
            labels,
        }
    }
}
