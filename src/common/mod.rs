//! Common types shared by the fusion engine, the route tracker and the overlay

pub mod angles;

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// A position in map pixel space (origin top-left, +x right, +y down)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
}

impl MapPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        MapPoint { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance_to(&self, other: &MapPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn to_vector(self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn offset(self, delta: Vector2<f64>) -> Self {
        MapPoint::new(self.x + delta.x, self.y + delta.y)
    }
}

/// A camera pose sample from the AR tracking session.
///
/// `position` is in metres in the AR world frame; y is vertical and ignored by
/// the 2D fusion. `yaw_deg` grows clockwise from the session's initial forward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vector3<f64>,
    pub yaw_deg: f64,
}

impl CameraPose {
    pub fn new(position: Vector3<f64>, yaw_deg: f64) -> Self {
        CameraPose { position, yaw_deg }
    }

    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite()) && self.yaw_deg.is_finite()
    }
}

/// Output of the fusion engine: where the user is and which way they face,
/// both in the map frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedState {
    pub user_position: MapPoint,
    pub heading_deg: f64,
}
