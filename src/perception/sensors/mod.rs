//! Sensor intake: AR camera transforms, magnetometer readings and tracking
//! state notifications

use crate::common::angles::normalize_deg;
use crate::common::CameraPose;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Host platform of the AR session.
///
/// The only platform-dependent convention is the sense of the map rotation
/// applied to camera displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Android,
    #[default]
    Ios,
}

impl Platform {
    /// Sign applied to the displacement rotation angle
    pub fn rotation_sign(self) -> f64 {
        match self {
            Platform::Android => -1.0,
            Platform::Ios => 1.0,
        }
    }
}

/// Yaw in degrees from a camera forward vector.
///
/// Both platforms report -Z as forward, so yaw grows clockwise seen from
/// above.
pub fn yaw_from_forward(forward: Vector3<f64>) -> f64 {
    forward.x.atan2(-forward.z).to_degrees()
}

/// Camera transform as delivered by the AR SDK callback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraTransform {
    pub position: [f64; 3],
    #[serde(default)]
    pub forward: Option<[f64; 3]>,
    /// Euler rotation in degrees, used only without a forward vector
    #[serde(default)]
    pub rotation: Option<[f64; 3]>,
}

impl CameraTransform {
    /// Convert to a pose sample, yaw from the forward vector when present.
    ///
    /// Returns `None` when any used field is non-finite.
    pub fn to_pose(&self) -> Option<CameraPose> {
        let yaw = match (self.forward, self.rotation) {
            (Some(f), _) => yaw_from_forward(Vector3::new(f[0], f[1], f[2])),
            (None, Some(r)) => r[1],
            (None, None) => 0.0,
        };
        let p = self.position;
        let pose = CameraPose::new(Vector3::new(p[0], p[1], p[2]), yaw);
        pose.is_finite().then_some(pose)
    }
}

/// Which yaw stream feeds heading fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingSource {
    #[default]
    DeviceYaw,
    Magnetometer,
}

/// Raw magnetometer reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnetometerReading {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl MagnetometerReading {
    /// Heading in `[0, 360)` for a device held flat in portrait
    pub fn heading_deg(&self) -> Option<f64> {
        if !(self.x.is_finite() && self.y.is_finite()) {
            return None;
        }
        Some(normalize_deg(self.y.atan2(self.x).to_degrees()))
    }
}

/// Magnetometer capability and latest heading
#[derive(Debug, Clone, Default)]
pub struct Magnetometer {
    available: bool,
    heading_deg: Option<f64>,
}

impl Magnetometer {
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
        if !available {
            self.heading_deg = None;
        }
    }

    /// Record a reading; returns false if it was rejected as non-finite.
    ///
    /// Readings arriving while the host reports the sensor unavailable are
    /// discarded.
    pub fn update(&mut self, reading: &MagnetometerReading) -> bool {
        match reading.heading_deg() {
            Some(deg) => {
                if self.available {
                    self.heading_deg = Some(deg);
                }
                true
            }
            None => false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn heading_deg(&self) -> Option<f64> {
        if self.available {
            self.heading_deg
        } else {
            None
        }
    }
}

const DEGRADED_MARKERS: [&str; 8] = [
    "limited",
    "relocal",
    "insufficient",
    "excessive",
    "unavailable",
    "not available",
    "paused",
    "stopped",
];

/// Result of feeding a tracking notification to the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingTransition {
    Unchanged,
    Degraded,
    Recovered,
}

/// Classifies AR tracking notifications as normal or degraded
#[derive(Debug, Clone)]
pub struct TrackingMonitor {
    ok: bool,
}

impl Default for TrackingMonitor {
    fn default() -> Self {
        TrackingMonitor { ok: true }
    }
}

impl TrackingMonitor {
    pub fn is_tracking(&self) -> bool {
        self.ok
    }

    pub fn update(&mut self, state: &str, reason: &str) -> TrackingTransition {
        let text = format!("{} {}", state, reason).to_lowercase();
        let ok = !DEGRADED_MARKERS.iter().any(|m| text.contains(m));
        let transition = match (self.ok, ok) {
            (true, false) => TrackingTransition::Degraded,
            (false, true) => TrackingTransition::Recovered,
            _ => TrackingTransition::Unchanged,
        };
        self.ok = ok;
        transition
    }

    pub fn reset(&mut self) {
        self.ok = true;
    }
}
