//! Localization: the absolute origin fix and the camera-space anchor

use crate::common::{CameraPose, MapPoint};
use crate::error::{FusionError, Result};
use serde::Deserialize;
use std::future::Future;
use std::sync::Mutex;

/// The one absolute reading from the localization service.
///
/// Heading convention: 0° = +X, clockwise-positive with +y down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OriginFix {
    pub position: MapPoint,
    pub heading_deg: f64,
    pub z: Option<f64>,
}

impl OriginFix {
    /// Create a fix, rejecting non-finite fields
    pub fn new(position: MapPoint, heading_deg: f64) -> Result<Self> {
        let fix = OriginFix {
            position,
            heading_deg,
            z: None,
        };
        fix.validate()?;
        Ok(fix)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.position.is_finite() {
            return Err(FusionError::NonFinite("origin fix position"));
        }
        if !self.heading_deg.is_finite() {
            return Err(FusionError::NonFinite("origin fix heading"));
        }
        if matches!(self.z, Some(z) if !z.is_finite()) {
            return Err(FusionError::NonFinite("origin fix z"));
        }
        Ok(())
    }
}

/// Wire body of the localization endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LocalizationResponse {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: Option<f64>,
    #[serde(default)]
    pub heading_deg: Option<f64>,
}

impl TryFrom<LocalizationResponse> for OriginFix {
    type Error = FusionError;

    fn try_from(r: LocalizationResponse) -> Result<Self> {
        let fix = OriginFix {
            position: MapPoint::new(r.x, r.y),
            heading_deg: r.heading_deg.unwrap_or(0.0),
            z: r.z,
        };
        fix.validate()?;
        Ok(fix)
    }
}

/// Decode a localization response body; `null` means no fix is stored
pub fn parse_localization_body(body: &str) -> Result<Option<OriginFix>> {
    let response: Option<LocalizationResponse> = serde_json::from_str(body)?;
    response.map(OriginFix::try_from).transpose()
}

/// Source of origin fixes
pub trait LocalizationService: Send + Sync {
    /// Fetch the latest fix; `Ok(None)` when the service has none
    fn fetch_origin(&self) -> impl Future<Output = Result<Option<OriginFix>>> + Send;
}

/// Localization service answering with a fix held in memory.
///
/// Used for replays and by hosts that obtain the fix themselves.
#[derive(Debug, Default)]
pub struct StaticLocalization {
    fix: Mutex<Option<OriginFix>>,
}

impl StaticLocalization {
    pub fn new(fix: Option<OriginFix>) -> Self {
        StaticLocalization {
            fix: Mutex::new(fix),
        }
    }

    /// Replace the fix served by later fetches
    pub fn replace(&self, fix: Option<OriginFix>) -> Result<()> {
        let mut guard = self
            .fix
            .lock()
            .map_err(|_| FusionError::collaborator("localization", "fix lock poisoned"))?;
        *guard = fix;
        Ok(())
    }
}

impl LocalizationService for StaticLocalization {
    async fn fetch_origin(&self) -> Result<Option<OriginFix>> {
        let guard = self
            .fix
            .lock()
            .map_err(|_| FusionError::collaborator("localization", "fix lock poisoned"))?;
        Ok(*guard)
    }
}

/// Camera-space zero reference for motion integration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub camera_pose: CameraPose,
    /// Yaw of the active heading source when the anchor was captured
    pub yaw_deg: f64,
    /// Map position the anchor pose corresponds to
    pub map_position: MapPoint,
}

/// Anchor manager state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorState {
    #[default]
    NoOrigin,
    OriginSet,
    Anchored,
}

/// Owns the origin fix and the anchor
#[derive(Debug, Clone, Default)]
pub struct AnchorManager {
    origin: Option<OriginFix>,
    anchor: Option<Anchor>,
}

impl AnchorManager {
    pub fn new() -> Self {
        AnchorManager::default()
    }

    pub fn state(&self) -> AnchorState {
        match (&self.origin, &self.anchor) {
            (None, _) => AnchorState::NoOrigin,
            (Some(_), None) => AnchorState::OriginSet,
            (Some(_), Some(_)) => AnchorState::Anchored,
        }
    }

    pub fn origin(&self) -> Option<&OriginFix> {
        self.origin.as_ref()
    }

    pub fn anchor(&self) -> Option<&Anchor> {
        self.anchor.as_ref()
    }

    /// Replace the origin fix wholesale and drop the anchor
    pub fn set_origin(&mut self, fix: OriginFix) {
        log::info!(
            "Origin fix at ({:.1}, {:.1}) heading {:.1}",
            fix.position.x,
            fix.position.y,
            fix.heading_deg
        );
        self.origin = Some(fix);
        self.anchor = None;
    }

    /// Capture the anchor; ignored without an origin
    pub fn capture(&mut self, camera_pose: CameraPose, yaw_deg: f64, map_position: MapPoint) -> bool {
        if self.origin.is_none() {
            return false;
        }
        log::debug!(
            "Anchor captured at camera ({:.3}, {:.3}) yaw {:.1} -> map ({:.1}, {:.1})",
            camera_pose.position.x,
            camera_pose.position.z,
            yaw_deg,
            map_position.x,
            map_position.y
        );
        self.anchor = Some(Anchor {
            camera_pose,
            yaw_deg,
            map_position,
        });
        true
    }

    /// Forget the anchor; the next sample captures a new one
    pub fn invalidate_anchor(&mut self) {
        if self.anchor.take().is_some() {
            log::debug!("Anchor invalidated");
        }
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.origin = None;
        self.anchor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn pose(x: f64, z: f64, yaw: f64) -> CameraPose {
        CameraPose::new(Vector3::new(x, 0.0, z), yaw)
    }

    #[test]
    fn test_state_machine() {
        let mut m = AnchorManager::new();
        assert_eq!(m.state(), AnchorState::NoOrigin);
        assert!(!m.capture(pose(0.0, 0.0, 0.0), 0.0, MapPoint::default()));
        assert_eq!(m.state(), AnchorState::NoOrigin);

        let fix = OriginFix::new(MapPoint::new(10.0, 20.0), 45.0).unwrap();
        m.set_origin(fix);
        assert_eq!(m.state(), AnchorState::OriginSet);

        assert!(m.capture(pose(1.0, 2.0, 30.0), 30.0, fix.position));
        assert_eq!(m.state(), AnchorState::Anchored);
        assert_eq!(m.anchor().unwrap().map_position, fix.position);

        m.set_origin(OriginFix::new(MapPoint::new(0.0, 0.0), 0.0).unwrap());
        assert_eq!(m.state(), AnchorState::OriginSet);
    }

    #[test]
    fn test_fix_rejects_non_finite() {
        assert!(OriginFix::new(MapPoint::new(f64::NAN, 0.0), 0.0).is_err());
        assert!(OriginFix::new(MapPoint::new(0.0, 0.0), f64::INFINITY).is_err());
    }

    #[test]
    fn test_parse_localization_body() {
        let fix = parse_localization_body(r#"{"id": 3, "x": 120.5, "y": 300, "z": null, "heading_deg": 90}"#)
            .unwrap()
            .unwrap();
        assert_eq!(fix.position, MapPoint::new(120.5, 300.0));
        assert_eq!(fix.heading_deg, 90.0);
        assert_eq!(fix.z, None);

        let no_heading = parse_localization_body(r#"{"x": 1, "y": 2}"#).unwrap().unwrap();
        assert_eq!(no_heading.heading_deg, 0.0);

        assert!(parse_localization_body("null").unwrap().is_none());
        assert!(parse_localization_body(r#"{"x": "a"}"#).is_err());
    }

    #[tokio::test]
    async fn test_static_localization() {
        let service = StaticLocalization::new(None);
        assert!(service.fetch_origin().await.unwrap().is_none());

        let fix = OriginFix::new(MapPoint::new(5.0, 6.0), 180.0).unwrap();
        service.replace(Some(fix)).unwrap();
        assert_eq!(service.fetch_origin().await.unwrap(), Some(fix));
    }
}
