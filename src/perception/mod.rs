//! Perception: turns one absolute origin fix plus relative AR camera motion
//! into a user position and heading on the floor plan
pub mod filters;
pub mod fusion;
pub mod localization;
pub mod motion;
pub mod sensors;

use self::filters::{Filter, PositionSmoother, YawSmoother};
use self::fusion::HeadingFusion;
use self::localization::{AnchorManager, AnchorState, OriginFix};
use self::motion::MotionIntegrator;
use self::sensors::{
    CameraTransform, HeadingSource, Magnetometer, MagnetometerReading, TrackingMonitor,
    TrackingTransition,
};
use crate::common::angles::normalize_deg;
use crate::common::{CameraPose, FusedState, MapPoint};
use crate::config::FusionConfig;
use crate::error::{FusionError, Result};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::navigation::map_frame::MapFrame;
use nalgebra::Vector3;
use std::collections::HashMap;

/// Single-writer owner of the origin fix, the anchor and the fused state
#[derive(Debug, Clone)]
pub struct FusionEngine {
    base: LifecycleNodeBase,
    config: FusionConfig,
    frame: MapFrame,
    anchors: AnchorManager,
    heading: HeadingFusion,
    integrator: MotionIntegrator,
    yaw_filter: YawSmoother,
    position_filter: PositionSmoother,
    tracking: TrackingMonitor,
    magnetometer: Magnetometer,
    selected_source: HeadingSource,
    active_source: HeadingSource,
    last_pose: Option<CameraPose>,
    /// Last yaw read from the active heading source
    source_yaw_deg: Option<f64>,
    user_position: Option<MapPoint>,
    heading_deg: Option<f64>,
}

impl FusionEngine {
    /// Create an active engine from a validated configuration
    pub fn new(config: FusionConfig) -> Result<Self> {
        config.validate()?;
        let frame = MapFrame::from_config(&config.map)?;
        let params = &config.fusion;
        Ok(FusionEngine {
            base: LifecycleNodeBase::new("fusion_engine", State::Active),
            frame,
            anchors: AnchorManager::new(),
            heading: HeadingFusion::new(params.yaw_only),
            integrator: MotionIntegrator::new(params.platform, params.rotate_with_current_yaw),
            yaw_filter: YawSmoother::new(params.yaw_smoothing),
            position_filter: PositionSmoother::new(params.position_smoothing),
            tracking: TrackingMonitor::default(),
            magnetometer: Magnetometer::default(),
            selected_source: params.heading_source,
            active_source: HeadingSource::DeviceYaw,
            last_pose: None,
            source_yaw_deg: None,
            user_position: None,
            heading_deg: None,
            config,
        })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn frame(&self) -> &MapFrame {
        &self.frame
    }

    pub fn anchor_state(&self) -> AnchorState {
        self.anchors.state()
    }

    pub fn anchors(&self) -> &AnchorManager {
        &self.anchors
    }

    pub fn origin(&self) -> Option<&OriginFix> {
        self.anchors.origin()
    }

    /// Current user position; `None` until an origin fix arrives
    pub fn user_position(&self) -> Option<MapPoint> {
        self.user_position
    }

    /// Heading shown to the user, map convention (0° = +X, clockwise)
    pub fn heading_deg(&self) -> Option<f64> {
        self.heading_deg
    }

    pub fn fused_state(&self) -> Option<FusedState> {
        Some(FusedState {
            user_position: self.user_position?,
            heading_deg: self.heading_deg?,
        })
    }

    pub fn base_heading(&self) -> f64 {
        self.heading.base_heading()
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.is_tracking()
    }

    pub fn selected_heading_source(&self) -> HeadingSource {
        self.selected_source
    }

    /// Source actually feeding the heading; device yaw whenever the
    /// magnetometer is unusable
    pub fn active_heading_source(&self) -> HeadingSource {
        self.active_source
    }

    pub fn magnetometer_available(&self) -> bool {
        self.magnetometer.is_available()
    }

    /// Store a new origin fix, replacing any previous one.
    ///
    /// The user jumps to the fix position. An anchored engine re-captures its
    /// anchor from the latest pose at once; otherwise the next pose sample
    /// anchors.
    pub fn on_origin_fix(&mut self, fix: OriginFix) -> Result<()> {
        if self.base.get_state() == State::Unconfigured {
            return Err(FusionError::Lifecycle(
                "origin fix received while unconfigured".to_string(),
            ));
        }
        fix.validate()?;

        let was_anchored = self.anchors.state() == AnchorState::Anchored;
        self.anchors.set_origin(fix);
        self.heading.set_base_heading(fix.heading_deg);
        self.user_position = Some(fix.position);
        self.position_filter.reset_to(fix.position);
        self.heading_deg = Some(if self.heading.yaw_only() {
            0.0
        } else {
            normalize_deg(fix.heading_deg)
        });

        if was_anchored {
            if let Some(pose) = self.last_pose {
                let yaw = self.source_yaw(&pose);
                self.anchors.capture(pose, yaw, fix.position);
                self.refresh_heading(yaw);
            }
        }
        Ok(())
    }

    /// Convert and process a raw AR camera transform
    pub fn on_camera_transform(&mut self, transform: &CameraTransform) -> Option<FusedState> {
        match transform.to_pose() {
            Some(pose) => self.on_camera_pose(pose),
            None => {
                log::warn!("Rejected non-finite camera transform");
                None
            }
        }
    }

    /// Process one camera pose sample.
    ///
    /// Returns the fused state when the sample updated it; `None` when the
    /// sample was dropped (inactive, degraded tracking, non-finite input) or
    /// no origin is known yet.
    pub fn on_camera_pose(&mut self, pose: CameraPose) -> Option<FusedState> {
        if !self.base.is_active() {
            log::trace!("Dropping pose sample while {:?}", self.base.get_state());
            return None;
        }
        if !pose.is_finite() {
            log::warn!("Rejected non-finite camera pose");
            return None;
        }
        if !self.tracking.is_tracking() {
            log::trace!("Dropping pose sample during degraded tracking");
            return None;
        }

        let pose = CameraPose {
            yaw_deg: self.yaw_filter.filter(pose.yaw_deg),
            ..pose
        };
        self.last_pose = Some(pose);
        self.sync_heading_source();

        let origin_position = self.anchors.origin()?.position;
        let yaw = self.source_yaw(&pose);

        if self.anchors.anchor().is_none() {
            let map_position = self.user_position.unwrap_or(origin_position);
            self.anchors.capture(pose, yaw, map_position);
            self.position_filter.reset_to(map_position);
            self.user_position = Some(map_position);
        }
        let anchor = *self.anchors.anchor()?;

        let theta = self.integrator.rotation_angle(
            self.heading.base_heading(),
            anchor.camera_pose.yaw_deg,
            pose.yaw_deg,
        );
        let displacement = self
            .integrator
            .displacement(&self.frame, &anchor, &pose, theta);

        let params = &self.config.fusion;
        if displacement.within_deadzone(params.deadzone_m, params.deadzone_px) {
            log::trace!("Displacement inside dead-zone, position kept");
        } else if let Some(target) = self.integrator.position(&self.frame, &anchor, &displacement) {
            let position = self.frame.clamp(self.position_filter.filter(target));
            log::trace!(
                "Pose ({:.3}, {:.3}) -> map ({:.1}, {:.1})",
                pose.position.x,
                pose.position.z,
                position.x,
                position.y
            );
            self.user_position = Some(position);
        } else {
            log::warn!("Non-finite displacement, position kept");
        }

        self.refresh_heading(yaw);
        self.fused_state()
    }

    /// Record a magnetometer reading.
    ///
    /// Returns the fused state when the reading changed the displayed heading.
    pub fn on_magnetometer(&mut self, reading: &MagnetometerReading) -> Option<FusedState> {
        if !self.magnetometer.update(reading) {
            log::warn!("Rejected non-finite magnetometer reading");
            return None;
        }
        self.sync_heading_source();
        if self.active_source != HeadingSource::Magnetometer || !self.base.is_active() {
            return None;
        }
        let yaw = self.magnetometer.heading_deg()?;
        self.anchors.anchor()?;
        self.refresh_heading(yaw);
        self.fused_state()
    }

    /// Magnetometer capability reported by the host
    pub fn set_magnetometer_available(&mut self, available: bool) {
        if self.magnetometer.is_available() != available {
            log::info!("Magnetometer available: {}", available);
        }
        self.magnetometer.set_available(available);
        self.sync_heading_source();
    }

    /// Feed an AR tracking-state notification
    pub fn on_tracking_state(&mut self, state: &str, reason: &str) -> TrackingTransition {
        let transition = self.tracking.update(state, reason);
        match transition {
            TrackingTransition::Degraded => {
                log::warn!("AR tracking degraded: {} {}", state, reason);
            }
            TrackingTransition::Recovered => {
                log::info!("AR tracking recovered");
                if self.config.fusion.reanchor_on_tracking_recovery {
                    // The session may have relocalized: the old anchor pose no
                    // longer shares a frame with new samples.
                    self.anchors.invalidate_anchor();
                    self.last_pose = None;
                    self.yaw_filter.reset();
                }
            }
            TrackingTransition::Unchanged => {}
        }
        transition
    }

    /// Re-capture the anchor from the current pose at the current user
    /// position, keeping the origin heading.
    ///
    /// Without a pose sample yet the anchor is dropped and the next sample
    /// captures it. Returns false when there is no origin.
    pub fn reset_anchor(&mut self) -> bool {
        if self.anchors.origin().is_none() {
            return false;
        }
        match (self.last_pose, self.user_position) {
            (Some(pose), Some(position)) => {
                let yaw = self.source_yaw(&pose);
                self.anchors.capture(pose, yaw, position);
                self.position_filter.reset_to(position);
                self.refresh_heading(yaw);
            }
            _ => self.anchors.invalidate_anchor(),
        }
        log::info!("Anchor reset");
        true
    }

    /// Fold the yaw drift into the base heading so the current heading
    /// becomes the new reference. Returns false when not anchored.
    pub fn set_base_now(&mut self) -> bool {
        let (Some(anchor), Some(pose), Some(position)) =
            (self.anchors.anchor().copied(), self.last_pose, self.user_position)
        else {
            return false;
        };
        let yaw = self.source_yaw(&pose);
        let anchor_yaw = self.heading.set_base_now(anchor.yaw_deg, yaw);
        self.anchors.capture(pose, anchor_yaw, position);
        self.position_filter.reset_to(position);
        self.refresh_heading(yaw);
        log::info!("Base heading set to {:.1}", self.heading.base_heading());
        true
    }

    pub fn select_heading_source(&mut self, source: HeadingSource) {
        self.selected_source = source;
        self.sync_heading_source();
    }

    pub fn set_yaw_only(&mut self, yaw_only: bool) {
        self.heading.set_yaw_only(yaw_only);
        if let Some(yaw) = self.source_yaw_deg {
            self.refresh_heading(yaw);
        }
    }

    pub fn set_rotate_with_current_yaw(&mut self, enabled: bool) {
        self.integrator.set_rotate_with_current_yaw(enabled);
        self.config.fusion.rotate_with_current_yaw = enabled;
    }

    /// Runtime tuning of numeric parameters.
    ///
    /// Known keys: `pixels_per_meter`, `yaw_smoothing`, `position_smoothing`,
    /// `deadzone_m`, `deadzone_px`. Nothing changes if any value is invalid.
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        let mut next = self.config.clone();
        for (key, &value) in params {
            match key.as_str() {
                "pixels_per_meter" => next.map.pixels_per_meter = value,
                "yaw_smoothing" => next.fusion.yaw_smoothing = value,
                "position_smoothing" => next.fusion.position_smoothing = value,
                "deadzone_m" => next.fusion.deadzone_m = value,
                "deadzone_px" => next.fusion.deadzone_px = value,
                other => log::debug!("Ignoring unknown parameter {}", other),
            }
        }
        next.validate()?;

        self.frame.set_pixels_per_meter(next.map.pixels_per_meter)?;
        self.yaw_filter.set_alpha(next.fusion.yaw_smoothing);
        self.position_filter.set_beta(next.fusion.position_smoothing);
        self.config = next;
        Ok(())
    }

    /// AR world positions for a map-space route, for anchor placement by
    /// the AR renderer. `None` until anchored.
    pub fn route_to_world(&self, route: &[MapPoint]) -> Option<Vec<Vector3<f64>>> {
        let anchor = self.anchors.anchor()?;
        let current_yaw = self
            .last_pose
            .map(|p| p.yaw_deg)
            .unwrap_or(anchor.camera_pose.yaw_deg);
        let theta = self.integrator.rotation_angle(
            self.heading.base_heading(),
            anchor.camera_pose.yaw_deg,
            current_yaw,
        );
        let offset = self.config.fusion.route_y_offset_m;
        Some(
            route
                .iter()
                .map(|&p| {
                    self.integrator
                        .map_to_camera_world(&self.frame, anchor, p, theta, offset)
                })
                .collect(),
        )
    }

    /// Yaw of the active heading source for a pose sample
    fn source_yaw(&self, pose: &CameraPose) -> f64 {
        match self.active_source {
            HeadingSource::DeviceYaw => pose.yaw_deg,
            HeadingSource::Magnetometer => self.magnetometer.heading_deg().unwrap_or(pose.yaw_deg),
        }
    }

    fn refresh_heading(&mut self, yaw: f64) {
        if let Some(anchor) = self.anchors.anchor() {
            self.heading_deg = Some(self.heading.display_heading(anchor.yaw_deg, yaw));
        }
        self.source_yaw_deg = Some(yaw);
    }

    fn sync_heading_source(&mut self) {
        let wanted = match self.selected_source {
            HeadingSource::Magnetometer if self.magnetometer.heading_deg().is_some() => {
                HeadingSource::Magnetometer
            }
            _ => HeadingSource::DeviceYaw,
        };
        if wanted != self.active_source {
            self.switch_heading_source(wanted);
        }
    }

    /// Change the active source while keeping heading and position
    /// continuous: the old drift is folded into the base and the anchor
    /// re-captured with the new source's yaw.
    fn switch_heading_source(&mut self, next: HeadingSource) {
        log::info!("Heading source {:?} -> {:?}", self.active_source, next);
        let rebase = (
            self.anchors.anchor().copied(),
            self.last_pose,
            self.user_position,
            self.source_yaw_deg,
        );
        self.active_source = next;

        match rebase {
            (Some(anchor), Some(pose), Some(position), Some(old_yaw)) => {
                self.heading.set_base_now(anchor.yaw_deg, old_yaw);
                let yaw = self.source_yaw(&pose);
                self.anchors.capture(pose, yaw, position);
                self.position_filter.reset_to(position);
                self.refresh_heading(yaw);
            }
            // Anchor yaw would be in the old source's frame
            (Some(_), ..) => self.anchors.invalidate_anchor(),
            _ => self.source_yaw_deg = None,
        }
    }

    fn start_new_session(&mut self) {
        self.anchors.invalidate_anchor();
        self.last_pose = None;
        self.source_yaw_deg = None;
        self.yaw_filter.reset();
        self.tracking.reset();
    }
}

impl LifecycleNode for FusionEngine {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn on_configure(&mut self) -> Result<()> {
        if self.base.is_active() {
            return Err(FusionError::Lifecycle(
                "cannot configure an active fusion engine".to_string(),
            ));
        }
        self.config.validate()?;
        self.frame = MapFrame::from_config(&self.config.map)?;
        self.yaw_filter = YawSmoother::new(self.config.fusion.yaw_smoothing);
        self.position_filter = PositionSmoother::new(self.config.fusion.position_smoothing);
        log::info!("Configuring {}", self.base.name);
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        match self.base.get_state() {
            State::Unconfigured => Err(FusionError::Lifecycle(
                "fusion engine must be configured before activation".to_string(),
            )),
            State::Inactive => {
                // A resumed AR view runs a new tracking session
                self.start_new_session();
                log::info!("Activating {}", self.base.name);
                self.base.set_state(State::Active);
                Ok(())
            }
            State::Active => Ok(()),
        }
    }

    fn on_deactivate(&mut self) -> Result<()> {
        if self.base.is_active() {
            log::info!("Deactivating {}", self.base.name);
            self.base.set_state(State::Inactive);
        }
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        log::info!("Cleaning up {}", self.base.name);
        self.start_new_session();
        self.anchors.clear();
        self.magnetometer = Magnetometer::default();
        self.active_source = HeadingSource::DeviceYaw;
        self.user_position = None;
        self.heading_deg = None;
        self.base.set_state(State::Unconfigured);
        Ok(())
    }

    fn state(&self) -> State {
        self.base.get_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn engine() -> FusionEngine {
        let mut config = FusionConfig::default();
        config.map.pixels_per_meter = 80.0;
        FusionEngine::new(config).unwrap()
    }

    fn pose(x: f64, z: f64, yaw: f64) -> CameraPose {
        CameraPose::new(Vector3::new(x, 1.4, z), yaw)
    }

    fn fix(x: f64, y: f64, heading: f64) -> OriginFix {
        OriginFix::new(MapPoint::new(x, y), heading).unwrap()
    }

    #[test]
    fn test_no_origin_keeps_position_unset() {
        let mut e = engine();
        for i in 0..5 {
            assert!(e.on_camera_pose(pose(i as f64, 0.0, 10.0)).is_none());
        }
        assert!(e.user_position().is_none());
        assert_eq!(e.anchor_state(), AnchorState::NoOrigin);
    }

    #[test]
    fn test_first_sample_anchors_at_origin() {
        let mut e = engine();
        e.on_origin_fix(fix(100.0, 200.0, 0.0)).unwrap();
        assert_eq!(e.anchor_state(), AnchorState::OriginSet);

        let state = e.on_camera_pose(pose(0.5, -0.25, 0.0)).unwrap();
        assert_eq!(state.user_position, MapPoint::new(100.0, 200.0));
        assert_eq!(e.anchor_state(), AnchorState::Anchored);

        let state = e.on_camera_pose(pose(1.5, -0.25, 0.0)).unwrap();
        assert_eq!(state.user_position, MapPoint::new(180.0, 200.0));
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let mut e = engine();
        assert!(e.on_origin_fix(OriginFix {
            position: MapPoint::new(1.0, 1.0),
            heading_deg: f64::NAN,
            z: None,
        })
        .is_err());
        assert_eq!(e.anchor_state(), AnchorState::NoOrigin);

        e.on_origin_fix(fix(100.0, 200.0, 0.0)).unwrap();
        e.on_camera_pose(pose(0.0, 0.0, 0.0));
        assert!(e.on_camera_pose(pose(f64::INFINITY, 0.0, 0.0)).is_none());
        assert_eq!(e.user_position(), Some(MapPoint::new(100.0, 200.0)));
    }

    #[test]
    fn test_new_fix_while_anchored_recaptures() {
        let mut e = engine();
        e.on_origin_fix(fix(100.0, 200.0, 0.0)).unwrap();
        e.on_camera_pose(pose(0.0, 0.0, 0.0));
        e.on_camera_pose(pose(2.0, 0.0, 0.0));

        e.on_origin_fix(fix(300.0, 300.0, 90.0)).unwrap();
        assert_eq!(e.anchor_state(), AnchorState::Anchored);
        assert_eq!(e.anchors().anchor().unwrap().map_position, MapPoint::new(300.0, 300.0));
        assert_eq!(e.heading_deg(), Some(90.0));

        let state = e.on_camera_pose(pose(2.0, 0.0, 0.0)).unwrap();
        assert_eq!(state.user_position, MapPoint::new(300.0, 300.0));
    }

    #[test]
    fn test_degraded_tracking_drops_samples_and_reanchors() {
        let mut e = engine();
        e.on_origin_fix(fix(100.0, 200.0, 0.0)).unwrap();
        e.on_camera_pose(pose(0.0, 0.0, 0.0));
        e.on_camera_pose(pose(1.0, 0.0, 0.0));

        assert_eq!(e.on_tracking_state("LIMITED", "Relocalizing"), TrackingTransition::Degraded);
        assert!(e.on_camera_pose(pose(5.0, 0.0, 0.0)).is_none());
        assert_eq!(e.user_position(), Some(MapPoint::new(180.0, 200.0)));

        assert_eq!(e.on_tracking_state("NORMAL", ""), TrackingTransition::Recovered);
        assert_eq!(e.anchor_state(), AnchorState::OriginSet);
        // The relocalized session restarts its frame; position continues
        let state = e.on_camera_pose(pose(-3.0, 0.0, 0.0)).unwrap();
        assert_eq!(state.user_position, MapPoint::new(180.0, 200.0));
        let state = e.on_camera_pose(pose(-2.0, 0.0, 0.0)).unwrap();
        assert_eq!(state.user_position, MapPoint::new(260.0, 200.0));
    }

    #[test]
    fn test_pause_and_resume_starts_new_session() {
        let mut e = engine();
        e.on_origin_fix(fix(100.0, 200.0, 0.0)).unwrap();
        e.on_camera_pose(pose(0.0, 0.0, 0.0));
        e.on_camera_pose(pose(1.0, 0.0, 0.0));

        e.on_deactivate().unwrap();
        assert!(e.on_camera_pose(pose(4.0, 0.0, 0.0)).is_none());
        e.on_activate().unwrap();
        assert_eq!(e.anchor_state(), AnchorState::OriginSet);

        let state = e.on_camera_pose(pose(9.0, 0.0, 0.0)).unwrap();
        assert_eq!(state.user_position, MapPoint::new(180.0, 200.0));
    }

    #[test]
    fn test_cleanup_and_reconfigure() {
        let mut e = engine();
        e.on_origin_fix(fix(100.0, 200.0, 0.0)).unwrap();
        e.on_deactivate().unwrap();
        e.on_cleanup().unwrap();
        assert_eq!(e.state(), State::Unconfigured);
        assert!(e.user_position().is_none());
        assert!(e.on_activate().is_err());
        assert!(e.on_origin_fix(fix(1.0, 1.0, 0.0)).is_err());

        e.on_configure().unwrap();
        e.on_activate().unwrap();
        assert!(e.on_configure().is_err());
        assert_eq!(e.anchor_state(), AnchorState::NoOrigin);
    }

    #[test]
    fn test_deadzone_holds_position() {
        let mut config = FusionConfig::default();
        config.fusion.deadzone_m = 0.008;
        config.fusion.deadzone_px = 1.0;
        let mut e = FusionEngine::new(config).unwrap();
        e.on_origin_fix(fix(100.0, 200.0, 0.0)).unwrap();
        e.on_camera_pose(pose(0.0, 0.0, 0.0));

        let state = e.on_camera_pose(pose(0.005, 0.0, 0.0)).unwrap();
        assert_eq!(state.user_position, MapPoint::new(100.0, 200.0));
        let state = e.on_camera_pose(pose(0.05, 0.0, 0.0)).unwrap();
        assert_relative_eq!(state.user_position.x, 105.0, epsilon = 1e-9);
    }

    #[test]
    fn test_magnetometer_source_falls_back_to_device_yaw() {
        let mut e = engine();
        e.select_heading_source(HeadingSource::Magnetometer);
        e.set_magnetometer_available(true);
        assert_eq!(e.active_heading_source(), HeadingSource::DeviceYaw);

        e.on_origin_fix(fix(100.0, 200.0, 30.0)).unwrap();
        e.on_camera_pose(pose(0.0, 0.0, 0.0));
        let before = e.heading_deg().unwrap();

        e.on_magnetometer(&MagnetometerReading { x: 0.0, y: 1.0, z: 0.0 });
        assert_eq!(e.active_heading_source(), HeadingSource::Magnetometer);
        assert_relative_eq!(e.heading_deg().unwrap(), before, epsilon = 1e-9);

        // Magnetometer turns 45 degrees
        let state = e
            .on_magnetometer(&MagnetometerReading { x: -1.0, y: 1.0, z: 0.0 })
            .unwrap();
        assert_relative_eq!(state.heading_deg, 75.0, epsilon = 1e-9);

        e.set_magnetometer_available(false);
        assert_eq!(e.active_heading_source(), HeadingSource::DeviceYaw);
        assert_relative_eq!(e.heading_deg().unwrap(), 75.0, epsilon = 1e-9);
    }

    #[test]
    fn test_stale_reading_keeps_magnetometer_unavailable() {
        let mut e = engine();
        e.on_origin_fix(fix(100.0, 200.0, 30.0)).unwrap();
        e.on_camera_pose(pose(0.0, 0.0, 0.0));
        e.select_heading_source(HeadingSource::Magnetometer);
        e.set_magnetometer_available(false);

        assert!(e.on_magnetometer(&MagnetometerReading { x: 0.0, y: 1.0, z: 0.0 }).is_none());
        assert!(!e.magnetometer_available());
        assert_eq!(e.active_heading_source(), HeadingSource::DeviceYaw);
        assert_relative_eq!(e.heading_deg().unwrap(), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_overflowing_pose_keeps_last_position() {
        let mut e = engine();
        e.on_origin_fix(fix(100.0, 200.0, 0.0)).unwrap();
        e.on_camera_pose(pose(-1e308, 0.0, 0.0));

        let state = e.on_camera_pose(pose(1e308, 0.0, 0.0)).unwrap();
        assert_eq!(state.user_position, MapPoint::new(100.0, 200.0));
        assert!(state.user_position.is_finite());
    }

    #[test]
    fn test_configure_is_atomic() {
        let mut e = engine();
        let mut params = HashMap::new();
        params.insert("pixels_per_meter".to_string(), 120.0);
        params.insert("yaw_smoothing".to_string(), 0.1);
        e.configure(&params).unwrap();
        assert_eq!(e.frame().pixels_per_meter, 120.0);

        params.insert("pixels_per_meter".to_string(), 50.0);
        params.insert("position_smoothing".to_string(), 1.5);
        assert!(e.configure(&params).is_err());
        assert_eq!(e.frame().pixels_per_meter, 120.0);
    }

    #[test]
    fn test_route_to_world_requires_anchor() {
        let mut e = engine();
        let route = [MapPoint::new(180.0, 200.0)];
        assert!(e.route_to_world(&route).is_none());

        e.on_origin_fix(fix(100.0, 200.0, 0.0)).unwrap();
        e.on_camera_pose(pose(0.5, 0.0, 0.0));
        let world = e.route_to_world(&route).unwrap();
        assert_relative_eq!(world[0].x, 1.5, epsilon = 1e-9);
        assert_relative_eq!(world[0].y, 1.35, epsilon = 1e-9);
        assert_relative_eq!(world[0].z, 0.0, epsilon = 1e-9);
    }
}
