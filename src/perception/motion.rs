//! Motion integration: camera travel since the anchor -> map position

use super::localization::Anchor;
use super::sensors::Platform;
use crate::common::{CameraPose, MapPoint};
use crate::navigation::map_frame::{MapFrame, WorldPoint};
use nalgebra::{Rotation2, Vector2, Vector3};

/// Camera travel since the anchor expressed in the map frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Displacement {
    /// Horizontal camera travel in metres
    pub travel_m: f64,
    /// Map pixel offset from the anchor's map position
    pub pixels: Vector2<f64>,
}

impl Displacement {
    /// True when both travel and pixel offset are under their dead-zones
    pub fn within_deadzone(&self, deadzone_m: f64, deadzone_px: f64) -> bool {
        self.travel_m < deadzone_m && self.pixels.norm() < deadzone_px
    }
}

/// Rotates and scales AR camera displacement into map pixels
#[derive(Debug, Clone)]
pub struct MotionIntegrator {
    platform: Platform,
    rotate_with_current_yaw: bool,
}

impl MotionIntegrator {
    pub fn new(platform: Platform, rotate_with_current_yaw: bool) -> Self {
        MotionIntegrator {
            platform,
            rotate_with_current_yaw,
        }
    }

    pub fn set_rotate_with_current_yaw(&mut self, enabled: bool) {
        self.rotate_with_current_yaw = enabled;
    }

    pub fn rotate_with_current_yaw(&self) -> bool {
        self.rotate_with_current_yaw
    }

    /// Angle in radians between the AR frame and the map frame
    pub fn rotation_angle(&self, base_heading_deg: f64, anchor_yaw_deg: f64, current_yaw_deg: f64) -> f64 {
        let yaw_reference = if self.rotate_with_current_yaw {
            current_yaw_deg
        } else {
            anchor_yaw_deg
        };
        self.platform.rotation_sign() * (base_heading_deg - yaw_reference).to_radians()
    }

    /// Camera travel since the anchor, rotated by `theta` and scaled to pixels
    pub fn displacement(&self, frame: &MapFrame, anchor: &Anchor, pose: &CameraPose, theta: f64) -> Displacement {
        let dx = pose.position.x - anchor.camera_pose.position.x;
        let dz = pose.position.z - anchor.camera_pose.position.z;
        // AR forward is -Z; forward becomes +y in the y-up rotation frame
        let v = Vector2::new(dx, -dz);
        let rotated = Rotation2::new(theta) * v;
        Displacement {
            travel_m: dx.hypot(dz),
            pixels: frame.displacement_to_pixels(rotated),
        }
    }

    /// New user position for a displacement, clamped to the floor plan.
    ///
    /// `None` when the displacement overflowed to a non-finite target.
    pub fn position(&self, frame: &MapFrame, anchor: &Anchor, displacement: &Displacement) -> Option<MapPoint> {
        let target = anchor.map_position.offset(displacement.pixels);
        target.is_finite().then(|| frame.clamp(target))
    }

    /// Inverse transform: map point -> AR world position near the floor.
    ///
    /// The height is the anchor camera height plus `y_offset_m`.
    pub fn map_to_camera_world(
        &self,
        frame: &MapFrame,
        anchor: &Anchor,
        p: MapPoint,
        theta: f64,
        y_offset_m: f64,
    ) -> Vector3<f64> {
        let WorldPoint { x, y } = frame.map_to_world(p, anchor.map_position);
        let v = Rotation2::new(-theta) * Vector2::new(x, y);
        let base = anchor.camera_pose.position;
        Vector3::new(base.x + v.x, base.y + y_offset_m, base.z - v.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame() -> MapFrame {
        MapFrame::new(675.0, 878.0, 80.0).unwrap()
    }

    fn anchor_at(map: MapPoint, yaw: f64) -> Anchor {
        Anchor {
            camera_pose: CameraPose::new(Vector3::new(0.0, 1.4, 0.0), yaw),
            yaw_deg: yaw,
            map_position: map,
        }
    }

    #[test]
    fn test_zero_motion_is_exact() {
        let integrator = MotionIntegrator::new(Platform::Android, false);
        let anchor = anchor_at(MapPoint::new(123.25, 456.5), 17.0);
        let theta = integrator.rotation_angle(211.0, 17.0, 17.0);
        let d = integrator.displacement(&frame(), &anchor, &anchor.camera_pose, theta);
        assert_eq!(integrator.position(&frame(), &anchor, &d), Some(anchor.map_position));
    }

    #[test]
    fn test_straight_step_without_rotation() {
        let integrator = MotionIntegrator::new(Platform::Ios, false);
        let anchor = anchor_at(MapPoint::new(100.0, 200.0), 0.0);
        let pose = CameraPose::new(Vector3::new(1.0, 1.4, 0.0), 0.0);
        let theta = integrator.rotation_angle(0.0, 0.0, 0.0);
        let d = integrator.displacement(&frame(), &anchor, &pose, theta);
        assert_eq!(d.travel_m, 1.0);
        assert_eq!(integrator.position(&frame(), &anchor, &d), Some(MapPoint::new(180.0, 200.0)));
    }

    #[test]
    fn test_forward_walk_moves_up_the_map() {
        let integrator = MotionIntegrator::new(Platform::Ios, false);
        let anchor = anchor_at(MapPoint::new(100.0, 200.0), 0.0);
        // One metre along -Z (AR forward)
        let pose = CameraPose::new(Vector3::new(0.0, 1.4, -1.0), 0.0);
        let d = integrator.displacement(&frame(), &anchor, &pose, 0.0);
        let p = integrator.position(&frame(), &anchor, &d).unwrap();
        assert_relative_eq!(p.x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 120.0, epsilon = 1e-9);
    }

    #[test]
    fn test_platform_sign_mirrors_rotation() {
        let ios = MotionIntegrator::new(Platform::Ios, false);
        let android = MotionIntegrator::new(Platform::Android, false);
        assert_relative_eq!(ios.rotation_angle(90.0, 0.0, 0.0), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(android.rotation_angle(90.0, 0.0, 0.0), -std::f64::consts::FRAC_PI_2);

        let anchor = anchor_at(MapPoint::new(300.0, 300.0), 0.0);
        let pose = CameraPose::new(Vector3::new(1.0, 1.4, 0.0), 0.0);
        let a = ios
            .position(&frame(), &anchor, &ios.displacement(&frame(), &anchor, &pose, ios.rotation_angle(90.0, 0.0, 0.0)))
            .unwrap();
        let b = android
            .position(&frame(), &anchor, &android.displacement(&frame(), &anchor, &pose, android.rotation_angle(90.0, 0.0, 0.0)))
            .unwrap();
        // +X rotated a quarter turn either way: mirrored about the anchor row
        assert_relative_eq!(a.x, 300.0, epsilon = 1e-9);
        assert_relative_eq!(b.x, 300.0, epsilon = 1e-9);
        assert_relative_eq!(a.y - 300.0, -(b.y - 300.0), epsilon = 1e-9);
    }

    #[test]
    fn test_current_yaw_reference() {
        let integrator = MotionIntegrator::new(Platform::Ios, true);
        assert_relative_eq!(integrator.rotation_angle(30.0, 0.0, 30.0), 0.0);
        let anchored = MotionIntegrator::new(Platform::Ios, false);
        assert_relative_eq!(anchored.rotation_angle(30.0, 0.0, 30.0), 30f64.to_radians());
    }

    #[test]
    fn test_clamps_to_map() {
        let integrator = MotionIntegrator::new(Platform::Ios, false);
        let anchor = anchor_at(MapPoint::new(10.0, 10.0), 0.0);
        // 5 m backward at 80 ppm lands inside the map height
        let pose = CameraPose::new(Vector3::new(-5.0, 1.4, 5.0), 0.0);
        let d = integrator.displacement(&frame(), &anchor, &pose, 0.0);
        assert_eq!(integrator.position(&frame(), &anchor, &d), Some(MapPoint::new(0.0, 410.0)));

        let pose = CameraPose::new(Vector3::new(-5.0, 1.4, 15.0), 0.0);
        let d = integrator.displacement(&frame(), &anchor, &pose, 0.0);
        assert_eq!(integrator.position(&frame(), &anchor, &d), Some(MapPoint::new(0.0, 878.0)));
    }

    #[test]
    fn test_overflowing_displacement_has_no_position() {
        let integrator = MotionIntegrator::new(Platform::Ios, false);
        let mut anchor = anchor_at(MapPoint::new(10.0, 10.0), 0.0);
        anchor.camera_pose.position.x = -1e308;
        let pose = CameraPose::new(Vector3::new(1e308, 1.4, 0.0), 0.0);
        let d = integrator.displacement(&frame(), &anchor, &pose, 0.0);
        assert!(integrator.position(&frame(), &anchor, &d).is_none());
    }

    #[test]
    fn test_map_to_camera_world_inverts_integration() {
        let integrator = MotionIntegrator::new(Platform::Android, false);
        let anchor = anchor_at(MapPoint::new(250.0, 400.0), 20.0);
        let theta = integrator.rotation_angle(135.0, 20.0, 20.0);
        let target = MapPoint::new(330.0, 260.0);

        let world = integrator.map_to_camera_world(&frame(), &anchor, target, theta, -0.05);
        assert_relative_eq!(world.y, 1.35, epsilon = 1e-9);

        let pose = CameraPose::new(world, 20.0);
        let d = integrator.displacement(&frame(), &anchor, &pose, theta);
        let p = integrator.position(&frame(), &anchor, &d).unwrap();
        assert_relative_eq!(p.x, target.x, epsilon = 1e-9);
        assert_relative_eq!(p.y, target.y, epsilon = 1e-9);
    }
}
