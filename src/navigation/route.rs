//! Route polyline and progress along it

use super::map_frame::MapFrame;
use crate::common::MapPoint;
use crate::error::{FusionError, Result};

/// Ordered map points from the routing service; immutable once received
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoutePolyline(Vec<MapPoint>);

impl RoutePolyline {
    /// Wrap a polyline, rejecting non-finite points
    pub fn new(points: Vec<MapPoint>) -> Result<Self> {
        if !points.iter().all(MapPoint::is_finite) {
            return Err(FusionError::NonFinite("route polyline"));
        }
        Ok(RoutePolyline(points))
    }

    pub fn points(&self) -> &[MapPoint] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Remaining walk to the destination
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RemainingRoute {
    pub meters: f64,
    pub seconds: f64,
}

/// Tracks the active route and the next waypoint to reach
#[derive(Debug, Clone)]
pub struct RouteTracker {
    route: Option<RoutePolyline>,
    ordered_ids: Vec<i64>,
    waypoint_index: usize,
    waypoint_radius_m: f64,
    walking_speed_mps: f64,
}

impl RouteTracker {
    pub fn new(waypoint_radius_m: f64, walking_speed_mps: f64) -> Self {
        RouteTracker {
            route: None,
            ordered_ids: Vec::new(),
            waypoint_index: 0,
            waypoint_radius_m,
            walking_speed_mps,
        }
    }

    pub fn route(&self) -> Option<&RoutePolyline> {
        self.route.as_ref()
    }

    /// Item order of a multi-stop route, empty otherwise
    pub fn ordered_ids(&self) -> &[i64] {
        &self.ordered_ids
    }

    pub fn waypoint_index(&self) -> usize {
        self.waypoint_index
    }

    /// Replace the route wholesale and restart at its first waypoint
    pub fn set_route(&mut self, route: RoutePolyline, ordered_ids: Vec<i64>) {
        log::info!(
            "New route with {} waypoints ({} stops)",
            route.len(),
            ordered_ids.len()
        );
        self.route = if route.is_empty() { None } else { Some(route) };
        self.ordered_ids = ordered_ids;
        self.waypoint_index = 0;
    }

    pub fn clear(&mut self) {
        self.route = None;
        self.ordered_ids.clear();
        self.waypoint_index = 0;
    }

    /// Skip every consecutive waypoint within the arrival radius of the user.
    ///
    /// Never moves past the last waypoint. Returns true if the index moved.
    pub fn advance(&mut self, user: MapPoint, frame: &MapFrame) -> bool {
        let Some(route) = &self.route else {
            return false;
        };
        let points = route.points();
        let radius_px = frame.meters_to_pixels(self.waypoint_radius_m);
        let last = points.len() - 1;

        let mut index = self.waypoint_index.min(last);
        while index < points.len() && user.distance_to(&points[index]) <= radius_px {
            index += 1;
        }
        let index = index.min(last);
        if index == self.waypoint_index {
            return false;
        }
        log::debug!("Waypoint {} -> {}", self.waypoint_index, index);
        self.waypoint_index = index;
        true
    }

    /// Waypoints not reached yet
    pub fn remaining_waypoints(&self) -> &[MapPoint] {
        match &self.route {
            Some(route) => {
                let points = route.points();
                &points[self.waypoint_index.min(points.len() - 1)..]
            }
            None => &[],
        }
    }

    /// Polyline to draw: the user followed by the remaining waypoints
    pub fn display_route(&self, user: Option<MapPoint>) -> Vec<MapPoint> {
        let remaining = self.remaining_waypoints();
        let mut out = Vec::with_capacity(remaining.len() + 1);
        if !remaining.is_empty() {
            out.extend(user);
        }
        out.extend_from_slice(remaining);
        out
    }

    /// Distance left along the route and walking time at the configured speed
    pub fn remaining(&self, user: Option<MapPoint>, frame: &MapFrame) -> RemainingRoute {
        let remaining = self.remaining_waypoints();
        let Some(first) = remaining.first() else {
            return RemainingRoute::default();
        };
        let mut pixels: f64 = remaining.windows(2).map(|w| w[0].distance_to(&w[1])).sum();
        if let Some(user) = user {
            pixels += user.distance_to(first);
        }
        let meters = frame.pixels_to_meters(pixels);
        RemainingRoute {
            meters,
            seconds: meters / self.walking_speed_mps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame() -> MapFrame {
        MapFrame::new(675.0, 878.0, 100.0).unwrap()
    }

    fn tracker_with(points: &[(f64, f64)]) -> RouteTracker {
        let mut t = RouteTracker::new(1.0, 1.2);
        let route = RoutePolyline::new(points.iter().map(|&(x, y)| MapPoint::new(x, y)).collect()).unwrap();
        t.set_route(route, Vec::new());
        t
    }

    #[test]
    fn test_rejects_non_finite_route() {
        assert!(RoutePolyline::new(vec![MapPoint::new(f64::NAN, 0.0)]).is_err());
    }

    #[test]
    fn test_advance_skips_reached_waypoints() {
        let mut t = tracker_with(&[(0.0, 0.0), (50.0, 0.0), (300.0, 0.0), (300.0, 300.0)]);
        assert!(t.advance(MapPoint::new(10.0, 0.0), &frame()));
        assert_eq!(t.waypoint_index(), 2);
        assert!(!t.advance(MapPoint::new(150.0, 0.0), &frame()));

        // Reaching the end keeps the last waypoint
        assert!(t.advance(MapPoint::new(300.0, 50.0), &frame()));
        assert_eq!(t.waypoint_index(), 3);
        assert!(!t.advance(MapPoint::new(300.0, 290.0), &frame()));
        assert_eq!(t.waypoint_index(), 3);
        assert_eq!(t.remaining_waypoints(), &[MapPoint::new(300.0, 300.0)]);
    }

    #[test]
    fn test_display_route_starts_at_user() {
        let mut t = tracker_with(&[(0.0, 0.0), (200.0, 0.0), (200.0, 200.0)]);
        t.advance(MapPoint::new(5.0, 5.0), &frame());
        let user = MapPoint::new(20.0, 0.0);
        assert_eq!(
            t.display_route(Some(user)),
            vec![user, MapPoint::new(200.0, 0.0), MapPoint::new(200.0, 200.0)]
        );

        t.clear();
        assert!(t.display_route(Some(user)).is_empty());
    }

    #[test]
    fn test_remaining_distance_and_eta() {
        let t = tracker_with(&[(0.0, 0.0), (300.0, 0.0), (300.0, 400.0)]);
        let r = t.remaining(Some(MapPoint::new(0.0, 60.0)), &frame());
        assert_relative_eq!(r.meters, 7.6, epsilon = 1e-9);
        assert_relative_eq!(r.seconds, 7.6 / 1.2, epsilon = 1e-9);

        assert_eq!(RouteTracker::new(1.0, 1.2).remaining(None, &frame()), RemainingRoute::default());
    }

    #[test]
    fn test_new_route_resets_index() {
        let mut t = tracker_with(&[(0.0, 0.0), (500.0, 0.0)]);
        t.advance(MapPoint::new(0.0, 0.0), &frame());
        assert_eq!(t.waypoint_index(), 1);

        let route = RoutePolyline::new(vec![MapPoint::new(1.0, 1.0), MapPoint::new(2.0, 2.0)]).unwrap();
        t.set_route(route, vec![5, 6]);
        assert_eq!(t.waypoint_index(), 0);
        assert_eq!(t.ordered_ids(), &[5, 6]);
    }
}
