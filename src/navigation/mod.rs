//! Navigation: map frame geometry, routing collaborator and route progress
pub mod map_frame;
pub mod planner;
pub mod route;

use self::map_frame::MapFrame;
use self::planner::MultiStopRoute;
use self::route::{RemainingRoute, RoutePolyline, RouteTracker};
use crate::common::MapPoint;
use crate::config::RouteConfig;
use crate::error::{FusionError, Result};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};

/// Route state shown alongside the fused position
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteView {
    /// User position followed by the remaining waypoints
    pub display_route: Vec<MapPoint>,
    pub remaining: RemainingRoute,
    pub waypoint_index: usize,
    pub ordered_ids: Vec<i64>,
}

/// Navigation stack for the shopper
#[derive(Debug, Clone)]
pub struct NavigationStack {
    base: LifecycleNodeBase,
    config: RouteConfig,
    tracker: RouteTracker,
}

impl NavigationStack {
    pub fn new(config: RouteConfig) -> Self {
        NavigationStack {
            base: LifecycleNodeBase::new("navigation_stack", State::Active),
            tracker: RouteTracker::new(config.waypoint_radius_m, config.walking_speed_mps),
            config,
        }
    }

    pub fn tracker(&self) -> &RouteTracker {
        &self.tracker
    }

    pub fn has_route(&self) -> bool {
        self.tracker.route().is_some()
    }

    /// Install a point-to-point route
    pub fn set_route(&mut self, route: RoutePolyline) {
        self.tracker.set_route(route, Vec::new());
    }

    /// Install a route together with the item visiting order
    pub fn set_ordered_route(&mut self, route: RoutePolyline, ordered_ids: Vec<i64>) {
        self.tracker.set_route(route, ordered_ids);
    }

    /// Install a multi-stop route as decoded from the routing service
    pub fn set_multi_stop_route(&mut self, route: MultiStopRoute) -> Result<()> {
        let polyline = RoutePolyline::new(route.polyline)?;
        self.set_ordered_route(polyline, route.ordered_ids);
        Ok(())
    }

    pub fn clear_route(&mut self) {
        if self.has_route() {
            log::info!("Route cleared");
        }
        self.tracker.clear();
    }

    /// Advance waypoints for a new user position
    pub fn update(&mut self, user: MapPoint, frame: &MapFrame) -> bool {
        if !self.base.is_active() {
            return false;
        }
        self.tracker.advance(user, frame)
    }

    pub fn view(&self, user: Option<MapPoint>, frame: &MapFrame) -> RouteView {
        RouteView {
            display_route: self.tracker.display_route(user),
            remaining: self.tracker.remaining(user, frame),
            waypoint_index: self.tracker.waypoint_index(),
            ordered_ids: self.tracker.ordered_ids().to_vec(),
        }
    }
}

impl LifecycleNode for NavigationStack {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn on_configure(&mut self) -> Result<()> {
        if self.base.is_active() {
            return Err(FusionError::Lifecycle(
                "cannot configure an active navigation stack".to_string(),
            ));
        }
        log::info!("Configuring {}", self.base.name);
        self.tracker = RouteTracker::new(self.config.waypoint_radius_m, self.config.walking_speed_mps);
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_activate(&mut self) -> Result<()> {
        if self.base.get_state() == State::Unconfigured {
            return Err(FusionError::Lifecycle(
                "navigation stack must be configured before activation".to_string(),
            ));
        }
        log::info!("Activating {}", self.base.name);
        self.base.set_state(State::Active);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<()> {
        log::info!("Deactivating {}", self.base.name);
        self.base.set_state(State::Inactive);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        log::info!("Cleaning up {}", self.base.name);
        self.tracker.clear();
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

    #[test]
    fn test_route_view() {
        let frame = MapFrame::new(675.0, 878.0, 100.0).unwrap();
        let mut nav = NavigationStack::new(RouteConfig::default());
        assert_eq!(nav.view(None, &frame), RouteView::default());

        nav.set_multi_stop_route(MultiStopRoute {
            polyline: vec![MapPoint::new(0.0, 0.0), MapPoint::new(0.0, 240.0)],
            ordered_ids: vec![9],
        })
        .unwrap();
        let user = MapPoint::new(0.0, 10.0);
        assert!(nav.update(user, &frame));

        let view = nav.view(Some(user), &frame);
        assert_eq!(view.display_route, vec![user, MapPoint::new(0.0, 240.0)]);
        assert_eq!(view.waypoint_index, 1);
        assert_eq!(view.ordered_ids, vec![9]);
        assert_eq!(view.remaining.meters, 2.3);
    }

    #[test]
    fn test_paused_stack_does_not_advance() {
        let frame = MapFrame::new(675.0, 878.0, 100.0).unwrap();
        let mut nav = NavigationStack::new(RouteConfig::default());
        nav.set_route(RoutePolyline::new(vec![MapPoint::new(0.0, 0.0), MapPoint::new(500.0, 0.0)]).unwrap());
        nav.on_deactivate().unwrap();
        assert!(!nav.update(MapPoint::new(0.0, 0.0), &frame));

        nav.on_cleanup().unwrap();
        assert!(!nav.has_route());
        assert!(nav.on_activate().is_err());
    }
}
