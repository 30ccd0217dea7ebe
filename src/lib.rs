pub mod common;
pub mod config;
pub mod display;
pub mod error;
pub mod lifecycle;
pub mod navigation;
pub mod perception;
pub mod runtime;

pub use crate::common::{CameraPose, FusedState, MapPoint};
pub use crate::config::FusionConfig;
pub use crate::error::{FusionError, Result};
pub use crate::perception::FusionEngine;

use crate::lifecycle::{LifecycleNode, State};
use crate::navigation::planner::{MultiStopRequest, RouteAlgorithm, RouteRequest};
use crate::navigation::{NavigationStack, RouteView};
use crate::perception::localization::AnchorState;
use crate::perception::sensors::{CameraTransform, HeadingSource};
use nalgebra::Vector3;

/// Everything a UI needs to draw one frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NavigatorSnapshot {
    pub fused: Option<FusedState>,
    pub anchor_state: AnchorState,
    pub tracking: bool,
    pub heading_source: HeadingSource,
    pub route: RouteView,
    /// Display route placed in the AR world, empty until anchored
    pub route_world: Vec<Vector3<f64>>,
    /// Last collaborator or input failure, for display
    pub last_error: Option<String>,
}

/// Core of the AR navigator: the fusion engine plus route progress
#[derive(Debug, Clone)]
pub struct NavigatorCore {
    perception: FusionEngine,
    navigation: NavigationStack,
}

impl NavigatorCore {
    /// Create a new core from a configuration
    pub fn new(config: FusionConfig) -> Result<Self> {
        let navigation = NavigationStack::new(config.route.clone());
        Ok(NavigatorCore {
            perception: FusionEngine::new(config)?,
            navigation,
        })
    }

    fn components_mut(&mut self) -> [&mut dyn LifecycleNode; 2] {
        [&mut self.perception, &mut self.navigation]
    }

    /// Bring every component to the active state
    pub fn init(&mut self) -> Result<()> {
        for component in self.components_mut() {
            if component.state() == State::Unconfigured {
                component.on_configure()?;
            }
            component.on_activate()?;
        }
        Ok(())
    }

    /// Deactivate and clean up every component
    pub fn shutdown(&mut self) -> Result<()> {
        for component in self.components_mut() {
            component.on_deactivate()?;
            component.on_cleanup()?;
        }
        Ok(())
    }

    /// AR view paused: samples are ignored until [`NavigatorCore::resume`]
    pub fn pause(&mut self) -> Result<()> {
        for component in self.components_mut() {
            component.on_deactivate()?;
        }
        Ok(())
    }

    /// AR view resumed with a new tracking session
    pub fn resume(&mut self) -> Result<()> {
        for component in self.components_mut() {
            component.on_activate()?;
        }
        Ok(())
    }

    pub fn perception(&self) -> &FusionEngine {
        &self.perception
    }

    pub fn perception_mut(&mut self) -> &mut FusionEngine {
        &mut self.perception
    }

    pub fn navigation(&self) -> &NavigationStack {
        &self.navigation
    }

    pub fn navigation_mut(&mut self) -> &mut NavigationStack {
        &mut self.navigation
    }

    /// Process a pose sample and advance route progress
    pub fn on_camera_pose(&mut self, pose: CameraPose) -> Option<FusedState> {
        let fused = self.perception.on_camera_pose(pose)?;
        self.navigation
            .update(fused.user_position, self.perception.frame());
        Some(fused)
    }

    pub fn on_camera_transform(&mut self, transform: &CameraTransform) -> Option<FusedState> {
        let fused = self.perception.on_camera_transform(transform)?;
        self.navigation
            .update(fused.user_position, self.perception.frame());
        Some(fused)
    }

    /// Route request from the user's current position
    pub fn route_request(&self, end: MapPoint) -> Result<RouteRequest> {
        if !end.is_finite() {
            return Err(FusionError::NonFinite("route destination"));
        }
        let start = self.perception.user_position().ok_or(FusionError::NoLocation)?;
        Ok(RouteRequest {
            start,
            end,
            algorithm: RouteAlgorithm::default(),
        })
    }

    /// Multi-stop request from the user's current position
    pub fn multi_stop_request(&self, item_ids: Vec<i64>) -> Result<MultiStopRequest> {
        let start = self.perception.user_position().ok_or(FusionError::NoLocation)?;
        if item_ids.is_empty() {
            return Err(FusionError::Config("item list is empty".to_string()));
        }
        Ok(MultiStopRequest { start, item_ids })
    }

    pub fn route_view(&self) -> RouteView {
        self.navigation
            .view(self.perception.user_position(), self.perception.frame())
    }

    pub fn snapshot(&self) -> NavigatorSnapshot {
        let route = self.route_view();
        let route_world = if route.display_route.len() >= 2 {
            self.perception
                .route_to_world(&route.display_route)
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        NavigatorSnapshot {
            fused: self.perception.fused_state(),
            anchor_state: self.perception.anchor_state(),
            tracking: self.perception.is_tracking(),
            heading_source: self.perception.active_heading_source(),
            route,
            route_world,
            last_error: None,
        }
    }
}
