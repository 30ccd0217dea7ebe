//! Routing collaborator interface
//!
//! Pathfinding itself runs in the store backend. This module defines the
//! request and response payloads, the service trait the runtime calls, and a
//! straight-line service for replays and tests.

use super::route::RoutePolyline;
use crate::common::MapPoint;
use crate::error::{FusionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;

/// Graph search used by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAlgorithm {
    #[default]
    Astar,
    Dijkstra,
}

/// Point-to-point route request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub start: MapPoint,
    pub end: MapPoint,
    #[serde(default)]
    pub algorithm: RouteAlgorithm,
}

/// Multi-stop request: visit every listed item starting from the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiStopRequest {
    #[serde(rename = "user", alias = "start")]
    pub start: MapPoint,
    pub item_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteResponse {
    #[serde(default)]
    pub polyline: Vec<MapPoint>,
}

/// Multi-stop route with the visiting order chosen by the backend
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MultiStopRoute {
    #[serde(default)]
    pub polyline: Vec<MapPoint>,
    #[serde(default)]
    pub ordered_ids: Vec<i64>,
}

/// Decode a point-to-point route response body
pub fn parse_route_body(body: &str) -> Result<RoutePolyline> {
    let response: RouteResponse = serde_json::from_str(body)?;
    RoutePolyline::new(response.polyline)
}

/// Decode a multi-stop route response body
pub fn parse_multi_stop_body(body: &str) -> Result<MultiStopRoute> {
    let route: MultiStopRoute = serde_json::from_str(body)?;
    if !route.polyline.iter().all(MapPoint::is_finite) {
        return Err(FusionError::NonFinite("route polyline"));
    }
    Ok(route)
}

/// Trait for route providers
pub trait RoutingService: Send + Sync {
    /// Route between two map points
    fn compute_route(
        &self,
        request: RouteRequest,
    ) -> impl Future<Output = Result<RoutePolyline>> + Send;

    /// Route through several items, ordered by the service
    fn compute_multi_stop(
        &self,
        request: MultiStopRequest,
    ) -> impl Future<Output = Result<MultiStopRoute>> + Send;
}

/// Routing without a walkable graph: straight legs between stops.
///
/// Multi-stop order is greedy nearest-neighbour from the start.
#[derive(Debug, Clone, Default)]
pub struct DirectRouting {
    items: HashMap<i64, MapPoint>,
}

impl DirectRouting {
    pub fn new() -> Self {
        DirectRouting::default()
    }

    /// Create a router that knows the given item locations
    pub fn with_items<I: IntoIterator<Item = (i64, MapPoint)>>(items: I) -> Self {
        DirectRouting {
            items: items.into_iter().collect(),
        }
    }

    pub fn add_item(&mut self, id: i64, position: MapPoint) {
        self.items.insert(id, position);
    }

    /// Straight line from start to goal
    pub fn plan(&self, start: MapPoint, goal: MapPoint) -> Vec<MapPoint> {
        vec![start, goal]
    }

    /// Greedy nearest-neighbour tour over known items
    pub fn plan_multi_stop(&self, start: MapPoint, item_ids: &[i64]) -> MultiStopRoute {
        let mut remaining: Vec<(i64, MapPoint)> = item_ids
            .iter()
            .filter_map(|id| self.items.get(id).map(|p| (*id, *p)))
            .collect();
        if remaining.is_empty() {
            return MultiStopRoute::default();
        }

        let mut current = start;
        let mut route = MultiStopRoute {
            polyline: vec![start],
            ordered_ids: Vec::with_capacity(remaining.len()),
        };
        while !remaining.is_empty() {
            let mut nearest = 0;
            for (i, (_, p)) in remaining.iter().enumerate() {
                if current.distance_to(p) < current.distance_to(&remaining[nearest].1) {
                    nearest = i;
                }
            }
            let (id, p) = remaining.remove(nearest);
            if route.polyline.last() != Some(&p) {
                route.polyline.push(p);
            }
            route.ordered_ids.push(id);
            current = p;
        }
        route
    }
}

impl RoutingService for DirectRouting {
    async fn compute_route(&self, request: RouteRequest) -> Result<RoutePolyline> {
        RoutePolyline::new(self.plan(request.start, request.end))
    }

    async fn compute_multi_stop(&self, request: MultiStopRequest) -> Result<MultiStopRoute> {
        if !request.start.is_finite() {
            return Err(FusionError::NonFinite("route start"));
        }
        Ok(self.plan_multi_stop(request.start, &request.item_ids))
    }
}
