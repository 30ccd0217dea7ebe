//! Async host runtime
//!
//! One tokio task owns the [`NavigatorCore`] and is the only writer of the
//! origin, anchor and fused state. Sensor callbacks and UI actions arrive as
//! [`FusionEvent`]s on an mpsc channel; every processed message publishes a
//! fresh [`NavigatorSnapshot`] on a watch channel. Localization and route
//! fetches run as separate tasks and report back through the same channel,
//! tagged with a request generation so that superseded answers are dropped.

use crate::common::{CameraPose, MapPoint};
use crate::error::{FusionError, Result};
use crate::navigation::planner::RoutingService;
use crate::navigation::route::RoutePolyline;
use crate::perception::localization::{LocalizationService, OriginFix};
use crate::perception::sensors::{CameraTransform, HeadingSource, MagnetometerReading};
use crate::{NavigatorCore, NavigatorSnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError, Sender, WeakSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 256;

/// Input to the navigator task
#[derive(Debug, Clone)]
pub enum FusionEvent {
    CameraTransform(CameraTransform),
    CameraPose(CameraPose),
    Tracking { state: String, reason: String },
    Magnetometer(MagnetometerReading),
    MagnetometerAvailable(bool),
    /// Fix obtained by the host itself
    OriginFix(OriginFix),
    /// Fetch a fresh fix from the localization service
    Recenter,
    ResetAnchor,
    SetBaseNow,
    SelectHeadingSource(HeadingSource),
    SetYawOnly(bool),
    SetRotateWithCurrentYaw(bool),
    Configure(HashMap<String, f64>),
    RequestRoute { end: MapPoint },
    RequestMultiStop { item_ids: Vec<i64> },
    RouteReceived(RoutePolyline),
    ClearRoute,
    Pause,
    Resume,
}

enum Inbound {
    Event(FusionEvent),
    Origin {
        generation: u64,
        result: Result<Option<OriginFix>>,
    },
    Route {
        generation: u64,
        result: Result<(RoutePolyline, Vec<i64>)>,
    },
    Shutdown,
}

/// Handle to a running navigator task
pub struct NavigatorHandle {
    sender: Sender<Inbound>,
    snapshot: watch::Receiver<NavigatorSnapshot>,
    task: JoinHandle<NavigatorCore>,
}

impl NavigatorHandle {
    /// Queue an event, waiting for channel capacity
    pub async fn send(&self, event: FusionEvent) -> Result<()> {
        self.sender
            .send(Inbound::Event(event))
            .await
            .map_err(|_| stopped())
    }

    /// Queue an event without waiting; a full channel drops it.
    ///
    /// Meant for high-rate sensor callbacks where a newer sample follows.
    pub fn try_send(&self, event: FusionEvent) -> Result<bool> {
        match self.sender.try_send(Inbound::Event(event)) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                log::trace!("Navigator queue full, sample dropped");
                Ok(false)
            }
            Err(TrySendError::Closed(_)) => Err(stopped()),
        }
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> NavigatorSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every new snapshot
    pub fn subscribe(&self) -> watch::Receiver<NavigatorSnapshot> {
        self.snapshot.clone()
    }

    /// Stop the task after the queued events and return the core
    pub async fn shutdown(self) -> Result<NavigatorCore> {
        self.sender
            .send(Inbound::Shutdown)
            .await
            .map_err(|_| stopped())?;
        self.task
            .await
            .map_err(|e| FusionError::Lifecycle(format!("navigator task failed: {}", e)))
    }
}

fn stopped() -> FusionError {
    FusionError::Lifecycle("navigator task has stopped".to_string())
}

/// Spawn the navigator task on the current tokio runtime.
///
/// An origin fetch is started immediately.
pub fn spawn_navigator<L, R>(core: NavigatorCore, localization: Arc<L>, routing: Arc<R>) -> NavigatorHandle
where
    L: LocalizationService + 'static,
    R: RoutingService + 'static,
{
    let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
    let (snapshot_tx, snapshot) = watch::channel(core.snapshot());
    let navigator = Navigator {
        core,
        inbound: sender.downgrade(),
        snapshot: snapshot_tx,
        localization,
        routing,
        origin_generation: 0,
        route_generation: 0,
        last_error: None,
    };
    let task = tokio::spawn(navigator.run(receiver));
    NavigatorHandle {
        sender,
        snapshot,
        task,
    }
}

struct Navigator<L, R> {
    core: NavigatorCore,
    /// Weak so that dropping every handle ends the task
    inbound: WeakSender<Inbound>,
    snapshot: watch::Sender<NavigatorSnapshot>,
    localization: Arc<L>,
    routing: Arc<R>,
    origin_generation: u64,
    route_generation: u64,
    last_error: Option<String>,
}

impl<L, R> Navigator<L, R>
where
    L: LocalizationService + 'static,
    R: RoutingService + 'static,
{
    async fn run(mut self, mut receiver: mpsc::Receiver<Inbound>) -> NavigatorCore {
        log::info!("Navigator started");
        self.fetch_origin();
        while let Some(message) = receiver.recv().await {
            match message {
                Inbound::Event(event) => self.handle_event(event),
                Inbound::Origin { generation, result } => self.apply_origin(generation, result),
                Inbound::Route { generation, result } => self.apply_route(generation, result),
                Inbound::Shutdown => break,
            }
            self.publish();
        }
        log::info!("Navigator stopped");
        self.core
    }

    fn publish(&self) {
        let mut snapshot = self.core.snapshot();
        snapshot.last_error = self.last_error.clone();
        self.snapshot.send_replace(snapshot);
    }

    fn fail(&mut self, error: FusionError) {
        log::warn!("{}", error);
        self.last_error = Some(error.to_string());
    }

    fn handle_event(&mut self, event: FusionEvent) {
        match event {
            FusionEvent::CameraTransform(t) => {
                self.core.on_camera_transform(&t);
            }
            FusionEvent::CameraPose(pose) => {
                self.core.on_camera_pose(pose);
            }
            FusionEvent::Tracking { state, reason } => {
                self.core.perception_mut().on_tracking_state(&state, &reason);
            }
            FusionEvent::Magnetometer(reading) => {
                self.core.perception_mut().on_magnetometer(&reading);
            }
            FusionEvent::MagnetometerAvailable(available) => {
                self.core.perception_mut().set_magnetometer_available(available);
            }
            FusionEvent::OriginFix(fix) => {
                // Supersedes any fetch still in flight
                self.origin_generation += 1;
                self.set_origin(fix);
            }
            FusionEvent::Recenter => self.fetch_origin(),
            FusionEvent::ResetAnchor => {
                self.core.perception_mut().reset_anchor();
            }
            FusionEvent::SetBaseNow => {
                self.core.perception_mut().set_base_now();
            }
            FusionEvent::SelectHeadingSource(source) => {
                self.core.perception_mut().select_heading_source(source);
            }
            FusionEvent::SetYawOnly(yaw_only) => self.core.perception_mut().set_yaw_only(yaw_only),
            FusionEvent::SetRotateWithCurrentYaw(enabled) => {
                self.core.perception_mut().set_rotate_with_current_yaw(enabled);
            }
            FusionEvent::Configure(params) => {
                if let Err(e) = self.core.perception_mut().configure(&params) {
                    self.fail(e);
                }
            }
            FusionEvent::RequestRoute { end } => match self.core.route_request(end) {
                Ok(request) => {
                    let generation = self.next_route_generation();
                    let routing = Arc::clone(&self.routing);
                    self.spawn_route(generation, async move {
                        let polyline = routing.compute_route(request).await?;
                        Ok::<_, FusionError>((polyline, Vec::new()))
                    });
                }
                Err(e) => self.fail(e),
            },
            FusionEvent::RequestMultiStop { item_ids } => {
                match self.core.multi_stop_request(item_ids) {
                    Ok(request) => {
                        let generation = self.next_route_generation();
                        let routing = Arc::clone(&self.routing);
                        self.spawn_route(generation, async move {
                            let route = routing.compute_multi_stop(request).await?;
                            let polyline = RoutePolyline::new(route.polyline)?;
                            Ok::<_, FusionError>((polyline, route.ordered_ids))
                        });
                    }
                    Err(e) => self.fail(e),
                }
            }
            FusionEvent::RouteReceived(polyline) => {
                self.next_route_generation();
                self.core.navigation_mut().set_route(polyline);
            }
            FusionEvent::ClearRoute => {
                self.next_route_generation();
                self.core.navigation_mut().clear_route();
            }
            FusionEvent::Pause => {
                if let Err(e) = self.core.pause() {
                    self.fail(e);
                }
            }
            FusionEvent::Resume => {
                if let Err(e) = self.core.resume() {
                    self.fail(e);
                }
            }
        }
    }

    fn set_origin(&mut self, fix: OriginFix) {
        match self.core.perception_mut().on_origin_fix(fix) {
            Ok(()) => self.last_error = None,
            Err(e) => self.fail(e),
        }
    }

    fn fetch_origin(&mut self) {
        self.origin_generation += 1;
        let generation = self.origin_generation;
        let Some(sender) = self.inbound.upgrade() else {
            return;
        };
        let localization = Arc::clone(&self.localization);
        log::debug!("Fetching origin fix (request {})", generation);
        tokio::spawn(async move {
            let result = localization.fetch_origin().await;
            if sender.send(Inbound::Origin { generation, result }).await.is_err() {
                log::debug!("Navigator gone before origin fetch {} completed", generation);
            }
        });
    }

    fn apply_origin(&mut self, generation: u64, result: Result<Option<OriginFix>>) {
        if generation != self.origin_generation {
            log::debug!("Ignoring superseded origin fetch {}", generation);
            return;
        }
        match result {
            Ok(Some(fix)) => self.set_origin(fix),
            Ok(None) => log::info!("Localization service has no stored location"),
            Err(e) => self.fail(e),
        }
    }

    fn next_route_generation(&mut self) -> u64 {
        self.route_generation += 1;
        self.route_generation
    }

    fn spawn_route<F>(&self, generation: u64, fetch: F)
    where
        F: std::future::Future<Output = Result<(RoutePolyline, Vec<i64>)>> + Send + 'static,
    {
        let Some(sender) = self.inbound.upgrade() else {
            return;
        };
        log::debug!("Requesting route (request {})", generation);
        tokio::spawn(async move {
            let result = fetch.await;
            if sender.send(Inbound::Route { generation, result }).await.is_err() {
                log::debug!("Navigator gone before route {} completed", generation);
            }
        });
    }

    fn apply_route(&mut self, generation: u64, result: Result<(RoutePolyline, Vec<i64>)>) {
        if generation != self.route_generation {
            log::debug!("Ignoring superseded route {}", generation);
            return;
        }
        match result {
            Ok((polyline, ordered_ids)) => {
                self.last_error = None;
                self.core
                    .navigation_mut()
                    .set_ordered_route(polyline, ordered_ids);
            }
            // Route left unchanged
            Err(e) => self.fail(e),
        }
    }
}
