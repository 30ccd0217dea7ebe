use anyhow::{Context, Error, Result};
use clap::Parser;
use nalgebra::Vector3;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use storenav_core::display::svg::{save_svg, SvgConfig};
use storenav_core::display::{Category, OverlayRenderer, ViewTransform, ViewportFit};
use storenav_core::navigation::planner::DirectRouting;
use storenav_core::navigation::route::RoutePolyline;
use storenav_core::perception::localization::{OriginFix, StaticLocalization};
use storenav_core::perception::sensors::{CameraTransform, HeadingSource, MagnetometerReading};
use storenav_core::runtime::{spawn_navigator, FusionEvent};
use storenav_core::{CameraPose, FusionConfig, MapPoint, NavigatorCore};

/// Replay a recorded sensor trace through the fusion engine
#[derive(Parser, Debug)]
#[command(name = "storenav_replay")]
#[command(about = "Replay a JSON-lines sensor trace and render the final overlay")]
struct Args {
    /// Trace file, one JSON event per line
    #[arg(short, long)]
    trace: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Category polygons (JSON array) drawn as labels
    #[arg(long)]
    categories: Option<PathBuf>,

    /// Write the final overlay as SVG
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Viewport width in screen points
    #[arg(long, default_value = "412")]
    width: f64,

    /// Viewport height in screen points
    #[arg(long, default_value = "915")]
    height: f64,

    /// Rotate the map under a fixed arrow
    #[arg(long)]
    rotate_map: bool,

    /// Turn the arrow (or the rotated map) the opposite way
    #[arg(long)]
    heading_invert: bool,

    /// Heading arrow length in screen points
    #[arg(long, default_value = "24")]
    arrow_size: f64,
}

/// One line of a recorded trace
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TraceEvent {
    /// Catalogue entry used by multi-stop requests
    Item { id: i64, x: f64, y: f64 },
    Transform(CameraTransform),
    Pose { x: f64, y: f64, z: f64, yaw_deg: f64 },
    Tracking {
        state: String,
        #[serde(default)]
        reason: String,
    },
    Magnetometer(MagnetometerReading),
    MagnetometerAvailable { available: bool },
    Origin {
        x: f64,
        y: f64,
        #[serde(default)]
        heading_deg: f64,
    },
    Recenter,
    ResetAnchor,
    SetBaseNow,
    HeadingSource { source: HeadingSource },
    YawOnly { enabled: bool },
    Configure { params: HashMap<String, f64> },
    Route { points: Vec<MapPoint> },
    RouteTo { x: f64, y: f64 },
    MultiStop { item_ids: Vec<i64> },
    ClearRoute,
    Pause,
    Resume,
    /// Give in-flight fetches time to land
    Wait { ms: u64 },
}

enum Step {
    Send(FusionEvent),
    Sleep(Duration),
}

impl TraceEvent {
    fn into_step(self) -> Result<Option<Step>> {
        let event = match self {
            TraceEvent::Item { .. } => return Ok(None),
            TraceEvent::Wait { ms } => return Ok(Some(Step::Sleep(Duration::from_millis(ms)))),
            TraceEvent::Transform(t) => FusionEvent::CameraTransform(t),
            TraceEvent::Pose { x, y, z, yaw_deg } => {
                FusionEvent::CameraPose(CameraPose::new(Vector3::new(x, y, z), yaw_deg))
            }
            TraceEvent::Tracking { state, reason } => FusionEvent::Tracking { state, reason },
            TraceEvent::Magnetometer(reading) => FusionEvent::Magnetometer(reading),
            TraceEvent::MagnetometerAvailable { available } => FusionEvent::MagnetometerAvailable(available),
            TraceEvent::Origin { x, y, heading_deg } => {
                FusionEvent::OriginFix(OriginFix::new(MapPoint::new(x, y), heading_deg)?)
            }
            TraceEvent::Recenter => FusionEvent::Recenter,
            TraceEvent::ResetAnchor => FusionEvent::ResetAnchor,
            TraceEvent::SetBaseNow => FusionEvent::SetBaseNow,
            TraceEvent::HeadingSource { source } => FusionEvent::SelectHeadingSource(source),
            TraceEvent::YawOnly { enabled } => FusionEvent::SetYawOnly(enabled),
            TraceEvent::Configure { params } => FusionEvent::Configure(params),
            TraceEvent::Route { points } => FusionEvent::RouteReceived(RoutePolyline::new(points)?),
            TraceEvent::RouteTo { x, y } => FusionEvent::RequestRoute {
                end: MapPoint::new(x, y),
            },
            TraceEvent::MultiStop { item_ids } => FusionEvent::RequestMultiStop { item_ids },
            TraceEvent::ClearRoute => FusionEvent::ClearRoute,
            TraceEvent::Pause => FusionEvent::Pause,
            TraceEvent::Resume => FusionEvent::Resume,
        };
        Ok(Some(Step::Send(event)))
    }
}

fn read_trace(path: &Path) -> Result<Vec<TraceEvent>> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(|(n, line)| {
            serde_json::from_str::<TraceEvent>(line).with_context(|| format!("{}:{}: bad trace event", path.display(), n + 1))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FusionConfig::load(path)?,
        None => FusionConfig::default(),
    };
    let (map_width, map_height) = (config.map.width_px, config.map.height_px);

    let trace = read_trace(&args.trace)?;
    log::info!("Loaded {} trace events from {}", trace.len(), args.trace.display());

    let mut routing = DirectRouting::new();
    for event in &trace {
        if let TraceEvent::Item { id, x, y } = event {
            routing.add_item(*id, MapPoint::new(*x, *y));
        }
    }

    let mut core = NavigatorCore::new(config)?;
    core.init()?;
    let handle = spawn_navigator(core, Arc::new(StaticLocalization::new(None)), Arc::new(routing));

    for event in trace {
        match event.into_step()? {
            Some(Step::Send(event)) => handle.send(event).await?,
            Some(Step::Sleep(duration)) => tokio::time::sleep(duration).await,
            None => {}
        }
    }

    let mut core = handle.shutdown().await?;
    let snapshot = core.snapshot();
    match &snapshot.fused {
        Some(state) => println!(
            "position ({:.1}, {:.1}) heading {:.1} anchor {:?}",
            state.user_position.x, state.user_position.y, state.heading_deg, snapshot.anchor_state
        ),
        None => println!("no position (anchor {:?})", snapshot.anchor_state),
    }
    if !snapshot.route.display_route.is_empty() {
        println!(
            "route: {} points, {:.1} m remaining (~{:.0} s)",
            snapshot.route.display_route.len(),
            snapshot.route.remaining.meters,
            snapshot.route.remaining.seconds
        );
    }

    if let Some(svg_path) = &args.svg {
        let fit = ViewportFit::fit(args.width, args.height, map_width, map_height)?;
        let mut renderer = OverlayRenderer::new(ViewTransform::new(fit), map_width, map_height);
        renderer.set_rotate_map(args.rotate_map);
        renderer.set_heading_invert(args.heading_invert);
        renderer.set_arrow_size(args.arrow_size);
        if let Some(path) = &args.categories {
            let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let categories: Vec<Category> = serde_json::from_str(&content)?;
            renderer.set_categories(categories);
        }
        let frame = renderer.render(snapshot.fused.as_ref(), &snapshot.route.display_route);
        save_svg(&frame, &SvgConfig::default(), svg_path)?;
        log::info!("Overlay written to {}", svg_path.display());
    }

    core.shutdown()?;
    Ok(())
}
