use std::collections::HashMap;
use nalgebra::Vector3;
use storenav_core::navigation::route::RoutePolyline;
use storenav_core::perception::localization::OriginFix;
use storenav_core::{CameraPose, FusionConfig, MapPoint, NavigatorCore};

/// Scripted walk: fix, a few metres of camera motion, a turn, a route
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Initializing navigator core...");

    let mut core = match NavigatorCore::new(FusionConfig::default()) {
        Ok(core) => core,
        Err(e) => {
            log::error!("Failed to create core: {}", e);
            return;
        }
    };

    let mut params = HashMap::new();
    params.insert("pixels_per_meter".to_string(), 80.0);
    if let Err(e) = core.perception_mut().configure(&params) {
        log::error!("Failed to configure fusion engine: {}", e);
    }

    match core.init() {
        Ok(_) => log::info!("Core initialized successfully!"),
        Err(e) => {
            log::error!("Failed to initialize core: {}", e);
            return;
        }
    }

    let fix = match OriginFix::new(MapPoint::new(100.0, 200.0), 0.0) {
        Ok(fix) => fix,
        Err(e) => {
            log::error!("Bad origin fix: {}", e);
            return;
        }
    };
    if let Err(e) = core.perception_mut().on_origin_fix(fix) {
        log::error!("Origin rejected: {}", e);
        return;
    }

    match RoutePolyline::new(vec![
        MapPoint::new(100.0, 200.0),
        MapPoint::new(420.0, 200.0),
        MapPoint::new(420.0, 600.0),
    ]) {
        Ok(route) => core.navigation_mut().set_route(route),
        Err(e) => log::error!("Bad route: {}", e),
    }

    // Walk 4 m along +X, then turn right and walk 2 m
    let mut samples: Vec<CameraPose> = (0..=8)
        .map(|i| CameraPose::new(Vector3::new(f64::from(i) * 0.5, 1.4, 0.0), 0.0))
        .collect();
    samples.extend((1..=4).map(|i| CameraPose::new(Vector3::new(4.0, 1.4, f64::from(i) * 0.5), 90.0)));

    for pose in samples {
        if let Some(state) = core.on_camera_pose(pose) {
            let remaining = core.route_view().remaining;
            println!(
                "camera ({:>4.1}, {:>4.1}) -> map ({:>6.1}, {:>6.1}) heading {:>5.1}  remaining {:.1} m ({:.0} s)",
                pose.position.x,
                pose.position.z,
                state.user_position.x,
                state.user_position.y,
                state.heading_deg,
                remaining.meters,
                remaining.seconds
            );
        }
    }

    if core.perception_mut().set_base_now() {
        log::info!("Base heading now {:.1}", core.perception().base_heading());
    }

    match core.shutdown() {
        Ok(_) => log::info!("Core shutdown successfully!"),
        Err(e) => log::error!("Failed to shutdown core: {}", e),
    }
}
