//! SVG output of overlay frames.
//!
//! Used by the replay tool to audit a session: floor rectangle, route,
//! category labels and the user marker with its heading arrow.

use super::overlay::OverlayFrame;
use super::transform::ScreenPoint;
use crate::error::Result;
use std::fmt::Write;
use std::path::Path;

/// SVG color scheme for the overlay
#[derive(Clone, Debug)]
pub struct SvgColorScheme {
    pub background: &'static str,
    pub floor: &'static str,
    pub route: &'static str,
    pub marker_fill: &'static str,
    pub marker_stroke: &'static str,
    pub label: &'static str,
}

impl Default for SvgColorScheme {
    fn default() -> Self {
        Self {
            background: "#000000",
            floor: "#F8F8F8",
            route: "#1E90FF",
            marker_fill: "#3FA9F5",
            marker_stroke: "#083A66",
            label: "#333333",
        }
    }
}

/// Configuration for SVG rendering
#[derive(Clone, Debug)]
pub struct SvgConfig {
    pub route_width: f64,
    pub marker_radius: f64,
    pub font_size: f64,
    pub colors: SvgColorScheme,
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self {
            route_width: 4.0,
            marker_radius: 4.0,
            font_size: 12.0,
            colors: SvgColorScheme::default(),
        }
    }
}

/// Render one overlay frame to an SVG document
pub fn render_svg(frame: &OverlayFrame, config: &SvgConfig) -> Result<String> {
    let mut svg = String::new();
    let colors = &config.colors;

    writeln!(&mut svg, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        &mut svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}">"#,
        frame.viewport_width, frame.viewport_height, frame.viewport_width, frame.viewport_height
    )?;
    writeln!(
        &mut svg,
        r#"  <rect width="100%" height="100%" fill="{}"/>"#,
        colors.background
    )?;

    // Map layer, rotated about the user in rotate-map mode
    let pivot = frame.user.as_ref().map(|u| u.position).unwrap_or_default();
    writeln!(
        &mut svg,
        r#"  <g id="map" transform="rotate({:.2} {:.1} {:.1})">"#,
        frame.map_rotation_deg, pivot.x, pivot.y
    )?;
    let r = &frame.map_rect;
    writeln!(
        &mut svg,
        r#"    <rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
        r.x, r.y, r.width, r.height, colors.floor
    )?;
    for label in &frame.labels {
        writeln!(
            &mut svg,
            r#"    <text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="{}" text-anchor="middle" fill="{}">{}</text>"#,
            label.position.x,
            label.position.y,
            config.font_size,
            colors.label,
            escape(&label.name)
        )?;
    }
    if frame.route.len() >= 2 {
        writeln!(
            &mut svg,
            r#"    <polyline points="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round"/>"#,
            points_attr(&frame.route)?,
            colors.route,
            config.route_width
        )?;
    }
    writeln!(&mut svg, "  </g>")?;

    if let Some(user) = &frame.user {
        let p = user.position;
        let a = &user.arrow;
        writeln!(&mut svg, r#"  <g id="user">"#)?;
        writeln!(
            &mut svg,
            r#"    <circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}" stroke="{}" stroke-width="1.5"/>"#,
            p.x, p.y, config.marker_radius, colors.marker_fill, colors.marker_stroke
        )?;
        writeln!(
            &mut svg,
            r#"    <polygon points="{}" fill="{}" stroke="{}" stroke-width="3"/>"#,
            points_attr(&[a.tip, a.left, a.right])?,
            colors.marker_fill,
            colors.marker_stroke
        )?;
        writeln!(
            &mut svg,
            r##"    <text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="{}" fill="#FFFFFF">{}</text>"##,
            p.x + config.marker_radius * 3.0,
            p.y,
            config.font_size,
            user.label
        )?;
        writeln!(&mut svg, "  </g>")?;
    }

    writeln!(&mut svg, "</svg>")?;
    Ok(svg)
}

/// Render and write an SVG file
pub fn save_svg<P: AsRef<Path>>(frame: &OverlayFrame, config: &SvgConfig, path: P) -> Result<()> {
    let svg = render_svg(frame, config)?;
    std::fs::write(path.as_ref(), svg)?;
    log::info!("Wrote overlay to {}", path.as_ref().display());
    Ok(())
}

fn points_attr(points: &[ScreenPoint]) -> Result<String> {
    let mut out = String::new();
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write!(&mut out, "{:.1},{:.1}", p.x, p.y)?;
    }
    Ok(out)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
