//! Heading normalization and convention bridges.
//!
//! Map headings use 0° = +X with clockwise-positive rotation (y down).
//! Screen headings use 0° = up, clockwise-positive.

/// Canonicalize an angle in degrees into `[0, 360)`
pub fn normalize_deg(deg: f64) -> f64 {
    let wrapped = ((deg % 360.0) + 360.0) % 360.0;
    // Tiny negative inputs round up to exactly 360.0
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Shortest signed rotation from `from` to `to`, in `(-180, 180]`
pub fn angle_delta(from: f64, to: f64) -> f64 {
    let d = normalize_deg(to - from);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

/// Convert a map heading into the on-screen arrow convention
pub fn map_heading_to_screen(heading_deg: f64) -> f64 {
    normalize_deg(heading_deg - 90.0)
}
