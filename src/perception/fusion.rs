//! Heading fusion: absolute origin heading plus relative device rotation

use crate::common::angles::{angle_delta, normalize_deg};

/// Combines the origin heading with yaw drift since the anchor
#[derive(Debug, Clone)]
pub struct HeadingFusion {
    /// Absolute heading the drift is added to; starts as the fix heading and
    /// moves on "set base = now"
    base_heading_deg: f64,
    yaw_only: bool,
}

impl HeadingFusion {
    pub fn new(yaw_only: bool) -> Self {
        HeadingFusion {
            base_heading_deg: 0.0,
            yaw_only,
        }
    }

    pub fn base_heading(&self) -> f64 {
        self.base_heading_deg
    }

    pub fn set_base_heading(&mut self, heading_deg: f64) {
        self.base_heading_deg = normalize_deg(heading_deg);
    }

    pub fn yaw_only(&self) -> bool {
        self.yaw_only
    }

    pub fn set_yaw_only(&mut self, yaw_only: bool) {
        self.yaw_only = yaw_only;
    }

    /// Base heading plus the device rotation since the anchor
    pub fn effective_heading(&self, yaw_at_anchor: f64, current_yaw: f64) -> f64 {
        normalize_deg(self.base_heading_deg + angle_delta(yaw_at_anchor, current_yaw))
    }

    /// Heading drift alone, mirrored into the map rotation sense
    pub fn yaw_only_heading(&self, yaw_at_anchor: f64, current_yaw: f64) -> f64 {
        normalize_deg(yaw_at_anchor - current_yaw)
    }

    /// Heading shown to the user in the current mode
    pub fn display_heading(&self, yaw_at_anchor: f64, current_yaw: f64) -> f64 {
        if self.yaw_only {
            self.yaw_only_heading(yaw_at_anchor, current_yaw)
        } else {
            self.effective_heading(yaw_at_anchor, current_yaw)
        }
    }

    /// Fold the current drift into the base.
    ///
    /// Returns the yaw the caller must store as the new anchor yaw.
    pub fn set_base_now(&mut self, yaw_at_anchor: f64, current_yaw: f64) -> f64 {
        self.base_heading_deg = self.effective_heading(yaw_at_anchor, current_yaw);
        current_yaw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_effective_heading_follows_drift() {
        let mut fusion = HeadingFusion::new(false);
        fusion.set_base_heading(0.0);
        assert_eq!(fusion.effective_heading(0.0, 90.0), 90.0);
        assert_eq!(fusion.effective_heading(350.0, 10.0), 20.0);

        fusion.set_base_heading(300.0);
        assert_eq!(fusion.effective_heading(10.0, -20.0), 270.0);
    }

    #[test]
    fn test_yaw_only_ignores_base() {
        let mut fusion = HeadingFusion::new(true);
        fusion.set_base_heading(123.0);
        assert_eq!(fusion.display_heading(0.0, 90.0), 270.0);
        assert_eq!(fusion.display_heading(40.0, 40.0), 0.0);
    }

    #[test]
    fn test_set_base_now_is_continuous() {
        let mut fusion = HeadingFusion::new(false);
        fusion.set_base_heading(75.0);
        let before = fusion.effective_heading(12.0, 161.5);
        let new_anchor_yaw = fusion.set_base_now(12.0, 161.5);
        let after = fusion.effective_heading(new_anchor_yaw, 161.5);
        assert_relative_eq!(before, after, epsilon = 1e-9);
        assert_relative_eq!(fusion.base_heading(), before, epsilon = 1e-9);
    }
}
