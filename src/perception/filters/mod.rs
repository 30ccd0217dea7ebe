//! Smoothing filters for sensor data

use crate::common::angles::{angle_delta, normalize_deg};
use crate::common::MapPoint;

/// A generic filter interface
pub trait Filter<T> {
    /// Feed one sample and return the filtered value
    fn filter(&mut self, input: T) -> T;

    /// Forget all history
    fn reset(&mut self);
}

/// Exponential smoothing of a yaw angle along the shortest arc.
///
/// `alpha` is the weight of the new sample; 1.0 passes samples through.
#[derive(Debug, Clone)]
pub struct YawSmoother {
    alpha: f64,
    state: Option<f64>,
}

impl YawSmoother {
    pub fn new(alpha: f64) -> Self {
        YawSmoother { alpha, state: None }
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = alpha;
    }
}

impl Filter<f64> for YawSmoother {
    fn filter(&mut self, input: f64) -> f64 {
        let next = match self.state {
            Some(prev) if self.alpha < 1.0 => {
                normalize_deg(prev + angle_delta(prev, input) * self.alpha)
            }
            _ => input,
        };
        self.state = Some(next);
        next
    }

    fn reset(&mut self) {
        self.state = None;
    }
}

/// Exponential smoothing of the user position.
///
/// `beta` is the weight of the previous position; 0.0 passes targets through.
#[derive(Debug, Clone)]
pub struct PositionSmoother {
    beta: f64,
    prev: Option<MapPoint>,
}

impl PositionSmoother {
    pub fn new(beta: f64) -> Self {
        PositionSmoother { beta, prev: None }
    }

    /// Restart smoothing from a known position
    pub fn reset_to(&mut self, position: MapPoint) {
        self.prev = Some(position);
    }

    pub fn set_beta(&mut self, beta: f64) {
        self.beta = beta;
    }
}

impl Filter<MapPoint> for PositionSmoother {
    fn filter(&mut self, target: MapPoint) -> MapPoint {
        let next = match self.prev {
            Some(prev) if self.beta > 0.0 => MapPoint::new(
                prev.x * self.beta + target.x * (1.0 - self.beta),
                prev.y * self.beta + target.y * (1.0 - self.beta),
            ),
            _ => target,
        };
        self.prev = Some(next);
        next
    }

    fn reset(&mut self) {
        self.prev = None;
    }
}
