//! Constant-velocity Kalman filter for a single axis.
//!
//! Each tracked coordinate (x, y, orientation, ball height) gets its own
//! two-state filter over `[position, velocity]`. Axes are decoupled, which
//! keeps every matrix 2×2 and lets the orientation axis wrap its residual
//! around ±π without affecting the others.
//!
//! ```text
//! predict:  x = F x          P = F P Fᵀ + Q
//! correct:  y = z − H x      S = H P Hᵀ + R
//!           K = P Hᵀ / S     x = x + K y      P = (I − K H) P
//! ```
//!
//! # Example
//!
//! ```rust
//! use fieldsense_perception::kalman::{AxisFilter, AxisNoise};
//!
//! let noise = AxisNoise { process: 1000.0, measurement: 5.0, initial_velocity: 1000.0 };
//! let mut axis = AxisFilter::new(0.0, 0, noise);
//! axis.predict(10_000_000);
//! axis.correct(10.0);
//! assert!(axis.pos() > 0.0 && axis.pos() <= 10.0);
//! ```

use fieldsense_types::{Timestamp, normalize_angle, ns_to_secs};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

/// Noise model of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisNoise {
    /// Standard deviation of the unmodelled acceleration (units/s²).
    pub process: f64,
    /// Standard deviation of a single measurement (units).
    pub measurement: f64,
    /// Standard deviation of the velocity right after initialisation
    /// (units/s).
    pub initial_velocity: f64,
}

/// Two-state `[position, velocity]` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisFilter {
    x: Vector2<f64>,
    p: Matrix2<f64>,
    timestamp: Timestamp,
    noise: AxisNoise,
    wrap: bool,
}

impl AxisFilter {
    pub fn new(pos: f64, timestamp: Timestamp, noise: AxisNoise) -> Self {
        Self {
            x: Vector2::new(pos, 0.0),
            p: Matrix2::new(
                noise.measurement.powi(2),
                0.0,
                0.0,
                noise.initial_velocity.powi(2),
            ),
            timestamp,
            noise,
            wrap: false,
        }
    }

    /// An axis whose position is an angle; residuals and predictions are
    /// wrapped into `(-π, π]`.
    pub fn angular(angle: f64, timestamp: Timestamp, noise: AxisNoise) -> Self {
        Self {
            wrap: true,
            ..Self::new(normalize_angle(angle), timestamp, noise)
        }
    }

    fn transition(&self, dt: f64) -> (Matrix2<f64>, Matrix2<f64>) {
        let f = Matrix2::new(1.0, dt, 0.0, 1.0);
        let q = self.noise.process.powi(2);
        let dt2 = dt * dt;
        let q = Matrix2::new(dt2 * dt2 / 4.0, dt2 * dt / 2.0, dt2 * dt / 2.0, dt2) * q;
        (f, q)
    }

    /// Advance the state to `t`. Times at or before the current state are
    /// ignored.
    pub fn predict(&mut self, t: Timestamp) {
        if t <= self.timestamp {
            return;
        }
        let dt = ns_to_secs(t - self.timestamp);
        let (f, q) = self.transition(dt);
        self.x = f * self.x;
        self.p = f * self.p * f.transpose() + q;
        if self.wrap {
            self.x[0] = normalize_angle(self.x[0]);
        }
        self.timestamp = t;
    }

    /// Predicted `(position, velocity)` at `t` without touching the state.
    pub fn prediction_at(&self, t: Timestamp) -> (f64, f64) {
        let dt = ns_to_secs(t - self.timestamp);
        let pos = self.x[0] + self.x[1] * dt;
        let pos = if self.wrap { normalize_angle(pos) } else { pos };
        (pos, self.x[1])
    }

    /// Residual of measurement `z` against the current state.
    pub fn innovation(&self, z: f64) -> f64 {
        let y = z - self.x[0];
        if self.wrap { normalize_angle(y) } else { y }
    }

    /// Fuse a position measurement taken at the current state time.
    pub fn correct(&mut self, z: f64) {
        let y = self.innovation(z);
        let s = self.p[(0, 0)] + self.noise.measurement.powi(2);
        if s <= 0.0 {
            return;
        }
        let k = Vector2::new(self.p[(0, 0)] / s, self.p[(1, 0)] / s);
        self.x += k * y;
        // (I − K H) P with H = [1 0]
        let ikh = Matrix2::new(1.0 - k[0], 0.0, -k[1], 1.0);
        self.p = ikh * self.p;
        if self.wrap {
            self.x[0] = normalize_angle(self.x[0]);
        }
    }

    pub fn pos(&self) -> f64 {
        self.x[0]
    }

    pub fn vel(&self) -> f64 {
        self.x[1]
    }

    pub fn pos_variance(&self) -> f64 {
        self.p[(0, 0)]
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use fieldsense_types::secs_to_ns;
    use std::f64::consts::PI;

    fn noise() -> AxisNoise {
        AxisNoise {
            process: 2000.0,
            measurement: 2.0,
            initial_velocity: 2000.0,
        }
    }

    #[test]
    fn converges_on_constant_velocity() {
        let mut axis = AxisFilter::new(0.0, 0, noise());
        for i in 1..=60 {
            let t = secs_to_ns(i as f64 / 60.0);
            axis.predict(t);
            axis.correct(1000.0 * i as f64 / 60.0);
        }
        assert_abs_diff_eq!(axis.vel(), 1000.0, epsilon = 20.0);
        assert_abs_diff_eq!(axis.pos(), 1000.0, epsilon = 5.0);
    }

    #[test]
    fn prediction_is_pure() {
        let mut axis = AxisFilter::new(0.0, 0, noise());
        axis.predict(secs_to_ns(0.1));
        axis.correct(100.0);
        let before = axis.clone();
        let (pos, _) = axis.prediction_at(secs_to_ns(0.5));
        assert!(pos.is_finite());
        assert_eq!(axis, before);
    }

    #[test]
    fn predicting_backwards_is_ignored() {
        let mut axis = AxisFilter::new(5.0, secs_to_ns(1.0), noise());
        axis.predict(secs_to_ns(0.5));
        assert_eq!(axis.timestamp(), secs_to_ns(1.0));
    }

    #[test]
    fn covariance_shrinks_with_measurements() {
        let mut axis = AxisFilter::new(0.0, 0, noise());
        axis.predict(secs_to_ns(0.5));
        let prior = axis.pos_variance();
        axis.correct(0.0);
        assert!(axis.pos_variance() < prior);
    }

    #[test]
    fn angular_axis_wraps_residual() {
        let mut axis = AxisFilter::angular(PI - 0.05, 0, AxisNoise {
            process: 10.0,
            measurement: 0.05,
            initial_velocity: 1.0,
        });
        assert_abs_diff_eq!(axis.innovation(-PI + 0.05), 0.1, epsilon = 1e-9);
        axis.correct(-PI + 0.05);
        assert!(axis.pos().abs() > PI - 0.1);
    }
}
