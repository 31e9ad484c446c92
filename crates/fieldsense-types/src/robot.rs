//! Robot auxiliary info and the fused robot state.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::ids::{BotId, CameraId};
use crate::{normalize_angle, ns_to_secs, Timestamp};

/// Per-robot auxiliary information supplied by the control-feedback
/// subsystem. Only used to correlate kicks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotInfo {
    pub bot_id: BotId,
    /// Distance from the robot centre to the ball contact point (mm).
    #[serde(default = "default_center_to_dribbler")]
    pub center_to_dribbler: f64,
    /// The robot armed its chip kicker.
    #[serde(default)]
    pub chip_armed: bool,
    /// Commanded kick speed (mm/s), `0` when no kick is armed.
    #[serde(default)]
    pub kick_speed: f64,
}

fn default_center_to_dribbler() -> f64 {
    75.0
}

impl RobotInfo {
    pub fn new(bot_id: BotId) -> Self {
        Self {
            bot_id,
            center_to_dribbler: default_center_to_dribbler(),
            chip_armed: false,
            kick_speed: 0.0,
        }
    }
}

/// Fused, filtered state of one robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredVisionBot {
    pub bot_id: BotId,
    pub timestamp: Timestamp,
    /// Position (mm).
    pub pos: Vector2<f64>,
    /// Velocity (mm/s).
    pub vel: Vector2<f64>,
    /// Heading (rad).
    pub orientation: f64,
    /// Angular velocity (rad/s).
    pub angular_vel: f64,
    /// Position uncertainty of the selected tracker (mm).
    pub uncertainty: f64,
    /// Camera whose tracker won the merge.
    pub camera_id: CameraId,
}

impl FilteredVisionBot {
    /// Advance the state from `t_now` to `t_future` with the constant
    /// velocity model. Returns an unchanged copy when `t_future <= t_now`.
    pub fn extrapolate(&self, t_now: Timestamp, t_future: Timestamp) -> Self {
        if t_future <= t_now {
            return self.clone();
        }
        let dt = ns_to_secs(t_future - t_now);
        Self {
            timestamp: t_future,
            pos: self.pos + self.vel * dt,
            orientation: normalize_angle(self.orientation + self.angular_vel * dt),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn bot() -> FilteredVisionBot {
        FilteredVisionBot {
            bot_id: BotId::blue(5),
            timestamp: 1_000_000_000,
            pos: Vector2::new(0.0, 0.0),
            vel: Vector2::new(1000.0, -500.0),
            orientation: 0.0,
            angular_vel: 1.0,
            uncertainty: 5.0,
            camera_id: 0,
        }
    }

    #[test]
    fn extrapolate_applies_constant_velocity() {
        let b = bot();
        let e = b.extrapolate(b.timestamp, b.timestamp + 500_000_000);
        assert_abs_diff_eq!(e.pos.x, 500.0, epsilon = 1e-9);
        assert_abs_diff_eq!(e.pos.y, -250.0, epsilon = 1e-9);
        assert_abs_diff_eq!(e.orientation, 0.5, epsilon = 1e-9);
        assert_eq!(e.timestamp, b.timestamp + 500_000_000);
    }

    #[test]
    fn extrapolate_to_same_time_is_identity() {
        let b = bot();
        assert_eq!(b.extrapolate(b.timestamp, b.timestamp), b);
    }
}
