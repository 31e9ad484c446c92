//! Ball state, kick events and model-identification results.

use std::collections::BTreeMap;

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::VisionError;
use crate::ids::BotId;
use crate::Timestamp;

/// Physical state of the ball that seeds the trajectory model.
///
/// All values are in milli units: mm, mm/s, mm/s².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallTrajectoryState {
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
    pub acc: Vector3<f64>,
    /// Speed below which a straight ball stops sliding and starts rolling
    /// (mm/s). Must be finite and non-negative.
    pub v_switch_to_roll: f64,
    /// The ball was chipped. This does not imply it is still airborne.
    pub chipped: bool,
    /// Fraction of the ball's motion already converted into rolling spin,
    /// in `[0, 1]`.
    pub spin: f64,
    /// Touchdowns a chipped ball has already taken.
    #[serde(default)]
    pub touchdowns: usize,
}

impl Default for BallTrajectoryState {
    fn default() -> Self {
        Self {
            pos: Vector3::zeros(),
            vel: Vector3::zeros(),
            acc: Vector3::zeros(),
            v_switch_to_roll: 0.0,
            chipped: false,
            spin: 0.0,
            touchdowns: 0,
        }
    }
}

impl BallTrajectoryState {
    /// Check the invariants every committed ball state must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::InvalidBallState`] when the switch-to-roll
    /// velocity is negative or not finite, or when position / velocity /
    /// acceleration contain non-finite components.
    pub fn validate(&self) -> Result<(), VisionError> {
        if !self.v_switch_to_roll.is_finite() || self.v_switch_to_roll < 0.0 {
            return Err(VisionError::InvalidBallState(format!(
                "v_switch_to_roll must be finite and non-negative, got {}",
                self.v_switch_to_roll
            )));
        }
        let finite = |v: &Vector3<f64>| v.iter().all(|c| c.is_finite());
        if !finite(&self.pos) || !finite(&self.vel) || !finite(&self.acc) {
            return Err(VisionError::InvalidBallState(
                "position, velocity and acceleration must be finite".to_string(),
            ));
        }
        if !self.spin.is_finite() {
            return Err(VisionError::InvalidBallState(format!(
                "spin must be finite, got {}",
                self.spin
            )));
        }
        Ok(())
    }

    /// Ground-plane position (mm).
    pub fn pos_xy(&self) -> Vector2<f64> {
        self.pos.xy()
    }

    /// Ground-plane velocity (mm/s).
    pub fn vel_xy(&self) -> Vector2<f64> {
        self.vel.xy()
    }
}

/// Straight (rolling) or chip (airborne) kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KickKind {
    Straight,
    Chip,
}

/// A detected kick: a sudden velocity change caused by robot contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KickEvent {
    pub kind: KickKind,
    /// Ball position at the kick (mm).
    pub position: Vector3<f64>,
    /// Ball velocity right after the kick (mm/s).
    pub velocity: Vector3<f64>,
    pub kicking_bot: BotId,
    pub timestamp: Timestamp,
}

/// Result of fitting the ball model to a completed kick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallModelIdentResult {
    pub kind: KickKind,
    pub kick_timestamp: Timestamp,
    pub kick_position: Vector2<f64>,
    /// Ground-plane kick speed (mm/s).
    pub kick_speed: f64,
    /// Number of observations that went into the fit.
    pub samples: usize,
    /// Identified model parameters by name, e.g. `acc_roll` (mm/s²).
    pub parameters: BTreeMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_valid() {
        assert!(BallTrajectoryState::default().validate().is_ok());
    }

    #[test]
    fn negative_switch_velocity_is_rejected() {
        let state = BallTrajectoryState {
            v_switch_to_roll: -1.0,
            ..Default::default()
        };
        assert!(matches!(state.validate(), Err(VisionError::InvalidBallState(_))));
    }

    #[test]
    fn non_finite_switch_velocity_is_rejected() {
        for v in [f64::NAN, f64::INFINITY] {
            let state = BallTrajectoryState {
                v_switch_to_roll: v,
                ..Default::default()
            };
            assert!(state.validate().is_err(), "{v} must be rejected");
        }
    }

    #[test]
    fn non_finite_velocity_is_rejected() {
        let state = BallTrajectoryState {
            vel: Vector3::new(f64::NAN, 0.0, 0.0),
            ..Default::default()
        };
        assert!(state.validate().is_err());
    }
}
