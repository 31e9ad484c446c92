//! The fused ball as published in every frame.

use fieldsense_types::{BallTrajectoryState, Timestamp, VisionError, ns_to_secs};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::params::BallParameters;
use crate::trajectory::BallTrajectory;

/// Seconds of invisibility after which the ball quality reaches zero.
const QUALITY_DECAY_SECS: f64 = 0.2;

/// Filtered ball state at `timestamp`, plus when it was last seen.
///
/// Construction validates the state, so every instance satisfies the
/// [`BallTrajectoryState`] invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredVisionBall {
    timestamp: Timestamp,
    state: BallTrajectoryState,
    last_visible_timestamp: Timestamp,
}

impl Default for FilteredVisionBall {
    fn default() -> Self {
        Self {
            timestamp: 0,
            state: BallTrajectoryState::default(),
            last_visible_timestamp: 0,
        }
    }
}

impl FilteredVisionBall {
    /// # Errors
    ///
    /// [`VisionError::InvalidBallState`] when `state` violates its
    /// invariants.
    pub fn new(
        timestamp: Timestamp,
        state: BallTrajectoryState,
        last_visible_timestamp: Timestamp,
    ) -> Result<Self, VisionError> {
        state.validate()?;
        Ok(Self {
            timestamp,
            state,
            last_visible_timestamp,
        })
    }

    /// A ball seen right now.
    pub fn visible(timestamp: Timestamp, state: BallTrajectoryState) -> Result<Self, VisionError> {
        Self::new(timestamp, state, timestamp)
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn last_visible_timestamp(&self) -> Timestamp {
        self.last_visible_timestamp
    }

    pub fn state(&self) -> &BallTrajectoryState {
        &self.state
    }

    pub fn pos(&self) -> Vector3<f64> {
        self.state.pos
    }

    pub fn pos_xy(&self) -> Vector2<f64> {
        self.state.pos_xy()
    }

    pub fn vel(&self) -> Vector3<f64> {
        self.state.vel
    }

    pub fn acc(&self) -> Vector3<f64> {
        self.state.acc
    }

    pub fn height(&self) -> f64 {
        self.state.pos.z
    }

    pub fn is_chipped(&self) -> bool {
        self.state.chipped
    }

    pub fn v_switch_to_roll(&self) -> f64 {
        self.state.v_switch_to_roll
    }

    /// Seconds since the ball was last seen by any camera.
    pub fn invisible_for(&self) -> f64 {
        ns_to_secs(self.timestamp - self.last_visible_timestamp).max(0.0)
    }

    /// Seen within the last `horizon` seconds.
    pub fn is_on_cam(&self, horizon: f64) -> bool {
        self.invisible_for() < horizon
    }

    /// `1` while visible, decaying linearly to `0` after 200 ms of
    /// invisibility.
    pub fn quality(&self) -> f64 {
        1.0 - (self.invisible_for() / QUALITY_DECAY_SECS).min(1.0)
    }

    pub fn trajectory(&self, params: &BallParameters) -> BallTrajectory {
        BallTrajectory::from_state(&self.state, params)
    }

    /// The ball as the model predicts it at `t_future`. Returns an unchanged
    /// copy when `t_future` is not after [`Self::timestamp`].
    pub fn extrapolate(&self, t_future: Timestamp, params: &BallParameters) -> Self {
        if t_future <= self.timestamp {
            return self.clone();
        }
        let dt = ns_to_secs(t_future - self.timestamp);
        Self {
            timestamp: t_future,
            state: self.trajectory(params).trajectory_state_at(dt),
            last_visible_timestamp: self.last_visible_timestamp,
        }
    }
}
