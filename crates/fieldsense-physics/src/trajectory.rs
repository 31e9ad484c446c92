//! The closed set of ball trajectory models.

use fieldsense_types::{BallTrajectoryState, KickEvent, KickKind};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::chipped::ChippedTrajectory;
use crate::params::BallParameters;
use crate::straight::StraightTrajectory;

/// Position, velocity and acceleration at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
    pub acc: Vector3<f64>,
}

/// A ball trajectory seeded from a [`BallTrajectoryState`].
///
/// Time arguments are seconds relative to the seeding state and may be
/// negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BallTrajectory {
    Straight(StraightTrajectory),
    Chipped { traj: ChippedTrajectory, spin: f64 },
}

impl BallTrajectory {
    pub fn from_state(state: &BallTrajectoryState, params: &BallParameters) -> Self {
        if state.chipped {
            Self::Chipped {
                traj: ChippedTrajectory::resume(state.pos, state.vel, state.spin, state.touchdowns, params),
                spin: state.spin,
            }
        } else {
            Self::Straight(StraightTrajectory::new(state.pos, state.vel, state.v_switch_to_roll, params))
        }
    }

    /// Straight kick from `pos` with ground velocity `vel` (mm/s).
    pub fn from_straight_kick(pos: Vector2<f64>, vel: Vector2<f64>, params: &BallParameters) -> Self {
        let v_switch = vel.norm() * params.k_switch;
        Self::Straight(StraightTrajectory::new(
            Vector3::new(pos.x, pos.y, 0.0),
            Vector3::new(vel.x, vel.y, 0.0),
            v_switch,
            params,
        ))
    }

    /// Chip kick from ground position `pos` with 3-D velocity `vel` (mm/s).
    pub fn from_chip_kick(pos: Vector2<f64>, vel: Vector3<f64>, params: &BallParameters) -> Self {
        Self::Chipped {
            traj: ChippedTrajectory::new(Vector3::new(pos.x, pos.y, 0.0), vel, 0.0, params),
            spin: 0.0,
        }
    }

    pub fn from_kick(kick: &KickEvent, params: &BallParameters) -> Self {
        match kick.kind {
            KickKind::Straight => Self::from_straight_kick(kick.position.xy(), kick.velocity.xy(), params),
            KickKind::Chip => Self::from_chip_kick(kick.position.xy(), kick.velocity, params),
        }
    }

    pub fn state_at(&self, t: f64) -> TrajectoryPoint {
        match self {
            Self::Straight(traj) => traj.state_at(t),
            Self::Chipped { traj, .. } => traj.state_at(t),
        }
    }

    pub fn pos_at(&self, t: f64) -> Vector3<f64> {
        self.state_at(t).pos
    }

    pub fn vel_at(&self, t: f64) -> Vector3<f64> {
        self.state_at(t).vel
    }

    /// The trajectory state at `t`, suitable for re-seeding a trajectory
    /// that continues identically.
    pub fn trajectory_state_at(&self, t: f64) -> BallTrajectoryState {
        let point = self.state_at(t);
        match self {
            Self::Straight(traj) => BallTrajectoryState {
                pos: point.pos,
                vel: point.vel,
                acc: point.acc,
                v_switch_to_roll: traj.v_switch(),
                chipped: false,
                spin: 0.0,
                touchdowns: 0,
            },
            Self::Chipped { traj, spin } => {
                let airborne = traj.is_airborne_at(t);
                let touchdowns = traj.touchdowns_at(t);
                BallTrajectoryState {
                    pos: point.pos,
                    vel: point.vel,
                    acc: point.acc,
                    v_switch_to_roll: if airborne { 0.0 } else { point.vel.xy().norm() },
                    chipped: true,
                    // The first touchdown (and with it the spin) only lies
                    // ahead while the ball has not touched down yet.
                    spin: if touchdowns == 0 { *spin } else { 0.0 },
                    touchdowns,
                }
            }
        }
    }

    pub fn is_chipped(&self) -> bool {
        matches!(self, Self::Chipped { .. })
    }

    /// `true` while a chipped ball is still hopping at `t`.
    pub fn is_airborne_at(&self, t: f64) -> bool {
        match self {
            Self::Straight(_) => false,
            Self::Chipped { traj, .. } => traj.is_airborne_at(t),
        }
    }

    /// Ground positions of every touchdown; empty for straight trajectories.
    pub fn touchdown_locations(&self) -> Vec<Vector2<f64>> {
        match self {
            Self::Straight(_) => Vec::new(),
            Self::Chipped { traj, .. } => traj.touchdown_locations(),
        }
    }

    /// Time (s) to travel `distance` mm on the ground plane, or
    /// `f64::INFINITY` when the ball stops short.
    pub fn time_by_dist(&self, distance: f64) -> f64 {
        match self {
            Self::Straight(traj) => traj.time_by_dist(distance),
            Self::Chipped { traj, .. } => traj.time_by_dist(distance),
        }
    }

    pub fn dist_by_time(&self, t: f64) -> f64 {
        match self {
            Self::Straight(traj) => traj.dist_by_time(t),
            Self::Chipped { traj, .. } => traj.dist_by_time(t),
        }
    }

    /// Ground speed (mm/s) after `distance` mm, zero when unreachable.
    pub fn vel_by_dist(&self, distance: f64) -> f64 {
        match self {
            Self::Straight(traj) => traj.vel_by_dist(distance),
            Self::Chipped { traj, .. } => traj.vel_by_dist(distance),
        }
    }

    pub fn total_time(&self) -> f64 {
        match self {
            Self::Straight(traj) => traj.total_time(),
            Self::Chipped { traj, .. } => traj.total_time(),
        }
    }

    /// Where the ball comes to rest.
    pub fn final_pos(&self) -> Vector3<f64> {
        self.pos_at(self.total_time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn kick_trajectory_starts_at_kick_position() {
        let params = BallParameters::default();
        let kick = KickEvent {
            kind: KickKind::Chip,
            position: Vector3::new(100.0, -200.0, 0.0),
            velocity: Vector3::new(2000.0, 0.0, 2000.0),
            kicking_bot: fieldsense_types::BotId::yellow(1),
            timestamp: 0,
        };
        let traj = BallTrajectory::from_kick(&kick, &params);
        assert!(traj.is_chipped());
        let p = traj.pos_at(0.0);
        assert_abs_diff_eq!(p.x, 100.0);
        assert_abs_diff_eq!(p.y, -200.0);
    }

    #[test]
    fn reseeded_trajectory_continues_identically() {
        let params = BallParameters::default();
        for traj in [
            BallTrajectory::from_straight_kick(Vector2::zeros(), Vector2::new(4000.0, 1000.0), &params),
            BallTrajectory::from_chip_kick(Vector2::zeros(), Vector3::new(2000.0, 0.0, 3000.0), &params),
        ] {
            let state = traj.trajectory_state_at(0.3);
            assert!(state.validate().is_ok());
            let reseeded = BallTrajectory::from_state(&state, &params);
            let a = traj.pos_at(0.8);
            let b = reseeded.pos_at(0.5);
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn reseeding_after_a_touchdown_keeps_the_hop_count() {
        let params = BallParameters::default();
        let traj = BallTrajectory::from_chip_kick(Vector2::zeros(), Vector3::new(2000.0, 0.0, 3000.0), &params);
        let first_touchdown = match &traj {
            BallTrajectory::Chipped { traj, .. } => traj.hops()[0].t_end,
            BallTrajectory::Straight(_) => unreachable!(),
        };
        let t = first_touchdown + 0.1;
        let state = traj.trajectory_state_at(t);
        assert_eq!(state.touchdowns, 1);

        let reseeded = BallTrajectory::from_state(&state, &params);
        let a = traj.state_at(t + 0.6);
        let b = reseeded.state_at(0.6);
        assert_abs_diff_eq!(a.pos, b.pos, epsilon = 1e-6);
        assert_abs_diff_eq!(a.vel, b.vel, epsilon = 1e-6);
    }

    #[test]
    fn straight_trajectory_has_no_touchdowns() {
        let params = BallParameters::default();
        let traj = BallTrajectory::from_straight_kick(Vector2::zeros(), Vector2::new(1000.0, 0.0), &params);
        assert!(traj.touchdown_locations().is_empty());
        assert!(traj.final_pos().x > 0.0);
    }
}
