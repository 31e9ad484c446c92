//! Chipped trajectory: a sequence of ballistic hops, each ending in a
//! damped touchdown, followed by a rolling phase once the hops become too
//! low to matter.

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::GRAVITY_MM;
use crate::params::BallParameters;
use crate::straight::StraightTrajectory;
use crate::trajectory::TrajectoryPoint;

/// One ballistic segment between two touchdowns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    /// Segment start (s, relative to the trajectory origin).
    pub t_start: f64,
    /// Touchdown time (s).
    pub t_end: f64,
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
}

impl Hop {
    fn point_at(&self, t: f64) -> TrajectoryPoint {
        let tau = t - self.t_start;
        let z = self.pos.z + self.vel.z * tau - 0.5 * GRAVITY_MM * tau * tau;
        TrajectoryPoint {
            pos: Vector3::new(self.pos.x + self.vel.x * tau, self.pos.y + self.vel.y * tau, z.max(0.0)),
            vel: Vector3::new(self.vel.x, self.vel.y, self.vel.z - GRAVITY_MM * tau),
            acc: Vector3::new(0.0, 0.0, -GRAVITY_MM),
        }
    }

    /// Highest point of this hop above the field (mm).
    pub fn apex(&self) -> f64 {
        self.pos.z + self.vel.z.max(0.0).powi(2) / (2.0 * GRAVITY_MM)
    }

    fn landing(&self) -> Vector2<f64> {
        let dt = self.t_end - self.t_start;
        self.pos.xy() + self.vel.xy() * dt
    }

    fn ground_distance(&self) -> f64 {
        self.vel.xy().norm() * (self.t_end - self.t_start)
    }
}

/// Hops plus the final roll. All hops are simulated at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChippedTrajectory {
    hops: Vec<Hop>,
    roll: StraightTrajectory,
    t_roll_start: f64,
    /// Touchdowns taken before this trajectory's origin.
    touchdowns_before: usize,
}

impl ChippedTrajectory {
    /// A chip leaving the robot: no touchdown taken yet.
    pub fn new(pos: Vector3<f64>, vel: Vector3<f64>, spin: f64, params: &BallParameters) -> Self {
        Self::resume(pos, vel, spin, 0, params)
    }

    /// Continue a chip that has already touched down `touchdowns` times.
    ///
    /// Damping at the next touchdown depends on how many came before, and a
    /// ball seeded in mid-air finishes its current hop even when the rest of
    /// that hop is lower than `min_hop_height`.
    pub fn resume(
        pos: Vector3<f64>,
        vel: Vector3<f64>,
        spin: f64,
        touchdowns: usize,
        params: &BallParameters,
    ) -> Self {
        let mut p = Vector3::new(pos.x, pos.y, pos.z.max(0.0));
        let mut v = vel;
        let mut t = 0.0;
        let mut hops = Vec::new();
        let mut in_flight = p.z > 0.0;

        while touchdowns + hops.len() < params.max_hops {
            let hop_apex = p.z + v.z.max(0.0).powi(2) / (2.0 * GRAVITY_MM);
            if !in_flight && hop_apex < params.min_hop_height {
                break;
            }
            in_flight = false;
            let flight = (v.z + (v.z * v.z + 2.0 * GRAVITY_MM * p.z).sqrt()) / GRAVITY_MM;
            if !(flight > 0.0) {
                break;
            }
            let hop = Hop {
                t_start: t,
                t_end: t + flight,
                pos: p,
                vel: v,
            };
            let landing = hop.landing();
            let damp_xy = params.damping_xy(touchdowns + hops.len(), spin);
            let vz_in = v.z - GRAVITY_MM * flight;
            p = Vector3::new(landing.x, landing.y, 0.0);
            v = Vector3::new(v.x * damp_xy, v.y * damp_xy, -vz_in * params.chip_damping_z);
            t += flight;
            hops.push(hop);
        }

        // After the last touchdown the ball rolls without sliding.
        let speed = v.xy().norm();
        let roll = StraightTrajectory::new(Vector3::new(p.x, p.y, 0.0), Vector3::new(v.x, v.y, 0.0), speed, params);
        Self {
            hops,
            roll,
            t_roll_start: t,
            touchdowns_before: touchdowns,
        }
    }

    pub fn state_at(&self, t: f64) -> TrajectoryPoint {
        if let Some(first) = self.hops.first()
            && t < first.t_start
        {
            return first.point_at(t);
        }
        if let Some(hop) = self.hops.iter().find(|h| t < h.t_end) {
            return hop.point_at(t);
        }
        self.roll.state_at(t - self.t_roll_start)
    }

    /// `true` while the ball is still in a hop at time `t`.
    pub fn is_airborne_at(&self, t: f64) -> bool {
        t < self.t_roll_start
    }

    /// Touchdowns taken up to `t`, counting those before the origin.
    pub fn touchdowns_at(&self, t: f64) -> usize {
        self.touchdowns_before + self.hops.iter().filter(|h| h.t_end <= t).count()
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    /// Ground positions of every touchdown, in order.
    pub fn touchdown_locations(&self) -> Vec<Vector2<f64>> {
        self.hops.iter().map(Hop::landing).collect()
    }

    /// Highest point of the whole trajectory (mm).
    pub fn max_height(&self) -> f64 {
        self.hops.iter().map(Hop::apex).fold(0.0, f64::max)
    }

    pub fn time_by_dist(&self, distance: f64) -> f64 {
        if distance <= 0.0 {
            return 0.0;
        }
        let mut covered = 0.0;
        for hop in &self.hops {
            let hop_dist = hop.ground_distance();
            let speed = hop.vel.xy().norm();
            if speed > 0.0 && distance <= covered + hop_dist {
                return hop.t_start + (distance - covered) / speed;
            }
            covered += hop_dist;
        }
        self.t_roll_start + self.roll.time_by_dist(distance - covered)
    }

    pub fn dist_by_time(&self, t: f64) -> f64 {
        let mut covered = 0.0;
        for hop in &self.hops {
            if t < hop.t_end {
                let tau = t - hop.t_start;
                return covered + hop.vel.xy().norm() * tau;
            }
            covered += hop.ground_distance();
        }
        covered + self.roll.dist_by_time(t - self.t_roll_start)
    }

    pub fn vel_by_dist(&self, distance: f64) -> f64 {
        let t = self.time_by_dist(distance);
        if t.is_finite() { self.state_at(t).vel.xy().norm() } else { 0.0 }
    }

    pub fn total_time(&self) -> f64 {
        self.t_roll_start + self.roll.total_time()
    }

    /// Time at which the ball stops hopping.
    pub fn roll_start(&self) -> f64 {
        self.t_roll_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn chip(vxy: f64, vz: f64) -> ChippedTrajectory {
        ChippedTrajectory::new(Vector3::zeros(), Vector3::new(vxy, 0.0, vz), 0.0, &BallParameters::default())
    }

    #[test]
    fn first_hop_matches_ballistic_flight() {
        let traj = chip(2000.0, 3000.0);
        let flight = 2.0 * 3000.0 / GRAVITY_MM;
        let hops = traj.hops();
        assert!(hops.len() > 1);
        assert_abs_diff_eq!(hops[0].t_end, flight, epsilon = 1e-9);
        let touchdowns = traj.touchdown_locations();
        assert_abs_diff_eq!(touchdowns[0].x, 2000.0 * flight, epsilon = 1e-6);
        assert_abs_diff_eq!(traj.max_height(), 3000.0 * 3000.0 / (2.0 * GRAVITY_MM), epsilon = 1e-6);
    }

    #[test]
    fn later_hops_are_damped() {
        let traj = chip(2000.0, 3000.0);
        let hops = traj.hops();
        assert_abs_diff_eq!(hops[1].vel.x, 1500.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hops[1].vel.z, 1500.0, epsilon = 1e-6);
        assert!(hops[1].apex() < hops[0].apex());
        for hop in &hops[1..] {
            assert!(hop.apex() >= BallParameters::default().min_hop_height);
        }
    }

    #[test]
    fn ball_rolls_after_hops() {
        let traj = chip(2000.0, 3000.0);
        let t = traj.roll_start() + 0.5;
        assert!(!traj.is_airborne_at(t));
        let state = traj.state_at(t);
        assert_eq!(state.pos.z, 0.0);
        assert_eq!(state.vel.z, 0.0);
        assert!(state.vel.x > 0.0);
    }

    #[test]
    fn distance_and_time_agree_across_phases() {
        let traj = chip(2000.0, 3000.0);
        for t in [0.1, 0.7, traj.roll_start() + 1.0] {
            let d = traj.dist_by_time(t);
            assert_abs_diff_eq!(traj.time_by_dist(d), t, epsilon = 1e-6);
        }
    }

    #[test]
    fn full_spin_keeps_first_hop_speed() {
        let params = BallParameters::default();
        let traj = ChippedTrajectory::new(Vector3::zeros(), Vector3::new(2000.0, 0.0, 3000.0), 1.0, &params);
        assert_abs_diff_eq!(traj.hops()[1].vel.x, 2000.0, epsilon = 1e-9);
    }

    #[test]
    fn resumed_after_first_touchdown_uses_later_hop_damping() {
        let params = BallParameters::default();
        let traj = chip(2000.0, 3000.0);
        let t = traj.hops()[0].t_end + 0.1;
        assert_eq!(traj.touchdowns_at(t), 1);

        let point = traj.state_at(t);
        let resumed = ChippedTrajectory::resume(point.pos, point.vel, 0.0, 1, &params);
        assert_abs_diff_eq!(resumed.hops()[1].vel.x, point.vel.x * params.chip_damping_xy_other_hops, epsilon = 1e-9);
        assert_eq!(resumed.touchdowns_at(0.0), 1);
        for dt in [0.2, 0.6, 1.5] {
            assert_abs_diff_eq!(resumed.state_at(dt).pos, traj.state_at(t + dt).pos, epsilon = 1e-6);
        }
    }

    #[test]
    fn low_remainder_of_a_hop_is_still_flown() {
        let params = BallParameters::default();
        let traj = chip(2000.0, 3000.0);
        // Just before the first touchdown only a few mm of height are left.
        let t = traj.hops()[0].t_end - 0.002;
        let point = traj.state_at(t);
        assert!(point.pos.z < params.min_hop_height);

        let resumed = ChippedTrajectory::resume(point.pos, point.vel, 0.0, 0, &params);
        assert_abs_diff_eq!(resumed.hops()[0].t_end, 0.002, epsilon = 1e-7);
        assert_abs_diff_eq!(resumed.state_at(0.3).pos, traj.state_at(t + 0.3).pos, epsilon = 1e-6);
    }

    #[test]
    fn flat_chip_is_just_a_roll() {
        let traj = chip(1000.0, 0.0);
        assert!(traj.hops().is_empty());
        assert_eq!(traj.roll_start(), 0.0);
    }
}
