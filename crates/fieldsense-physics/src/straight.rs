//! Two-phase ground trajectory: the ball slides with high friction until its
//! speed drops to the switch velocity, then rolls with low friction until it
//! stops.

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::params::BallParameters;
use crate::time_for_distance;
use crate::trajectory::TrajectoryPoint;

/// Straight-line ground trajectory.
///
/// Phase boundaries are computed once in [`StraightTrajectory::new`]; every
/// query afterwards is closed-form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StraightTrajectory {
    initial_pos: Vector3<f64>,
    /// Unit direction of travel, zero when the ball is at rest.
    dir: Vector2<f64>,
    v0: f64,
    v_switch: f64,
    acc_slide: f64,
    acc_roll: f64,
    t_switch: f64,
    s_switch: f64,
    t_stop: f64,
    s_stop: f64,
}

impl StraightTrajectory {
    /// Build a trajectory from a ground position, a velocity (only `x`/`y`
    /// are used) and the speed at which sliding turns into rolling.
    pub fn new(pos: Vector3<f64>, vel: Vector3<f64>, v_switch: f64, params: &BallParameters) -> Self {
        let vel_xy = vel.xy();
        let v0 = vel_xy.norm();
        let dir = if v0 > 1e-9 { vel_xy / v0 } else { Vector2::zeros() };
        let v_switch = v_switch.max(0.0);

        let (t_switch, s_switch) = if v_switch < v0 {
            let t = (v_switch - v0) / params.acc_slide;
            (t, v0 * t + 0.5 * params.acc_slide * t * t)
        } else {
            (0.0, 0.0)
        };
        let v_roll = v0.min(v_switch);
        let t_roll = -v_roll / params.acc_roll;
        let s_roll = v_roll * t_roll + 0.5 * params.acc_roll * t_roll * t_roll;

        Self {
            initial_pos: pos,
            dir,
            v0,
            v_switch,
            acc_slide: params.acc_slide,
            acc_roll: params.acc_roll,
            t_switch,
            s_switch,
            t_stop: t_switch + t_roll,
            s_stop: s_switch + s_roll,
        }
    }

    /// Speed, travelled distance and scalar acceleration at time `t`.
    ///
    /// Negative `t` runs the first phase backwards.
    fn kinematics(&self, t: f64) -> (f64, f64, f64) {
        if self.v0 <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        if t < 0.0 {
            let a = if self.t_switch > 0.0 { self.acc_slide } else { self.acc_roll };
            return (self.v0 + a * t, self.v0 * t + 0.5 * a * t * t, a);
        }
        if t < self.t_switch {
            let v = self.v0 + self.acc_slide * t;
            let s = self.v0 * t + 0.5 * self.acc_slide * t * t;
            return (v, s, self.acc_slide);
        }
        if t < self.t_stop {
            let tr = t - self.t_switch;
            let v_roll = self.v0.min(self.v_switch);
            let v = v_roll + self.acc_roll * tr;
            let s = self.s_switch + v_roll * tr + 0.5 * self.acc_roll * tr * tr;
            return (v, s, self.acc_roll);
        }
        (0.0, self.s_stop, 0.0)
    }

    pub fn state_at(&self, t: f64) -> TrajectoryPoint {
        let (v, s, a) = self.kinematics(t);
        let offset = self.dir * s;
        TrajectoryPoint {
            pos: Vector3::new(
                self.initial_pos.x + offset.x,
                self.initial_pos.y + offset.y,
                self.initial_pos.z,
            ),
            vel: Vector3::new(self.dir.x * v, self.dir.y * v, 0.0),
            acc: Vector3::new(self.dir.x * a, self.dir.y * a, 0.0),
        }
    }

    /// Time (s) until the ball has travelled `distance` mm, or
    /// `f64::INFINITY` if it stops short.
    pub fn time_by_dist(&self, distance: f64) -> f64 {
        if distance <= 0.0 {
            return 0.0;
        }
        if distance > self.s_stop + 1e-9 {
            return f64::INFINITY;
        }
        if distance < self.s_switch {
            return time_for_distance(self.v0, self.acc_slide, distance);
        }
        let v_roll = self.v0.min(self.v_switch);
        let t = time_for_distance(v_roll, self.acc_roll, distance - self.s_switch);
        if t.is_finite() {
            self.t_switch + t
        } else {
            self.t_stop
        }
    }

    /// Distance (mm) travelled after `t` seconds.
    pub fn dist_by_time(&self, t: f64) -> f64 {
        self.kinematics(t).1
    }

    /// Speed (mm/s) when the ball has travelled `distance`, zero when it
    /// stops short.
    pub fn vel_by_dist(&self, distance: f64) -> f64 {
        let t = self.time_by_dist(distance);
        if t.is_finite() { self.kinematics(t).0.max(0.0) } else { 0.0 }
    }

    /// Time (s) until the ball comes to rest.
    pub fn total_time(&self) -> f64 {
        self.t_stop
    }

    /// Distance (mm) covered until the ball comes to rest.
    pub fn total_distance(&self) -> f64 {
        self.s_stop
    }

    /// Time (s) at which sliding turns into rolling.
    pub fn switch_time(&self) -> f64 {
        self.t_switch
    }

    pub fn v_switch(&self) -> f64 {
        self.v_switch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn kick(speed: f64) -> StraightTrajectory {
        let params = BallParameters::default();
        StraightTrajectory::new(
            Vector3::zeros(),
            Vector3::new(speed, 0.0, 0.0),
            speed * params.k_switch,
            &params,
        )
    }

    #[test]
    fn slide_then_roll_then_stop() {
        let traj = kick(4000.0);
        // v_switch = 2560; slide takes (2560 - 4000) / -3000 = 0.48 s
        assert_abs_diff_eq!(traj.switch_time(), 0.48, epsilon = 1e-9);
        assert_abs_diff_eq!(traj.state_at(0.2).acc.x, -3000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(traj.state_at(1.0).acc.x, -260.0, epsilon = 1e-9);
        // roll takes 2560 / 260 s
        assert_abs_diff_eq!(traj.total_time(), 0.48 + 2560.0 / 260.0, epsilon = 1e-9);
        let end = traj.state_at(100.0);
        assert_eq!(end.vel, Vector3::zeros());
        assert_abs_diff_eq!(end.pos.x, traj.total_distance(), epsilon = 1e-9);
    }

    #[test]
    fn time_and_distance_are_inverse() {
        let traj = kick(5000.0);
        for t in [0.1, 0.4, 1.0, 3.0] {
            let d = traj.dist_by_time(t);
            assert_abs_diff_eq!(traj.time_by_dist(d), t, epsilon = 1e-6);
        }
    }

    #[test]
    fn unreachable_distance_takes_forever() {
        let traj = kick(1000.0);
        assert!(traj.time_by_dist(traj.total_distance() + 10.0).is_infinite());
        assert_eq!(traj.vel_by_dist(traj.total_distance() + 10.0), 0.0);
    }

    #[test]
    fn negative_time_runs_backwards() {
        let traj = kick(2000.0);
        let past = traj.state_at(-0.1);
        assert!(past.pos.x < 0.0);
        assert!(past.vel.x > 2000.0);
    }

    #[test]
    fn ball_at_rest_stays_put() {
        let params = BallParameters::default();
        let traj = StraightTrajectory::new(Vector3::new(10.0, 20.0, 0.0), Vector3::zeros(), 0.0, &params);
        assert_eq!(traj.state_at(1.0).pos, Vector3::new(10.0, 20.0, 0.0));
        assert_eq!(traj.total_time(), 0.0);
    }
}
