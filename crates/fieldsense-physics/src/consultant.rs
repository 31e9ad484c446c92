//! Inverse ball physics: kick speeds for target distances and times.
//!
//! Planners ask these questions, the filter itself never does. Straight
//! queries invert the two-phase model numerically; chip queries use the
//! closed-form fixed-loss hop model.

use fieldsense_types::VisionError;
use nalgebra::{Vector2, Vector3};

use crate::params::BallParameters;
use crate::trajectory::BallTrajectory;
use crate::GRAVITY_M;

const BISECTION_STEPS: usize = 100;
const MAX_KICK_SPEED: f64 = 100_000.0;

/// Smallest `v` in `[0, MAX_KICK_SPEED]` for which `reaches(v)` holds,
/// assuming `reaches` is monotone in `v`.
fn bisect(reaches: impl Fn(f64) -> bool) -> Option<f64> {
    if !reaches(MAX_KICK_SPEED) {
        return None;
    }
    let (mut lo, mut hi) = (0.0, MAX_KICK_SPEED);
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if reaches(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Some(hi)
}

// ────────────────────────────────────────────────────────────────────────────
// Straight kicks
// ────────────────────────────────────────────────────────────────────────────

/// Inverse queries for flat kicks.
#[derive(Debug, Clone, Default)]
pub struct StraightConsultant {
    params: BallParameters,
}

impl StraightConsultant {
    pub fn new(params: BallParameters) -> Self {
        Self { params }
    }

    fn kick(&self, kick_speed: f64) -> BallTrajectory {
        BallTrajectory::from_straight_kick(Vector2::zeros(), Vector2::new(kick_speed.max(0.0), 0.0), &self.params)
    }

    /// Time (s) a ball kicked at `kick_speed` (mm/s) needs to cover
    /// `distance` (mm); infinite when it stops short.
    pub fn time_for_kick(&self, distance: f64, kick_speed: f64) -> f64 {
        self.kick(kick_speed).time_by_dist(distance)
    }

    /// Ball speed (mm/s) after `distance` mm, zero when unreachable.
    pub fn vel_for_kick(&self, distance: f64, kick_speed: f64) -> f64 {
        self.kick(kick_speed).vel_by_dist(distance)
    }

    /// Ball speed (mm/s) `time` seconds after the kick.
    pub fn vel_for_kick_by_time(&self, kick_speed: f64, time: f64) -> f64 {
        self.kick(kick_speed).vel_at(time.max(0.0)).xy().norm()
    }

    /// Distance (mm) at which a ball kicked at `kick_speed` comes to rest.
    pub fn max_distance(&self, kick_speed: f64) -> f64 {
        let traj = self.kick(kick_speed);
        traj.dist_by_time(traj.total_time())
    }

    /// Kick speed (mm/s) that covers `distance` in exactly `time` seconds.
    ///
    /// Returns `None` for a non-positive `time` or when no kick below
    /// 100 m/s gets there in time.
    pub fn init_vel_for_time_dist(&self, distance: f64, time: f64) -> Option<f64> {
        if distance <= 0.0 {
            return Some(0.0);
        }
        if time <= 0.0 {
            return None;
        }
        bisect(|v| self.kick(v).dist_by_time(time) >= distance)
    }

    /// Kick speed (mm/s) so that the ball still moves at `final_vel` after
    /// `distance` mm.
    pub fn init_vel_for_dist(&self, distance: f64, final_vel: f64) -> Option<f64> {
        if distance <= 0.0 {
            return Some(final_vel.max(0.0));
        }
        bisect(|v| {
            let traj = self.kick(v);
            traj.time_by_dist(distance).is_finite() && traj.vel_by_dist(distance) >= final_vel
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Chip kicks
// ────────────────────────────────────────────────────────────────────────────

/// Inverse queries for chip kicks with a fixed launch angle.
///
/// Every hop loses a fixed share of its horizontal and vertical speed; the
/// closed-form answers are computed in metres and returned in millimetres.
#[derive(Debug, Clone)]
pub struct ChipConsultant {
    params: BallParameters,
    chip_angle: f64,
}

impl Default for ChipConsultant {
    fn default() -> Self {
        Self::new(BallParameters::default())
    }
}

impl ChipConsultant {
    /// Consultant with the default 45° launch angle.
    pub fn new(params: BallParameters) -> Self {
        Self {
            params,
            chip_angle: 45f64.to_radians(),
        }
    }

    pub fn with_chip_angle(mut self, degrees: f64) -> Self {
        self.chip_angle = degrees.to_radians();
        self
    }

    pub fn chip_angle(&self) -> f64 {
        self.chip_angle
    }

    /// Launch velocity (mm/s) for a kick of absolute `speed` along the
    /// ground direction `direction` (radians).
    pub fn speed_to_vel(&self, direction: f64, speed: f64) -> Vector3<f64> {
        let horizontal = self.chip_angle.cos() * speed;
        Vector3::new(
            direction.cos() * horizontal,
            direction.sin() * horizontal,
            self.chip_angle.sin() * speed,
        )
    }

    fn kick(&self, kick_speed: f64) -> BallTrajectory {
        BallTrajectory::from_chip_kick(Vector2::zeros(), self.speed_to_vel(0.0, kick_speed), &self.params)
    }

    /// Kick speed (mm/s) that lands the ball at `distance` (mm) on touchdown
    /// number `num_touchdown` (0 is the first landing).
    ///
    /// # Errors
    ///
    /// [`VisionError::InvalidConfiguration`] when the damping coefficients
    /// make the hop sum non-positive.
    pub fn init_vel_for_dist_at_touchdown(&self, distance: f64, num_touchdown: usize) -> Result<f64, VisionError> {
        let damp_first = self.params.chip_damping_xy_first_hop * self.params.chip_damping_z;
        let damp_other = self.params.chip_damping_xy_other_hops * self.params.chip_damping_z;
        if (num_touchdown >= 1 && !(damp_first > 0.0)) || (num_touchdown >= 2 && !(damp_other > 0.0)) {
            return Err(VisionError::InvalidConfiguration(format!(
                "chip damping product must be positive (first hop {damp_first}, other hops {damp_other})"
            )));
        }

        // Hop i covers dampXY_i · dampZ^i of the first hop's distance.
        let mut f = 0.0;
        for i in 0..=num_touchdown {
            let damp_xy = if i == 0 {
                1.0
            } else {
                self.params.chip_damping_xy_first_hop * self.params.chip_damping_xy_other_hops.powi(i as i32 - 1)
            };
            f += damp_xy * self.params.chip_damping_z.powi(i as i32);
        }
        let denom = f * self.chip_angle.cos() * self.chip_angle.sin();
        if !(denom > 0.0) || !denom.is_finite() {
            return Err(VisionError::InvalidConfiguration(format!(
                "chip angle {:.1}° with hop sum {f} has no solution",
                self.chip_angle.to_degrees()
            )));
        }
        let distance_m = distance.max(0.0) / 1000.0;
        Ok((distance_m * GRAVITY_M * 0.5 / denom).sqrt() * 1000.0)
    }

    /// Kick speed (mm/s) whose first hop peaks at `height` mm.
    pub fn init_vel_for_peak_height(&self, height: f64) -> f64 {
        let height_m = height.max(0.0) / 1000.0;
        let vz = (2.0 * GRAVITY_M * height_m).sqrt();
        vz / self.chip_angle.sin() * 1000.0
    }

    /// Horizontal distance (mm) after which the first hop has climbed above
    /// `height` mm. Infinite when the hop never gets that high.
    pub fn min_distance_to_over_chip(&self, kick_speed: f64, height: f64) -> f64 {
        self.over_chip_distances(kick_speed, height).0
    }

    /// Horizontal distance (mm) after which the first hop has dropped below
    /// `height` mm again. Zero when the hop never gets that high.
    pub fn max_distance_to_over_chip(&self, kick_speed: f64, height: f64) -> f64 {
        self.over_chip_distances(kick_speed, height).1
    }

    fn over_chip_distances(&self, kick_speed: f64, height: f64) -> (f64, f64) {
        let v = self.speed_to_vel(0.0, kick_speed) / 1000.0;
        let h = height / 1000.0;
        let disc = v.z * v.z - 2.0 * GRAVITY_M * h;
        if disc < 0.0 {
            return (f64::INFINITY, 0.0);
        }
        let t_up = (v.z - disc.sqrt()) / GRAVITY_M;
        let t_down = (v.z + disc.sqrt()) / GRAVITY_M;
        (t_up.max(0.0) * v.x * 1000.0, t_down * v.x * 1000.0)
    }

    /// Time (s) a chip kicked at `kick_speed` needs to cover `distance` on
    /// the ground plane.
    pub fn time_for_kick(&self, distance: f64, kick_speed: f64) -> f64 {
        self.kick(kick_speed).time_by_dist(distance)
    }

    /// Ground speed (mm/s) after `distance` mm.
    pub fn vel_for_kick(&self, distance: f64, kick_speed: f64) -> f64 {
        self.kick(kick_speed).vel_by_dist(distance)
    }

    /// Ground speed (mm/s) `time` seconds after the kick.
    pub fn vel_for_kick_by_time(&self, kick_speed: f64, time: f64) -> f64 {
        self.kick(kick_speed).vel_at(time.max(0.0)).xy().norm()
    }

    /// Horizontal speed (mm/s) the kicking robot must add on top of a chip
    /// at `abs_max_vel` so that touchdown `num_touchdown` lies beyond
    /// `distance`. Zero when the chip alone already gets there.
    pub fn bot_velocity_to_chip_farther_than_maximum_distance(
        &self,
        distance: f64,
        num_touchdown: usize,
        abs_max_vel: f64,
    ) -> Result<f64, VisionError> {
        let kick_vel = self.speed_to_vel(0.0, abs_max_vel);
        let touchdowns = self.kick(abs_max_vel).touchdown_locations();
        if let Some(last) = touchdowns.last() {
            let index = num_touchdown.min(touchdowns.len() - 1);
            let reached = touchdowns.get(index).unwrap_or(last);
            if reached.x >= distance {
                return Ok(0.0);
            }
        }
        let required = self.init_vel_for_dist_at_touchdown(distance, num_touchdown)?;
        Ok((self.chip_angle.cos() * required - kick_vel.x).abs())
    }
}
