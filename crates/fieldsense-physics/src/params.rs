//! Ball model parameters.

use fieldsense_types::VisionError;
use serde::{Deserialize, Serialize};

/// Coefficients of the ball model.
///
/// Defaults are the reference values for a standard golf ball on carpet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallParameters {
    /// Deceleration while sliding (mm/s², negative).
    pub acc_slide: f64,
    /// Deceleration while rolling (mm/s², negative).
    pub acc_roll: f64,
    /// Fraction of the kick speed at which a straight kick switches from
    /// sliding to rolling.
    pub k_switch: f64,
    /// Horizontal velocity kept at the first touchdown of a chip.
    pub chip_damping_xy_first_hop: f64,
    /// Horizontal velocity kept at every later touchdown.
    pub chip_damping_xy_other_hops: f64,
    /// Vertical velocity kept at every touchdown.
    pub chip_damping_z: f64,
    /// Hops lower than this (mm) are treated as rolling.
    pub min_hop_height: f64,
    /// Upper bound on the number of simulated hops.
    pub max_hops: usize,
    /// Ball radius (mm).
    pub ball_radius: f64,
}

impl Default for BallParameters {
    fn default() -> Self {
        Self {
            acc_slide: -3000.0,
            acc_roll: -260.0,
            k_switch: 0.64,
            chip_damping_xy_first_hop: 0.75,
            chip_damping_xy_other_hops: 0.95,
            chip_damping_z: 0.5,
            min_hop_height: 10.0,
            max_hops: 16,
            ball_radius: 21.5,
        }
    }
}

impl BallParameters {
    /// Horizontal damping applied at touchdown number `index` (0-based).
    ///
    /// `spin` is the share of the motion already converted into rolling spin;
    /// a ball with full spin keeps its horizontal speed at the first
    /// touchdown.
    pub fn damping_xy(&self, index: usize, spin: f64) -> f64 {
        if index == 0 {
            let spin = spin.clamp(0.0, 1.0);
            self.chip_damping_xy_first_hop + spin * (1.0 - self.chip_damping_xy_first_hop)
        } else {
            self.chip_damping_xy_other_hops
        }
    }

    /// Check that the parameters describe a physical ball.
    ///
    /// # Errors
    ///
    /// [`VisionError::InvalidConfiguration`] when an acceleration is not
    /// negative, `k_switch` is outside `(0, 1]`, or a damping product is not
    /// positive.
    pub fn validate(&self) -> Result<(), VisionError> {
        if !(self.acc_slide < 0.0) || !(self.acc_roll < 0.0) {
            return Err(VisionError::InvalidConfiguration(format!(
                "ball decelerations must be negative (slide {}, roll {})",
                self.acc_slide, self.acc_roll
            )));
        }
        if !(self.k_switch > 0.0 && self.k_switch <= 1.0) {
            return Err(VisionError::InvalidConfiguration(format!(
                "k_switch must be in (0, 1], got {}",
                self.k_switch
            )));
        }
        let first = self.chip_damping_xy_first_hop * self.chip_damping_z;
        let other = self.chip_damping_xy_other_hops * self.chip_damping_z;
        if !(first > 0.0) || !(other > 0.0) {
            return Err(VisionError::InvalidConfiguration(format!(
                "chip damping products must be positive (first hop {first}, other hops {other})"
            )));
        }
        Ok(())
    }
}
