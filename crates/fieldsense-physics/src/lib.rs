//! `fieldsense-physics` – analytic ball physics.
//!
//! A pure, closed-form model of how the ball moves once it has left a
//! robot: given an initial state it answers "where is the ball at time `t`"
//! for any past or future `t`, and the inverse questions a planner asks
//! ("how fast must I kick to reach this point").
//!
//! # Modules
//!
//! - [`params`] – [`BallParameters`][params::BallParameters]: friction,
//!   slide/roll switch and chip damping coefficients.
//! - [`straight`] – two-phase (slide, then roll) ground trajectory.
//! - [`chipped`] – ballistic hops with per-touchdown damping, followed by a
//!   rolling phase.
//! - [`trajectory`] – [`BallTrajectory`][trajectory::BallTrajectory], the
//!   closed set of trajectory variants dispatched by discriminant.
//! - [`consultant`] – inverse physics queries for straight and chip kicks.
//! - [`tracked_ball`] – [`FilteredVisionBall`][tracked_ball::FilteredVisionBall],
//!   the fused ball state with validated construction and model-based
//!   extrapolation.
//!
//! # Units
//!
//! The public API is millimetre / second throughout. Gravity-driven
//! computations in [`consultant`] are carried out in metres and converted
//! back at the boundary.

pub mod chipped;
pub mod consultant;
pub mod params;
pub mod straight;
pub mod tracked_ball;
pub mod trajectory;

pub use consultant::{ChipConsultant, StraightConsultant};
pub use params::BallParameters;
pub use tracked_ball::FilteredVisionBall;
pub use trajectory::{BallTrajectory, TrajectoryPoint};

/// Gravity in mm/s².
pub const GRAVITY_MM: f64 = 9810.0;

/// Gravity in m/s².
pub const GRAVITY_M: f64 = 9.81;

/// Time to cover distance `d` starting at speed `v` under constant
/// acceleration `a`. Returns `f64::INFINITY` when the distance is never
/// reached.
pub(crate) fn time_for_distance(v: f64, a: f64, d: f64) -> f64 {
    if d <= 0.0 {
        return 0.0;
    }
    let disc = v * v + 2.0 * a * d;
    if disc < 0.0 {
        return f64::INFINITY;
    }
    // 2d / (v + sqrt(disc)) is the numerically stable root of
    // 0.5 a t² + v t - d = 0.
    let denom = v + disc.sqrt();
    if denom <= 0.0 { f64::INFINITY } else { 2.0 * d / denom }
}
