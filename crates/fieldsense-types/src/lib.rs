//! `fieldsense-types` – shared vocabulary of the FieldSense vision pipeline.
//!
//! Every other crate in the workspace speaks in these types: raw per-camera
//! detections on the way in, filtered robot / ball states on the way out, and
//! the [`VisionError`] taxonomy in between.
//!
//! # Units
//!
//! | Quantity | Unit |
//! |---|---|
//! | position, height, distance | millimetre |
//! | velocity | millimetre / second |
//! | acceleration | millimetre / second² |
//! | angle | radian |
//! | timestamp | nanosecond ([`Timestamp`]) |
//!
//! # Modules
//!
//! - [`ids`] – robot and camera identities.
//! - [`geometry`] – rectangles, camera calibration and field dimensions.
//! - [`detection`] – a single camera's detection frame.
//! - [`robot`] – robot auxiliary info and the fused robot state.
//! - [`ball`] – ball trajectory state, kick events and model identification
//!   results.
//! - [`quality`] – annotations emitted by the quality inspectors.
//! - [`error`] – [`VisionError`].

pub mod ball;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod quality;
pub mod robot;

pub use ball::{BallModelIdentResult, BallTrajectoryState, KickEvent, KickKind};
pub use detection::{CamBall, CamDetectionFrame, CamRobot};
pub use error::VisionError;
pub use geometry::{CamCalibration, CamFieldSize, CamGeometry, Rectangle};
pub use ids::{BotId, CameraId, TeamColor};
pub use quality::{AnnotationKind, QualityAnnotation};
pub use robot::{FilteredVisionBot, RobotInfo};

/// Capture / publication time in nanoseconds.
pub type Timestamp = i64;

/// Convert a nanosecond duration into seconds.
pub fn ns_to_secs(dt: Timestamp) -> f64 {
    dt as f64 * 1e-9
}

/// Convert seconds into a nanosecond duration (rounded to the nearest ns).
pub fn secs_to_ns(secs: f64) -> Timestamp {
    (secs * 1e9).round() as Timestamp
}

/// Wrap an angle into `(-π, π]`.
pub fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}
