//! `fieldsense-perception` – per-camera tracking and ball estimation.
//!
//! Turns raw, noisy, per-camera detections into filtered object states and
//! an authoritative ball model.
//!
//! # Modules
//!
//! - [`kalman`] – [`AxisFilter`][kalman::AxisFilter]: single-axis
//!   constant-velocity Kalman filter with optional angle wrap-around.
//! - [`robot_tracker`] / [`ball_tracker`] – per-camera object trackers built
//!   from axis filters.
//! - [`cam_filter`] – [`CamFilter`][cam_filter::CamFilter]: owns the trackers
//!   of one camera, gates detections by viewport and estimates the frame
//!   rate.
//! - [`viewport`] – [`ViewportArchitect`][viewport::ViewportArchitect]:
//!   disjoint per-camera partition of the field.
//! - [`merge`] – cross-camera merge of robot trackers.
//! - [`preprocessor`] – outlier rejection and kick detection for balls.
//! - [`model_ident`] – straight-kick ball model identification.
//! - [`ball_filter`] – [`BallFilter`][ball_filter::BallFilter]: fits the
//!   rolling / chipped trajectory model.
//! - [`frame`] – [`FusedFrame`][frame::FusedFrame] and its debug layers.

pub mod ball_filter;
pub mod ball_tracker;
pub mod cam_filter;
pub mod frame;
pub mod kalman;
pub mod merge;
pub mod model_ident;
pub mod preprocessor;
pub mod robot_tracker;
pub mod viewport;

pub use ball_filter::{BallFilter, BallFilterConfig, BallFilterOutput, BallRegime};
pub use cam_filter::{CamFilter, TrackerConfig};
pub use frame::{DebugLayer, DebugShape, FusedFrame};
pub use merge::merge_robot_trackers;
pub use preprocessor::{BallFilterPreprocessor, BallObservation, PreprocessorConfig, PreprocessorOutput};
pub use viewport::{ViewportArchitect, ViewportConfig, ViewportUpdate};
