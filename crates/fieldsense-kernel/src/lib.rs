//! `fieldsense-kernel` – quality inspection and camera supervision.
//!
//! The kernel does not estimate anything; it judges what the estimators
//! produce and decides what may be published.
//!
//! # Modules
//!
//! - [`robot_quality`] – [`RobotQualityInspector`][robot_quality::RobotQualityInspector]:
//!   sliding-window detection density gate that keeps ghost robots out of
//!   the published frame.
//! - [`frame_inspector`] – [`FrameInspector`][frame_inspector::FrameInspector]:
//!   a rule engine that annotates fused frames with anomalies (impossible
//!   speeds, non-finite states, timestamps running backwards) and flags
//!   duplicate robot detections.
//! - [`geometry_inspector`] – [`GeometryInspector`][geometry_inspector::GeometryInspector]:
//!   rejects physically implausible camera geometry.
//! - [`watchdog`] – [`CameraWatchdog`][watchdog::CameraWatchdog]: detects
//!   cameras whose timestamps drifted away from the others.

pub mod frame_inspector;
pub mod geometry_inspector;
pub mod robot_quality;
pub mod watchdog;

pub use frame_inspector::{FrameInspector, FrameInspectorConfig, FrameRule};
pub use geometry_inspector::GeometryInspector;
pub use robot_quality::{RobotQualityConfig, RobotQualityInspector};
pub use watchdog::{CameraHealth, CameraWatchdog};
