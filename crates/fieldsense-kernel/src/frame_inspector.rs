//! [`FrameInspector`] – sanity checks over fused frames.
//!
//! Every registered [`FrameRule`] looks at the new frame (and the previous
//! one) and reports what it finds as [`QualityAnnotation`]s. Inspection
//! never blocks publication; annotations travel with the frame and are
//! logged.
//!
//! Built-in rules:
//! - [`SpeedLimitRule`] – robots or ball faster than physically possible.
//! - [`FiniteStateRule`] – NaN / infinite values in any published state.
//! - [`MonotonicTimestampRule`] – frame timestamps running backwards.
//!
//! Detection frames are checked separately by
//! [`FrameInspector::inspect_detection`] for robot ids reported twice by the
//! same camera.

use std::collections::BTreeSet;

use fieldsense_perception::FusedFrame;
use fieldsense_types::{AnnotationKind, CamDetectionFrame, QualityAnnotation};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameInspectorConfig {
    /// Robots faster than this are flagged (mm/s).
    pub max_robot_speed: f64,
    /// Balls faster than this are flagged (mm/s).
    pub max_ball_speed: f64,
    /// Accepted field length range (mm).
    pub field_length_range: (f64, f64),
    /// Accepted field width range (mm).
    pub field_width_range: (f64, f64),
}

impl Default for FrameInspectorConfig {
    fn default() -> Self {
        Self {
            max_robot_speed: 6000.0,
            max_ball_speed: 15_000.0,
            field_length_range: (1000.0, 20_000.0),
            field_width_range: (1000.0, 15_000.0),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single check applied to every fused frame.
pub trait FrameRule: Send + Sync {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// Annotations for `frame`; empty when the frame looks fine.
    fn check(&self, frame: &FusedFrame, previous: Option<&FusedFrame>) -> Vec<QualityAnnotation>;
}

// ────────────────────────────────────────────────────────────────────────────
// FrameInspector
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FrameInspector {
    rules: Vec<Box<dyn FrameRule>>,
}

impl FrameInspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspector with all built-in rules.
    pub fn with_default_rules(config: &FrameInspectorConfig) -> Self {
        let mut inspector = Self::new();
        inspector.add_rule(Box::new(SpeedLimitRule {
            max_robot_speed: config.max_robot_speed,
            max_ball_speed: config.max_ball_speed,
        }));
        inspector.add_rule(Box::new(FiniteStateRule));
        inspector.add_rule(Box::new(MonotonicTimestampRule));
        inspector
    }

    pub fn add_rule(&mut self, rule: Box<dyn FrameRule>) {
        self.rules.push(rule);
    }

    /// Run every rule over `frame` and log what they report.
    pub fn inspect(&self, frame: &FusedFrame, previous: Option<&FusedFrame>) -> Vec<QualityAnnotation> {
        let mut annotations = Vec::new();
        for rule in &self.rules {
            for annotation in rule.check(frame, previous) {
                warn!(rule = rule.name(), frame = frame.id, "{}", annotation.message);
                annotations.push(annotation);
            }
        }
        annotations
    }

    /// Flag robot ids that a single camera reported more than once.
    pub fn inspect_detection(&self, detection: &CamDetectionFrame) -> Vec<QualityAnnotation> {
        let mut seen = BTreeSet::new();
        let mut reported = BTreeSet::new();
        let mut annotations = Vec::new();
        for robot in &detection.robots {
            if !seen.insert(robot.bot_id) && reported.insert(robot.bot_id) {
                let annotation = QualityAnnotation::new(
                    AnnotationKind::DuplicateRobot,
                    detection.t_capture,
                    format!("camera {} reports robot {} more than once", detection.camera_id, robot.bot_id),
                );
                warn!(camera_id = detection.camera_id, bot = %robot.bot_id, "duplicate robot detection");
                annotations.push(annotation);
            }
        }
        annotations
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

pub struct SpeedLimitRule {
    pub max_robot_speed: f64,
    pub max_ball_speed: f64,
}

impl FrameRule for SpeedLimitRule {
    fn name(&self) -> &str {
        "speed_limit"
    }

    fn check(&self, frame: &FusedFrame, _previous: Option<&FusedFrame>) -> Vec<QualityAnnotation> {
        let mut out: Vec<QualityAnnotation> = frame
            .bots
            .values()
            .filter(|bot| bot.vel.norm() > self.max_robot_speed)
            .map(|bot| {
                QualityAnnotation::new(
                    AnnotationKind::ImpossibleRobotSpeed,
                    frame.timestamp,
                    format!("robot {} moves at {:.0} mm/s", bot.bot_id, bot.vel.norm()),
                )
            })
            .collect();
        let ball_speed = frame.ball.vel().norm();
        if ball_speed > self.max_ball_speed {
            out.push(QualityAnnotation::new(
                AnnotationKind::ImpossibleBallSpeed,
                frame.timestamp,
                format!("ball moves at {ball_speed:.0} mm/s"),
            ));
        }
        out
    }
}

pub struct FiniteStateRule;

impl FrameRule for FiniteStateRule {
    fn name(&self) -> &str {
        "finite_state"
    }

    fn check(&self, frame: &FusedFrame, _previous: Option<&FusedFrame>) -> Vec<QualityAnnotation> {
        frame
            .bots
            .values()
            .filter(|bot| {
                !(bot.pos.iter().chain(bot.vel.iter()).all(|c| c.is_finite())
                    && bot.orientation.is_finite()
                    && bot.angular_vel.is_finite())
            })
            .map(|bot| {
                QualityAnnotation::new(
                    AnnotationKind::NonFiniteState,
                    frame.timestamp,
                    format!("robot {} has a non-finite state", bot.bot_id),
                )
            })
            .collect()
    }
}

pub struct MonotonicTimestampRule;

impl FrameRule for MonotonicTimestampRule {
    fn name(&self) -> &str {
        "monotonic_timestamp"
    }

    fn check(&self, frame: &FusedFrame, previous: Option<&FusedFrame>) -> Vec<QualityAnnotation> {
        match previous {
            Some(prev) if frame.timestamp < prev.timestamp => vec![QualityAnnotation::new(
                AnnotationKind::NonMonotonicTimestamp,
                frame.timestamp,
                format!(
                    "frame {} at {} is older than frame {} at {}",
                    frame.id, frame.timestamp, prev.id, prev.timestamp
                ),
            )],
            _ => Vec::new(),
        }
    }
}
