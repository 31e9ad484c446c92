//! Annotations produced by the quality inspectors.
//!
//! Annotations are for observability only; they never block publication.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    InvalidGeometry,
    DuplicateRobot,
    ImpossibleRobotSpeed,
    ImpossibleBallSpeed,
    NonFiniteState,
    NonMonotonicTimestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAnnotation {
    pub kind: AnnotationKind,
    pub timestamp: Timestamp,
    pub message: String,
}

impl QualityAnnotation {
    pub fn new(kind: AnnotationKind, timestamp: Timestamp, message: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp,
            message: message.into(),
        }
    }
}
