//! Raw per-camera detections.
//!
//! A [`CamDetectionFrame`] is what one camera reports for one captured image.
//! Detections are immutable and short-lived: the per-camera filter consumes
//! them in the cycle they arrive.

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::ids::{BotId, CameraId};
use crate::Timestamp;

/// One camera's observation of a robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamRobot {
    pub bot_id: BotId,
    /// Position on the field (mm).
    pub pos: Vector2<f64>,
    /// Heading (rad).
    pub orientation: f64,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub camera_id: CameraId,
    #[serde(default)]
    pub t_capture: Timestamp,
    #[serde(default)]
    pub frame_number: u64,
}

/// One camera's observation of a ball.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamBall {
    /// Projected position (mm); `z` is the height estimate, `0` for a ball
    /// assumed on the ground.
    pub pos: Vector3<f64>,
    #[serde(default = "full_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub camera_id: CameraId,
    #[serde(default)]
    pub t_capture: Timestamp,
    #[serde(default)]
    pub frame_number: u64,
}

fn full_confidence() -> f64 {
    1.0
}

/// Everything one camera detected in one captured image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamDetectionFrame {
    pub camera_id: CameraId,
    pub frame_number: u64,
    pub t_capture: Timestamp,
    #[serde(default)]
    pub robots: Vec<CamRobot>,
    #[serde(default)]
    pub balls: Vec<CamBall>,
}

impl CamDetectionFrame {
    pub fn new(camera_id: CameraId, frame_number: u64, t_capture: Timestamp) -> Self {
        Self {
            camera_id,
            frame_number,
            t_capture,
            robots: Vec::new(),
            balls: Vec::new(),
        }
    }

    /// Builder-style: add a robot detection stamped with this frame's
    /// camera, time and sequence number.
    pub fn with_robot(mut self, bot_id: BotId, pos: Vector2<f64>, orientation: f64) -> Self {
        self.robots.push(CamRobot {
            bot_id,
            pos,
            orientation,
            confidence: 1.0,
            camera_id: self.camera_id,
            t_capture: self.t_capture,
            frame_number: self.frame_number,
        });
        self
    }

    /// Builder-style: add a ball detection stamped with this frame's camera,
    /// time and sequence number.
    pub fn with_ball(mut self, pos: Vector3<f64>) -> Self {
        self.balls.push(CamBall {
            pos,
            confidence: 1.0,
            camera_id: self.camera_id,
            t_capture: self.t_capture,
            frame_number: self.frame_number,
        });
        self
    }

    /// Copy the frame-level camera id, capture time and sequence number into
    /// every contained detection.
    ///
    /// Serialized frames usually omit the per-detection copies; ingestion
    /// calls this once so trackers can rely on them.
    pub fn stamped(mut self) -> Self {
        for robot in &mut self.robots {
            robot.camera_id = self.camera_id;
            robot.t_capture = self.t_capture;
            robot.frame_number = self.frame_number;
        }
        for ball in &mut self.balls {
            ball.camera_id = self.camera_id;
            ball.t_capture = self.t_capture;
            ball.frame_number = self.frame_number;
        }
        self
    }
}
