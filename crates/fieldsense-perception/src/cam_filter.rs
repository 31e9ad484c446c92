//! Per-camera filter: owns every tracker of one camera.
//!
//! Cross-camera identity reconciliation never happens here; a robot seen by
//! two cameras has two independent trackers, one in each camera's filter.

use std::collections::{BTreeMap, VecDeque};

use fieldsense_types::{
    BotId, CamCalibration, CamDetectionFrame, CamFieldSize, CameraId, Rectangle, Timestamp, ns_to_secs, secs_to_ns,
};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ball_tracker::BallTracker;
use crate::kalman::AxisNoise;
use crate::robot_tracker::RobotTracker;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Tuning of the per-camera trackers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub robot_position: AxisNoise,
    pub robot_orientation: AxisNoise,
    /// Detections farther than this from the prediction are rejected (mm).
    pub robot_max_innovation: f64,
    /// Consecutive rejections after which a robot tracker restarts.
    pub robot_reinit_after: usize,
    /// Accepted detections before a robot tracker is published.
    pub robot_min_updates: usize,
    /// A robot tracker without detections for this long is dropped (ms).
    pub robot_timeout_ms: u64,
    pub ball_position: AxisNoise,
    /// Maximum distance between a ball detection and a tracker prediction
    /// for the detection to be assigned to it (mm).
    pub ball_assignment_gate: f64,
    /// A ball tracker without detections for this long is dropped (ms).
    pub ball_timeout_ms: u64,
    pub max_ball_trackers: usize,
    /// Number of frame intervals averaged for the frame rate estimate.
    pub frame_dt_window: usize,
    /// Frame interval assumed before the first two frames arrive (s).
    pub default_frame_dt: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            robot_position: AxisNoise {
                process: 3000.0,
                measurement: 5.0,
                initial_velocity: 2000.0,
            },
            robot_orientation: AxisNoise {
                process: 50.0,
                measurement: 0.05,
                initial_velocity: 10.0,
            },
            robot_max_innovation: 500.0,
            robot_reinit_after: 5,
            robot_min_updates: 3,
            robot_timeout_ms: 1000,
            ball_position: AxisNoise {
                process: 10_000.0,
                measurement: 10.0,
                initial_velocity: 5000.0,
            },
            ball_assignment_gate: 400.0,
            ball_timeout_ms: 500,
            max_ball_trackers: 10,
            frame_dt_window: 100,
            default_frame_dt: 1.0 / 60.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CamFilter
// ────────────────────────────────────────────────────────────────────────────

/// Trackers and timing of a single camera.
#[derive(Debug, Clone)]
pub struct CamFilter {
    camera_id: CameraId,
    config: TrackerConfig,
    timestamp: Timestamp,
    last_frame_number: Option<u64>,
    frame_dts: VecDeque<f64>,
    robots: BTreeMap<BotId, RobotTracker>,
    balls: Vec<BallTracker>,
    next_ball_id: u32,
    calibration: Option<CamCalibration>,
    field: CamFieldSize,
    viewport: Option<Rectangle>,
    viewport_margin: f64,
    detection_extent: Option<Rectangle>,
}

impl CamFilter {
    pub fn new(camera_id: CameraId, config: TrackerConfig) -> Self {
        Self {
            camera_id,
            config,
            timestamp: 0,
            last_frame_number: None,
            frame_dts: VecDeque::new(),
            robots: BTreeMap::new(),
            balls: Vec::new(),
            next_ball_id: 0,
            calibration: None,
            field: CamFieldSize::default(),
            viewport: None,
            viewport_margin: 0.0,
            detection_extent: None,
        }
    }

    /// Ingest one detection frame.
    ///
    /// Returns `false` when the frame is not newer than the last one and was
    /// dropped.
    pub fn update(&mut self, frame: &CamDetectionFrame) -> bool {
        if self.last_frame_number.is_some() && frame.t_capture <= self.timestamp {
            debug!(
                camera_id = self.camera_id,
                frame = frame.frame_number,
                "dropping out-of-order detection frame"
            );
            return false;
        }

        if self.last_frame_number.is_some() {
            self.frame_dts.push_back(ns_to_secs(frame.t_capture - self.timestamp));
            while self.frame_dts.len() > self.config.frame_dt_window.max(1) {
                self.frame_dts.pop_front();
            }
        }
        self.timestamp = frame.t_capture;
        self.last_frame_number = Some(frame.frame_number);

        for robot in &frame.robots {
            self.note_detection(robot.pos);
            if !self.in_viewport(&robot.pos) {
                debug!(camera_id = self.camera_id, bot = %robot.bot_id, "robot outside viewport");
                continue;
            }
            match self.robots.get_mut(&robot.bot_id) {
                Some(tracker) => {
                    tracker.update(robot, &self.config);
                }
                None => {
                    debug!(camera_id = self.camera_id, bot = %robot.bot_id, "new robot tracker");
                    self.robots.insert(robot.bot_id, RobotTracker::new(robot, &self.config));
                }
            }
        }

        for ball in &frame.balls {
            let ground = ball.pos.xy();
            self.note_detection(ground);
            if !ball.pos.iter().all(|c| c.is_finite()) || !self.in_viewport(&ground) {
                debug!(camera_id = self.camera_id, "ball detection discarded");
                continue;
            }
            let gate = self.config.ball_assignment_gate;
            let nearest = self
                .balls
                .iter()
                .enumerate()
                .map(|(index, tracker)| (tracker.distance_to(ball), index))
                .filter(|(distance, _)| *distance <= gate)
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, index)| index);
            match nearest {
                Some(index) => self.balls[index].update(ball),
                None => {
                    let id = self.next_ball_id;
                    self.next_ball_id = self.next_ball_id.wrapping_add(1);
                    debug!(camera_id = self.camera_id, tracker = id, "new ball tracker");
                    self.balls.push(BallTracker::new(id, ball, &self.config));
                }
            }
        }

        self.expire_trackers();
        true
    }

    fn expire_trackers(&mut self) {
        let now = self.timestamp;
        let robot_timeout = secs_to_ns(self.config.robot_timeout_ms as f64 / 1000.0);
        let camera_id = self.camera_id;
        self.robots.retain(|bot, tracker| {
            let keep = now - tracker.last_update() <= robot_timeout;
            if !keep {
                debug!(camera_id, bot = %bot, "robot tracker timed out");
            }
            keep
        });

        let ball_timeout = secs_to_ns(self.config.ball_timeout_ms as f64 / 1000.0);
        self.balls.retain(|tracker| now - tracker.last_update() <= ball_timeout);
        if self.balls.len() > self.config.max_ball_trackers {
            self.balls.sort_by(|a, b| a.uncertainty().total_cmp(&b.uncertainty()));
            self.balls.truncate(self.config.max_ball_trackers);
        }
    }

    fn note_detection(&mut self, pos: Vector2<f64>) {
        match &mut self.detection_extent {
            Some(extent) => extent.expand_to(&pos),
            None => self.detection_extent = Some(Rectangle::from_corners(pos, pos)),
        }
    }

    fn in_viewport(&self, pos: &Vector2<f64>) -> bool {
        self.viewport
            .is_none_or(|viewport| viewport.contains_with_margin(pos, self.viewport_margin))
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    /// Capture time of the newest accepted frame.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Mean interval between frames (s).
    pub fn average_frame_dt(&self) -> f64 {
        if self.frame_dts.is_empty() {
            self.config.default_frame_dt
        } else {
            self.frame_dts.iter().sum::<f64>() / self.frame_dts.len() as f64
        }
    }

    /// Robot trackers with enough accepted detections.
    pub fn valid_robots(&self) -> impl Iterator<Item = &RobotTracker> + '_ {
        self.robots.values().filter(|tracker| tracker.is_valid(&self.config))
    }

    /// All robot trackers, valid or not.
    pub fn robots(&self) -> impl Iterator<Item = &RobotTracker> + '_ {
        self.robots.values()
    }

    pub fn balls(&self) -> &[BallTracker] {
        &self.balls
    }

    pub fn set_viewport(&mut self, viewport: Option<Rectangle>, margin: f64) {
        self.viewport = viewport;
        self.viewport_margin = margin;
    }

    pub fn viewport(&self) -> Option<Rectangle> {
        self.viewport
    }

    /// Bounding box of every detection this camera has reported.
    pub fn detection_extent(&self) -> Option<Rectangle> {
        self.detection_extent
    }

    /// Apply new calibration. Tracker state is kept.
    pub fn update_calibration(&mut self, calibration: CamCalibration) {
        self.calibration = Some(calibration);
    }

    /// Apply new field dimensions. Tracker state is kept.
    pub fn update_field(&mut self, field: CamFieldSize) {
        self.field = field;
    }

    pub fn calibration(&self) -> Option<&CamCalibration> {
        self.calibration.as_ref()
    }

    pub fn field(&self) -> &CamFieldSize {
        &self.field
    }
}
