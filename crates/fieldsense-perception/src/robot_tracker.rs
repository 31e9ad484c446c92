//! Per-camera robot tracker: decoupled x / y / orientation filters with
//! innovation gating.

use fieldsense_types::{BotId, CamRobot, CameraId, FilteredVisionBot, Timestamp};
use nalgebra::Vector2;
use tracing::debug;

use crate::cam_filter::TrackerConfig;
use crate::kalman::AxisFilter;

/// Outcome of feeding one detection to a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerUpdate {
    Accepted,
    /// The detection jumped too far from the prediction and was ignored.
    Rejected,
    /// Too many consecutive rejections; the tracker restarted on the
    /// detection.
    Reinitialized,
}

#[derive(Debug, Clone)]
pub struct RobotTracker {
    bot_id: BotId,
    camera_id: CameraId,
    x: AxisFilter,
    y: AxisFilter,
    orientation: AxisFilter,
    last_update: Timestamp,
    updates: usize,
    consecutive_rejections: usize,
}

impl RobotTracker {
    pub fn new(detection: &CamRobot, config: &TrackerConfig) -> Self {
        let t = detection.t_capture;
        Self {
            bot_id: detection.bot_id,
            camera_id: detection.camera_id,
            x: AxisFilter::new(detection.pos.x, t, config.robot_position),
            y: AxisFilter::new(detection.pos.y, t, config.robot_position),
            orientation: AxisFilter::angular(detection.orientation, t, config.robot_orientation),
            last_update: t,
            updates: 1,
            consecutive_rejections: 0,
        }
    }

    /// Predict to the detection time and fuse the detection if it passes the
    /// innovation gate.
    pub fn update(&mut self, detection: &CamRobot, config: &TrackerConfig) -> TrackerUpdate {
        let t = detection.t_capture;
        self.x.predict(t);
        self.y.predict(t);
        self.orientation.predict(t);

        let innovation = Vector2::new(self.x.innovation(detection.pos.x), self.y.innovation(detection.pos.y)).norm();
        if innovation > config.robot_max_innovation {
            self.consecutive_rejections += 1;
            if self.consecutive_rejections >= config.robot_reinit_after {
                debug!(bot = %self.bot_id, camera_id = self.camera_id, innovation, "robot tracker re-initialised");
                *self = Self::new(detection, config);
                return TrackerUpdate::Reinitialized;
            }
            debug!(bot = %self.bot_id, camera_id = self.camera_id, innovation, "robot detection outside gate");
            return TrackerUpdate::Rejected;
        }

        self.x.correct(detection.pos.x);
        self.y.correct(detection.pos.y);
        self.orientation.correct(detection.orientation);
        self.last_update = t;
        self.updates += 1;
        self.consecutive_rejections = 0;
        TrackerUpdate::Accepted
    }

    pub fn bot_id(&self) -> BotId {
        self.bot_id
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    /// Capture time of the last accepted detection.
    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }

    pub fn num_updates(&self) -> usize {
        self.updates
    }

    /// Enough accepted detections to be trusted.
    pub fn is_valid(&self, config: &TrackerConfig) -> bool {
        self.updates >= config.robot_min_updates
    }

    /// Position standard deviation (mm).
    pub fn uncertainty(&self) -> f64 {
        (self.x.pos_variance() + self.y.pos_variance()).sqrt()
    }

    /// Predicted robot state at `t`. Pure; the tracker is not advanced.
    pub fn state_at(&self, t: Timestamp) -> FilteredVisionBot {
        let (px, vx) = self.x.prediction_at(t);
        let (py, vy) = self.y.prediction_at(t);
        let (orientation, angular_vel) = self.orientation.prediction_at(t);
        FilteredVisionBot {
            bot_id: self.bot_id,
            timestamp: t,
            pos: Vector2::new(px, py),
            vel: Vector2::new(vx, vy),
            orientation,
            angular_vel,
            uncertainty: self.uncertainty(),
            camera_id: self.camera_id,
        }
    }
}
