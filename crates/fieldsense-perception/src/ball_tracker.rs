//! Per-camera ball tracker over the projected 3-D ball position.

use fieldsense_types::{CamBall, CameraId, Timestamp};
use nalgebra::Vector3;

use crate::cam_filter::TrackerConfig;
use crate::kalman::AxisFilter;

#[derive(Debug, Clone)]
pub struct BallTracker {
    id: u32,
    camera_id: CameraId,
    axes: [AxisFilter; 3],
    last_update: Timestamp,
    updates: usize,
    confidence: f64,
}

impl BallTracker {
    pub fn new(id: u32, ball: &CamBall, config: &TrackerConfig) -> Self {
        let t = ball.t_capture;
        let noise = config.ball_position;
        Self {
            id,
            camera_id: ball.camera_id,
            axes: [
                AxisFilter::new(ball.pos.x, t, noise),
                AxisFilter::new(ball.pos.y, t, noise),
                AxisFilter::new(ball.pos.z, t, noise),
            ],
            last_update: t,
            updates: 1,
            confidence: ball.confidence,
        }
    }

    /// Ground-plane distance between `ball` and this tracker's prediction
    /// at the ball's capture time.
    pub fn distance_to(&self, ball: &CamBall) -> f64 {
        let predicted = self.pos_at(ball.t_capture);
        (predicted.xy() - ball.pos.xy()).norm()
    }

    pub fn update(&mut self, ball: &CamBall) {
        let t = ball.t_capture;
        for (axis, z) in self.axes.iter_mut().zip(ball.pos.iter()) {
            axis.predict(t);
            axis.correct(*z);
        }
        self.last_update = t;
        self.updates += 1;
        self.confidence = ball.confidence;
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }

    pub fn num_updates(&self) -> usize {
        self.updates
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn uncertainty(&self) -> f64 {
        (self.axes[0].pos_variance() + self.axes[1].pos_variance()).sqrt()
    }

    pub fn pos_at(&self, t: Timestamp) -> Vector3<f64> {
        Vector3::from_iterator(self.axes.iter().map(|a| a.prediction_at(t).0))
    }

    pub fn vel(&self) -> Vector3<f64> {
        Vector3::from_iterator(self.axes.iter().map(AxisFilter::vel))
    }

    /// Filtered position at the last update.
    pub fn pos(&self) -> Vector3<f64> {
        Vector3::from_iterator(self.axes.iter().map(AxisFilter::pos))
    }
}
