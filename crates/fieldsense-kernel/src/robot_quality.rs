//! [`RobotQualityInspector`] – detection-density gate for robots.
//!
//! Every raw robot detection is recorded. A robot passes the gate when the
//! number of its detections inside the sliding window, divided by the number
//! of frames the cameras could have delivered in that window, reaches the
//! configured ratio. Robots that only flicker into view now and then never
//! reach the published frame.

use std::collections::{BTreeMap, VecDeque};

use fieldsense_types::{BotId, CamRobot, Timestamp, secs_to_ns};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotQualityConfig {
    /// Length of the sliding window (s).
    pub window: f64,
    /// Minimum share of possible detections a robot needs to pass.
    pub min_detection_ratio: f64,
}

impl Default for RobotQualityConfig {
    fn default() -> Self {
        Self {
            window: 0.5,
            min_detection_ratio: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RobotQualityInspector {
    config: RobotQualityConfig,
    detections: BTreeMap<BotId, VecDeque<Timestamp>>,
    average_dt: f64,
}

impl Default for RobotQualityInspector {
    fn default() -> Self {
        Self::new(RobotQualityConfig::default())
    }
}

impl RobotQualityInspector {
    pub fn new(config: RobotQualityConfig) -> Self {
        Self {
            config,
            detections: BTreeMap::new(),
            average_dt: 1.0 / 60.0,
        }
    }

    pub fn add_detection(&mut self, robot: &CamRobot) {
        self.detections.entry(robot.bot_id).or_default().push_back(robot.t_capture);
    }

    /// Forget detections that fell out of the window ending at `timestamp`.
    pub fn prune(&mut self, timestamp: Timestamp) {
        let min_time = timestamp - secs_to_ns(self.config.window);
        for times in self.detections.values_mut() {
            while times.front().is_some_and(|t| *t < min_time) {
                times.pop_front();
            }
        }
        self.detections.retain(|_, times| !times.is_empty());
    }

    /// Set the frame interval (s) used to derive the number of possible
    /// detections.
    pub fn update_average_dt(&mut self, average_dt: f64) {
        if average_dt.is_finite() && average_dt > 0.0 {
            self.average_dt = average_dt;
        }
    }

    /// Detections a robot seen in every frame would have in the window.
    pub fn possible_detections(&self) -> f64 {
        self.config.window / self.average_dt
    }

    pub fn num_detections(&self, bot: BotId) -> usize {
        self.detections.get(&bot).map_or(0, VecDeque::len)
    }

    pub fn detection_ratio(&self, bot: BotId) -> f64 {
        let possible = self.possible_detections();
        if possible <= 0.0 {
            return 0.0;
        }
        self.num_detections(bot) as f64 / possible
    }

    pub fn passes(&self, bot: BotId) -> bool {
        self.detection_ratio(bot) >= self.config.min_detection_ratio
    }

    pub fn clear(&mut self) {
        self.detections.clear();
    }
}
