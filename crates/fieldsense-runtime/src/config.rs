//! [`VisionFilterConfig`] – every tunable of the pipeline in one place.
//!
//! All sections deserialize with `#[serde(default)]`, so a config file only
//! needs to name the values it changes.

use fieldsense_kernel::{FrameInspectorConfig, RobotQualityConfig};
use fieldsense_perception::{BallFilterConfig, PreprocessorConfig, TrackerConfig, ViewportConfig};
use fieldsense_physics::BallParameters;
use fieldsense_types::{Timestamp, VisionError};
use serde::{Deserialize, Serialize};

const NS_PER_MS: f64 = 1e6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionFilterConfig {
    /// Ball physics, including the chip damping coefficients.
    pub ball: BallParameters,
    pub tracker: TrackerConfig,
    pub viewport: ViewportConfig,
    /// Outlier rejection and kick detection thresholds.
    pub preprocessor: PreprocessorConfig,
    pub ball_filter: BallFilterConfig,
    /// Quality gate for publishing robots.
    pub robot_quality: RobotQualityConfig,
    pub inspector: FrameInspectorConfig,
    /// Period of the publish task (ms).
    pub publish_interval_ms: f64,
    /// Run a background publish task; otherwise every accepted detection
    /// frame publishes inline.
    pub use_threads: bool,
    /// A camera whose timestamp drifts further than this from the others is
    /// evicted (ms).
    pub camera_staleness_ms: u64,
    /// Robot trackers lagging the frame timestamp by more than this are left
    /// out of the merge (ms).
    pub merge_stale_tolerance_ms: u64,
    /// Ball trackers older than this do not contribute observations (ms).
    pub ball_observation_max_age_ms: u64,
    pub model_identification: bool,
}

impl Default for VisionFilterConfig {
    fn default() -> Self {
        Self {
            ball: BallParameters::default(),
            tracker: TrackerConfig::default(),
            viewport: ViewportConfig::default(),
            preprocessor: PreprocessorConfig::default(),
            ball_filter: BallFilterConfig::default(),
            robot_quality: RobotQualityConfig::default(),
            inspector: FrameInspectorConfig::default(),
            publish_interval_ms: 12.5,
            use_threads: true,
            camera_staleness_ms: 500,
            merge_stale_tolerance_ms: 200,
            ball_observation_max_age_ms: 100,
            model_identification: false,
        }
    }
}

impl VisionFilterConfig {
    /// # Errors
    ///
    /// [`VisionError::InvalidConfiguration`] for a non-positive publish
    /// interval or staleness timeout, or invalid ball physics.
    pub fn validate(&self) -> Result<(), VisionError> {
        if !(self.publish_interval_ms.is_finite() && self.publish_interval_ms > 0.0) {
            return Err(VisionError::InvalidConfiguration(format!(
                "publish interval must be positive, got {} ms",
                self.publish_interval_ms
            )));
        }
        if self.camera_staleness_ms == 0 {
            return Err(VisionError::InvalidConfiguration(
                "camera staleness timeout must be positive".to_string(),
            ));
        }
        if !(self.robot_quality.window > 0.0) {
            return Err(VisionError::InvalidConfiguration(format!(
                "robot quality window must be positive, got {} s",
                self.robot_quality.window
            )));
        }
        self.ball.validate()
    }

    pub fn camera_staleness(&self) -> Timestamp {
        ms_to_ns(self.camera_staleness_ms as f64)
    }

    pub fn merge_stale_tolerance(&self) -> Timestamp {
        ms_to_ns(self.merge_stale_tolerance_ms as f64)
    }

    pub fn ball_observation_max_age(&self) -> Timestamp {
        ms_to_ns(self.ball_observation_max_age_ms as f64)
    }
}

fn ms_to_ns(ms: f64) -> Timestamp {
    (ms * NS_PER_MS).round() as Timestamp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = VisionFilterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera_staleness(), 500_000_000);
    }

    #[test]
    fn non_positive_publish_interval_is_rejected() {
        let config = VisionFilterConfig {
            publish_interval_ms: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(VisionError::InvalidConfiguration(_))));
    }

    #[test]
    fn zero_damping_is_rejected() {
        let mut config = VisionFilterConfig::default();
        config.ball.chip_damping_z = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() -> Result<(), serde_json::Error> {
        let config: VisionFilterConfig =
            serde_json::from_str(r#"{ "use_threads": false, "ball": { "chip_damping_z": 0.6 } }"#)?;
        assert!(!config.use_threads);
        assert_eq!(config.ball.chip_damping_z, 0.6);
        assert_eq!(config.ball.max_hops, BallParameters::default().max_hops);
        assert_eq!(config.publish_interval_ms, 12.5);
        Ok(())
    }
}
