//! Ball preprocessor: outlier rejection, kick detection and model
//! identification bookkeeping.
//!
//! Works on [`BallObservation`]s, one per ball tracker of every camera.
//! Per cycle it picks the observation that continues the ball best,
//! discards physically impossible jumps, and classifies sudden velocity
//! changes next to a robot as straight or chip kicks.

use std::collections::BTreeMap;

use fieldsense_physics::{BallParameters, FilteredVisionBall};
use fieldsense_types::{
    BallModelIdentResult, BotId, CameraId, FilteredVisionBot, KickEvent, KickKind, RobotInfo, Timestamp, ns_to_secs,
    secs_to_ns,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cam_filter::CamFilter;
use crate::model_ident::KickRecording;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessorConfig {
    /// Observations implying a faster ball than this are outliers (mm/s).
    pub max_ball_speed: f64,
    /// After this long without an accepted observation the outlier check is
    /// skipped and the ball may reappear anywhere (ms).
    pub reacquire_after_ms: u64,
    /// Minimum velocity change that counts as a kick (mm/s).
    pub kick_velocity_change: f64,
    /// Consecutive observations of one tracker that must confirm a velocity
    /// change.
    pub kick_confirmations: usize,
    /// Trackers with fewer updates than this are still settling on a
    /// velocity and never report kicks.
    pub kick_min_tracker_updates: usize,
    /// Contact distance added to the robot's centre-to-dribbler distance
    /// (mm).
    pub kick_contact_margin: f64,
    /// Kicks closer together than this are merged into the first (ms).
    pub kick_cooldown_ms: u64,
    /// Vertical speed above which a kick is a chip (mm/s).
    pub chip_vertical_speed: f64,
    /// Observed height above which a kick is a chip (mm).
    pub chip_min_height: f64,
    /// A straight kick recording ends once the ball is slower than this
    /// (mm/s).
    pub model_ident_stop_speed: f64,
    pub model_ident_min_samples: usize,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            max_ball_speed: 15_000.0,
            reacquire_after_ms: 500,
            kick_velocity_change: 1000.0,
            kick_confirmations: 2,
            kick_min_tracker_updates: 3,
            kick_contact_margin: 150.0,
            kick_cooldown_ms: 200,
            chip_vertical_speed: 500.0,
            chip_min_height: 50.0,
            model_ident_stop_speed: 100.0,
            model_ident_min_samples: 10,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Input / output
// ────────────────────────────────────────────────────────────────────────────

/// One camera's current estimate of a ball.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallObservation {
    pub camera_id: CameraId,
    pub tracker_id: u32,
    pub timestamp: Timestamp,
    pub pos: Vector3<f64>,
    pub vel: Vector3<f64>,
    pub uncertainty: f64,
    /// Detections the tracker has absorbed so far.
    #[serde(default)]
    pub tracker_updates: usize,
}

impl BallObservation {
    fn source(&self) -> (CameraId, u32) {
        (self.camera_id, self.tracker_id)
    }

    fn is_finite(&self) -> bool {
        self.pos.iter().chain(self.vel.iter()).all(|c| c.is_finite()) && self.uncertainty.is_finite()
    }
}

/// Collect observations from every ball tracker that was updated within
/// `max_age` of `timestamp`.
pub fn observations_from_cameras<'a>(
    cams: impl IntoIterator<Item = &'a CamFilter>,
    timestamp: Timestamp,
    max_age: Timestamp,
) -> Vec<BallObservation> {
    let mut observations: Vec<BallObservation> = cams
        .into_iter()
        .flat_map(|cam| cam.balls().iter())
        .filter(|tracker| timestamp - tracker.last_update() <= max_age)
        .map(|tracker| BallObservation {
            camera_id: tracker.camera_id(),
            tracker_id: tracker.id(),
            timestamp: tracker.last_update(),
            pos: tracker.pos(),
            vel: tracker.vel(),
            uncertainty: tracker.uncertainty(),
            tracker_updates: tracker.num_updates(),
        })
        .collect();
    observations.sort_by_key(|o| (o.timestamp, o.camera_id, o.tracker_id));
    observations
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessorOutput {
    /// The observation continuing the ball this cycle, if a new one
    /// arrived.
    pub selected: Option<BallObservation>,
    pub kick_event: Option<KickEvent>,
    /// Emitted when a straight-kick recording finished.
    pub model_ident: Option<BallModelIdentResult>,
}

// ────────────────────────────────────────────────────────────────────────────
// BallFilterPreprocessor
// ────────────────────────────────────────────────────────────────────────────

/// A velocity change one tracker reported that still needs confirming.
#[derive(Debug, Clone, Copy)]
struct PendingKick {
    /// Velocity before the change.
    baseline: Vector3<f64>,
    /// First observation showing the change.
    start: BallObservation,
    confirmations: usize,
}

#[derive(Debug, Clone, Copy)]
struct TrackerHistory {
    last: BallObservation,
    pending: Option<PendingKick>,
}

#[derive(Debug, Clone)]
pub struct BallFilterPreprocessor {
    config: PreprocessorConfig,
    params: BallParameters,
    last_accepted: Option<BallObservation>,
    /// Last selected observation per (camera, tracker). Velocities are only
    /// compared within one tracker, never across a camera handover.
    history: BTreeMap<(CameraId, u32), TrackerHistory>,
    last_kick: Option<KickEvent>,
    model_identification: bool,
    recording: Option<KickRecording>,
}

impl BallFilterPreprocessor {
    pub fn new(config: PreprocessorConfig, params: BallParameters) -> Self {
        Self {
            config,
            params,
            last_accepted: None,
            history: BTreeMap::new(),
            last_kick: None,
            model_identification: false,
            recording: None,
        }
    }

    pub fn set_model_identification(&mut self, enabled: bool) {
        self.model_identification = enabled;
        if !enabled {
            self.recording = None;
        }
    }

    pub fn model_identification(&self) -> bool {
        self.model_identification
    }

    pub fn last_kick(&self) -> Option<&KickEvent> {
        self.last_kick.as_ref()
    }

    pub fn clear(&mut self) {
        self.last_accepted = None;
        self.history.clear();
        self.last_kick = None;
        self.recording = None;
    }

    /// Pick, check and classify this cycle's ball observations.
    pub fn update(
        &mut self,
        last_ball: &FilteredVisionBall,
        observations: &[BallObservation],
        robots: &[FilteredVisionBot],
        robot_infos: &BTreeMap<BotId, RobotInfo>,
    ) -> PreprocessorOutput {
        let mut output = PreprocessorOutput::default();

        let Some(obs) = self.select(last_ball, observations) else {
            return output;
        };
        output.selected = Some(obs);

        self.last_accepted = Some(obs);
        output.kick_event = self.detect_kick(&obs, robots, robot_infos);

        if let Some(kick) = &output.kick_event {
            info!(
                kind = ?kick.kind,
                bot = %kick.kicking_bot,
                speed = kick.velocity.norm(),
                "kick detected"
            );
            output.model_ident = self.finish_recording();
            if self.model_identification && kick.kind == KickKind::Straight {
                self.recording = Some(KickRecording::new(kick.clone()));
            }
            self.last_kick = Some(kick.clone());
        } else if let Some(recording) = &mut self.recording {
            let speed = obs.vel.xy().norm();
            recording.push(obs.timestamp, speed);
            if speed < self.config.model_ident_stop_speed {
                output.model_ident = self.finish_recording();
            }
        }

        output
    }

    fn finish_recording(&mut self) -> Option<BallModelIdentResult> {
        let recording = self.recording.take()?;
        recording.identify(&self.params, self.config.model_ident_min_samples)
    }

    /// The newest plausible observation, preferring the one closest to the
    /// current ball.
    fn select(&self, last_ball: &FilteredVisionBall, observations: &[BallObservation]) -> Option<BallObservation> {
        let since = self.last_accepted.map_or(Timestamp::MIN, |o| o.timestamp);
        let reference = self.last_accepted.map(|o| o.pos).unwrap_or_else(|| last_ball.pos());
        observations
            .iter()
            .filter(|o| o.timestamp > since)
            .filter(|o| {
                let ok = o.is_finite();
                if !ok {
                    debug!(camera_id = o.camera_id, "non-finite ball observation");
                }
                ok
            })
            .filter(|o| !self.is_outlier(o))
            .min_by(|a, b| {
                let da = (a.pos.xy() - reference.xy()).norm();
                let db = (b.pos.xy() - reference.xy()).norm();
                da.total_cmp(&db)
                    .then(b.timestamp.cmp(&a.timestamp))
                    .then(a.uncertainty.total_cmp(&b.uncertainty))
            })
            .copied()
    }

    fn is_outlier(&self, obs: &BallObservation) -> bool {
        let Some(last) = self.last_accepted else {
            return false;
        };
        let dt_ns = obs.timestamp - last.timestamp;
        if dt_ns > secs_to_ns(self.config.reacquire_after_ms as f64 / 1000.0) {
            return false;
        }
        // Frames a few ms apart would make tiny jitter look fast.
        let dt = ns_to_secs(dt_ns).max(1.0 / 60.0);
        let speed = (obs.pos.xy() - last.pos.xy()).norm() / dt;
        let outlier = speed > self.config.max_ball_speed;
        if outlier {
            debug!(camera_id = obs.camera_id, speed, "ball observation rejected as outlier");
        }
        outlier
    }

    fn detect_kick(
        &mut self,
        obs: &BallObservation,
        robots: &[FilteredVisionBot],
        robot_infos: &BTreeMap<BotId, RobotInfo>,
    ) -> Option<KickEvent> {
        let horizon = secs_to_ns(self.config.reacquire_after_ms as f64 / 1000.0);
        self.history.retain(|_, h| obs.timestamp - h.last.timestamp <= horizon);
        let fresh = TrackerHistory {
            last: *obs,
            pending: None,
        };
        let previous = self.history.insert(obs.source(), fresh)?;
        if obs.tracker_updates < self.config.kick_min_tracker_updates {
            return None;
        }

        let baseline = previous.pending.map_or(previous.last.vel, |p| p.baseline);
        if (obs.vel - baseline).norm() < self.config.kick_velocity_change {
            return None;
        }
        let start = previous.pending.map_or(*obs, |p| p.start);
        let confirmations = previous.pending.map_or(0, |p| p.confirmations) + 1;
        if confirmations < self.config.kick_confirmations {
            if let Some(history) = self.history.get_mut(&obs.source()) {
                history.pending = Some(PendingKick {
                    baseline,
                    start,
                    confirmations,
                });
            }
            return None;
        }

        if let Some(last) = &self.last_kick
            && start.timestamp - last.timestamp < secs_to_ns(self.config.kick_cooldown_ms as f64 / 1000.0)
        {
            return None;
        }

        let (bot, info) = robots
            .iter()
            .map(|bot| (bot, robot_infos.get(&bot.bot_id)))
            .filter(|(bot, info)| {
                let reach = info.map_or(75.0, |i| i.center_to_dribbler) + self.config.kick_contact_margin;
                (bot.pos - start.pos.xy()).norm() <= reach
            })
            .min_by(|a, b| {
                let da = (a.0.pos - start.pos.xy()).norm();
                let db = (b.0.pos - start.pos.xy()).norm();
                da.total_cmp(&db)
            })?;

        let chip = obs.vel.z > self.config.chip_vertical_speed
            || obs.pos.z.max(start.pos.z) > self.config.chip_min_height
            || info.is_some_and(|i| i.chip_armed);
        let (kind, velocity) = if chip {
            (KickKind::Chip, obs.vel)
        } else {
            (KickKind::Straight, Vector3::new(obs.vel.x, obs.vel.y, 0.0))
        };
        Some(KickEvent {
            kind,
            position: start.pos,
            velocity,
            kicking_bot: bot.bot_id,
            timestamp: start.timestamp,
        })
    }
}
