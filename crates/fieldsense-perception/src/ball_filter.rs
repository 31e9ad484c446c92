//! Ball filter: keeps the authoritative ball trajectory model.
//!
//! The model's time origin is the last kick. Between kicks the filter refits
//! the model against a sliding window of accepted observations; while the
//! ball is unseen it simply keeps extrapolating the current model.

use std::collections::VecDeque;

use fieldsense_physics::{BallParameters, BallTrajectory, FilteredVisionBall, GRAVITY_MM};
use fieldsense_types::{BallTrajectoryState, KickEvent, KickKind, Timestamp, ns_to_secs, secs_to_ns};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model_ident::fit_line;
use crate::preprocessor::{BallObservation, PreprocessorOutput};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallFilterConfig {
    /// Maximum number of observations in the fit window.
    pub window_size: usize,
    /// Observations older than this relative to the newest are dropped (ms).
    pub window_age_ms: u64,
    /// Observations needed for a quadratic fit.
    pub min_fit_samples: usize,
    /// Time span the window must cover for a quadratic fit (ms).
    pub min_fit_span_ms: u64,
}

impl Default for BallFilterConfig {
    fn default() -> Self {
        Self {
            window_size: 30,
            window_age_ms: 500,
            min_fit_samples: 5,
            min_fit_span_ms: 50,
        }
    }
}

/// Which model branch is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallRegime {
    Rolling,
    Chipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BallFilterOutput {
    pub ball: FilteredVisionBall,
    pub regime: BallRegime,
    /// State fitted at the origin of the active model, if it was a kick.
    pub kick_fit_state: Option<BallTrajectoryState>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Origin {
    timestamp: Timestamp,
    state: BallTrajectoryState,
    /// The origin is a kick, so the slide phase is known.
    kicked: bool,
}

/// Least-squares parabola `y = a + b t + c t²`.
fn fit_quadratic(samples: &[(f64, f64)]) -> Option<(f64, f64, f64)> {
    let mut ata = Matrix3::zeros();
    let mut atb = Vector3::zeros();
    for &(t, y) in samples {
        let row = Vector3::new(1.0, t, t * t);
        ata += row * row.transpose();
        atb += row * y;
    }
    let sol = ata.lu().solve(&atb)?;
    Some((sol[0], sol[1], sol[2]))
}

#[derive(Debug, Clone)]
pub struct BallFilter {
    config: BallFilterConfig,
    params: BallParameters,
    regime: BallRegime,
    origin: Option<Origin>,
    window: VecDeque<BallObservation>,
    current: FilteredVisionBall,
    kick_fit_state: Option<BallTrajectoryState>,
}

impl BallFilter {
    pub fn new(config: BallFilterConfig, params: BallParameters) -> Self {
        Self {
            config,
            params,
            regime: BallRegime::Rolling,
            origin: None,
            window: VecDeque::new(),
            current: FilteredVisionBall::default(),
            kick_fit_state: None,
        }
    }

    pub fn regime(&self) -> BallRegime {
        self.regime
    }

    /// The last committed ball, at the time of its last update.
    pub fn current(&self) -> &FilteredVisionBall {
        &self.current
    }

    pub fn kick_fit_state(&self) -> Option<&BallTrajectoryState> {
        self.kick_fit_state.as_ref()
    }

    pub fn params(&self) -> &BallParameters {
        &self.params
    }

    /// Apply one cycle of preprocessor output and report the ball at
    /// `timestamp`.
    pub fn update(&mut self, input: &PreprocessorOutput, timestamp: Timestamp) -> BallFilterOutput {
        if let Some(kick) = &input.kick_event {
            self.start_kick(kick);
        }
        if let Some(obs) = input.selected {
            self.observe(obs);
        }
        BallFilterOutput {
            ball: self.current.extrapolate(timestamp, &self.params),
            regime: self.regime,
            kick_fit_state: self.kick_fit_state,
        }
    }

    /// Place the ball at a known state, dropping all history.
    pub fn reset_ball(&mut self, pos: Vector3<f64>, vel: Vector3<f64>, timestamp: Timestamp) {
        let chipped = vel.z > 0.0 || pos.z > self.params.min_hop_height;
        let state = BallTrajectoryState {
            pos,
            vel,
            acc: Vector3::zeros(),
            v_switch_to_roll: if chipped { 0.0 } else { vel.xy().norm() },
            chipped,
            spin: 0.0,
            touchdowns: 0,
        };
        if let Err(error) = state.validate() {
            warn!(%error, "ignoring ball reset");
            return;
        }
        self.window.clear();
        self.kick_fit_state = None;
        self.regime = if chipped { BallRegime::Chipped } else { BallRegime::Rolling };
        self.origin = Some(Origin {
            timestamp,
            state,
            kicked: false,
        });
        self.commit(timestamp, state, timestamp);
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.config.clone(), self.params);
    }

    fn start_kick(&mut self, kick: &KickEvent) {
        let traj = BallTrajectory::from_kick(kick, &self.params);
        let state = traj.trajectory_state_at(0.0);
        self.window.clear();
        self.regime = match kick.kind {
            KickKind::Straight => BallRegime::Rolling,
            KickKind::Chip => BallRegime::Chipped,
        };
        self.origin = Some(Origin {
            timestamp: kick.timestamp,
            state,
            kicked: true,
        });
        self.kick_fit_state = Some(state);
        debug!(regime = ?self.regime, "ball model reset by kick");
        self.commit(kick.timestamp, state, kick.timestamp);
    }

    fn observe(&mut self, obs: BallObservation) {
        self.window.push_back(obs);
        let min_time = obs.timestamp - secs_to_ns(self.config.window_age_ms as f64 / 1000.0);
        while self.window.len() > self.config.window_size.max(1)
            || self.window.front().is_some_and(|o| o.timestamp < min_time)
        {
            self.window.pop_front();
        }

        let Some(origin) = self.origin else {
            let state = self.rolling_state(obs.pos, obs.vel, None);
            self.origin = Some(Origin {
                timestamp: obs.timestamp,
                state,
                kicked: false,
            });
            self.commit(obs.timestamp, state, obs.timestamp);
            return;
        };

        let state = match self.regime {
            BallRegime::Rolling => self.fit_rolling(&origin, &obs),
            BallRegime::Chipped => self.fit_chipped(origin, &obs),
        };
        self.commit(obs.timestamp, state, obs.timestamp);
    }

    fn rolling_state(&self, pos: Vector3<f64>, vel: Vector3<f64>, origin: Option<&Origin>) -> BallTrajectoryState {
        let speed = vel.xy().norm();
        let v_switch = match origin {
            Some(o) if o.kicked => o.state.v_switch_to_roll.min(speed),
            _ => speed,
        };
        let mut state = BallTrajectoryState {
            pos: Vector3::new(pos.x, pos.y, 0.0),
            vel: Vector3::new(vel.x, vel.y, 0.0),
            acc: Vector3::zeros(),
            v_switch_to_roll: v_switch,
            chipped: false,
            spin: 0.0,
            touchdowns: 0,
        };
        state.acc = BallTrajectory::from_state(&state, &self.params).state_at(0.0).acc;
        state
    }

    fn fit_rolling(&self, origin: &Origin, obs: &BallObservation) -> BallTrajectoryState {
        let samples: Vec<&BallObservation> = self.window.iter().filter(|o| o.timestamp >= origin.timestamp).collect();
        let span = samples
            .first()
            .map_or(0, |first| obs.timestamp - first.timestamp);
        let axis = |f: fn(&BallObservation) -> f64| -> Vec<(f64, f64)> {
            samples
                .iter()
                .map(|o| (ns_to_secs(o.timestamp - obs.timestamp), f(*o)))
                .collect()
        };
        let xs = axis(|o| o.pos.x);
        let ys = axis(|o| o.pos.y);

        let quadratic = samples.len() >= self.config.min_fit_samples
            && span >= secs_to_ns(self.config.min_fit_span_ms as f64 / 1000.0);
        let fitted = if quadratic {
            fit_quadratic(&xs)
                .zip(fit_quadratic(&ys))
                .map(|((x, vx, _), (y, vy, _))| (x, y, vx, vy))
        } else {
            None
        };
        let fitted = fitted.or_else(|| {
            if samples.len() < 3 {
                return None;
            }
            fit_line(&xs).zip(fit_line(&ys)).map(|((x, vx), (y, vy))| (x, y, vx, vy))
        });
        match fitted {
            Some((x, y, vx, vy)) => {
                self.rolling_state(Vector3::new(x, y, 0.0), Vector3::new(vx, vy, 0.0), Some(origin))
            }
            None => self.rolling_state(obs.pos, obs.vel, Some(origin)),
        }
    }

    fn fit_chipped(&mut self, mut origin: Origin, obs: &BallObservation) -> BallTrajectoryState {
        let first_hop_end = match BallTrajectory::from_state(&origin.state, &self.params) {
            BallTrajectory::Chipped { traj, .. } => traj.hops().first().map(|h| h.t_end),
            BallTrajectory::Straight(_) => None,
        };

        if let Some(t_end) = first_hop_end {
            let samples: Vec<(f64, &BallObservation)> = self
                .window
                .iter()
                .map(|o| (ns_to_secs(o.timestamp - origin.timestamp), o))
                .filter(|(t, _)| *t > 0.0 && *t < t_end)
                .collect();
            if samples.len() >= 2 {
                let p0 = origin.state.pos;
                let stt: f64 = samples.iter().map(|(t, _)| t * t).sum();
                let through_origin = |f: &dyn Fn(f64, &BallObservation) -> f64| {
                    samples.iter().map(|(t, o)| t * f(*t, *o)).sum::<f64>() / stt
                };
                let mut vel = origin.state.vel;
                vel.x = through_origin(&|_, o| o.pos.x - p0.x);
                vel.y = through_origin(&|_, o| o.pos.y - p0.y);
                // Heights are only usable when the cameras report them.
                if samples.iter().any(|(_, o)| o.pos.z > self.params.min_hop_height) {
                    vel.z = through_origin(&|t, o| o.pos.z - p0.z + 0.5 * GRAVITY_MM * t * t);
                }
                let mut refit = origin.state;
                refit.vel = vel;
                if refit.validate().is_ok() {
                    origin.state = refit;
                    self.origin = Some(origin);
                    if origin.kicked {
                        self.kick_fit_state = Some(refit);
                    }
                }
            }
        }

        let traj = BallTrajectory::from_state(&origin.state, &self.params);
        let t = ns_to_secs(obs.timestamp - origin.timestamp);
        let state = traj.trajectory_state_at(t);
        if !traj.is_airborne_at(t) {
            debug!("chipped ball landed, switching to rolling");
            let rolling = self.rolling_state(state.pos, state.vel, None);
            self.regime = BallRegime::Rolling;
            self.origin = Some(Origin {
                timestamp: obs.timestamp,
                state: rolling,
                kicked: false,
            });
            self.window.clear();
            self.window.push_back(*obs);
            return rolling;
        }
        state
    }

    fn commit(&mut self, timestamp: Timestamp, state: BallTrajectoryState, last_visible: Timestamp) {
        match FilteredVisionBall::new(timestamp, state, last_visible) {
            Ok(ball) => self.current = ball,
            Err(error) => warn!(%error, "rejected ball model update, keeping previous state"),
        }
    }
}
