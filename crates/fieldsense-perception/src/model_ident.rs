//! Identification of the straight-kick ball model from observed rollouts.
//!
//! After a straight kick the ball speed falls linearly, first steeply while
//! sliding and then gently while rolling. Splitting the samples at the
//! switch speed and fitting a line to each part recovers both
//! decelerations.

use std::collections::BTreeMap;

use fieldsense_physics::BallParameters;
use fieldsense_types::{BallModelIdentResult, KickEvent, KickKind, Timestamp, ns_to_secs};
use tracing::debug;

/// Least-squares line `y = a + b x`; `None` for fewer than two distinct `x`.
pub fn fit_line(samples: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = samples.len() as f64;
    if samples.len() < 2 {
        return None;
    }
    let mean_x = samples.iter().map(|s| s.0).sum::<f64>() / n;
    let mean_y = samples.iter().map(|s| s.1).sum::<f64>() / n;
    let sxx: f64 = samples.iter().map(|s| (s.0 - mean_x).powi(2)).sum();
    if sxx <= f64::EPSILON {
        return None;
    }
    let sxy: f64 = samples.iter().map(|s| (s.0 - mean_x) * (s.1 - mean_y)).sum();
    let slope = sxy / sxx;
    Some((mean_y - slope * mean_x, slope))
}

/// Collects speed samples of one straight kick.
#[derive(Debug, Clone)]
pub struct KickRecording {
    kick: KickEvent,
    /// `(seconds since kick, ground speed)`.
    samples: Vec<(f64, f64)>,
}

impl KickRecording {
    pub fn new(kick: KickEvent) -> Self {
        Self {
            kick,
            samples: Vec::new(),
        }
    }

    pub fn kick(&self) -> &KickEvent {
        &self.kick
    }

    pub fn push(&mut self, timestamp: Timestamp, speed: f64) {
        let t = ns_to_secs(timestamp - self.kick.timestamp);
        if t >= 0.0 && speed.is_finite() {
            self.samples.push((t, speed));
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Fit the slide and roll decelerations.
    ///
    /// Returns `None` when fewer than `min_samples` samples were recorded or
    /// the rolling part cannot be fitted.
    pub fn identify(&self, params: &BallParameters, min_samples: usize) -> Option<BallModelIdentResult> {
        if self.samples.len() < min_samples.max(2) || self.kick.kind != KickKind::Straight {
            return None;
        }
        let kick_speed = self.kick.velocity.xy().norm();
        let v_switch = kick_speed * params.k_switch;
        let (sliding, rolling): (Vec<(f64, f64)>, Vec<(f64, f64)>) =
            self.samples.iter().partition(|(_, speed)| *speed > v_switch);

        let (_, acc_roll) = fit_line(&rolling)?;
        let mut parameters = BTreeMap::from([
            ("acc_roll".to_string(), acc_roll),
            ("k_switch".to_string(), params.k_switch),
        ]);
        if let Some((_, acc_slide)) = fit_line(&sliding) {
            parameters.insert("acc_slide".to_string(), acc_slide);
        }
        debug!(samples = self.samples.len(), acc_roll, "ball model identified");
        Some(BallModelIdentResult {
            kind: KickKind::Straight,
            kick_timestamp: self.kick.timestamp,
            kick_position: self.kick.position.xy(),
            kick_speed,
            samples: self.samples.len(),
            parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use fieldsense_physics::BallTrajectory;
    use fieldsense_types::{BotId, secs_to_ns};
    use nalgebra::{Vector2, Vector3};

    #[test]
    fn line_fit_recovers_slope() {
        let samples: Vec<_> = (0..10).map(|i| (i as f64, 3.0 - 2.0 * i as f64)).collect();
        let (a, b) = fit_line(&samples).unwrap();
        assert_abs_diff_eq!(a, 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(b, -2.0, epsilon = 1e-9);
        assert!(fit_line(&[(1.0, 1.0), (1.0, 2.0)]).is_none());
    }

    #[test]
    fn identifies_decelerations_of_simulated_kick() {
        let params = BallParameters::default();
        let kick = KickEvent {
            kind: KickKind::Straight,
            position: Vector3::zeros(),
            velocity: Vector3::new(4000.0, 0.0, 0.0),
            kicking_bot: BotId::yellow(0),
            timestamp: secs_to_ns(1.0),
        };
        let traj = BallTrajectory::from_straight_kick(Vector2::zeros(), Vector2::new(4000.0, 0.0), &params);
        let mut recording = KickRecording::new(kick);
        for i in 1..200 {
            let t = i as f64 / 60.0;
            recording.push(secs_to_ns(1.0 + t), traj.vel_at(t).xy().norm());
        }
        let result = recording.identify(&params, 10).unwrap();
        assert_abs_diff_eq!(result.parameters["acc_roll"], params.acc_roll, epsilon = 1.0);
        assert_abs_diff_eq!(result.parameters["acc_slide"], params.acc_slide, epsilon = 1.0);
        assert_eq!(result.samples, 199);
    }

    #[test]
    fn too_few_samples_yield_nothing() {
        let kick = KickEvent {
            kind: KickKind::Straight,
            position: Vector3::zeros(),
            velocity: Vector3::new(2000.0, 0.0, 0.0),
            kicking_bot: BotId::yellow(0),
            timestamp: 0,
        };
        let mut recording = KickRecording::new(kick);
        recording.push(secs_to_ns(0.1), 1900.0);
        assert!(recording.identify(&BallParameters::default(), 10).is_none());
    }
}
