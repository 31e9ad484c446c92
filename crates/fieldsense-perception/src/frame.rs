//! The fused frame: one immutable snapshot of every tracked object.

use std::collections::BTreeMap;

use fieldsense_physics::{BallParameters, FilteredVisionBall};
use fieldsense_types::{
    BallTrajectoryState, BotId, CameraId, FilteredVisionBot, KickEvent, QualityAnnotation, Rectangle, Timestamp,
};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::ball_filter::BallRegime;

// ────────────────────────────────────────────────────────────────────────────
// Debug layers
// ────────────────────────────────────────────────────────────────────────────

/// Named groups of debug shapes for the external visualizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugLayer {
    Viewports,
    Quality,
    RobotQuality,
    BallTrackers,
    Kicks,
}

/// A plain-data shape; rendering is up to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DebugShape {
    Rect {
        rect: Rectangle,
        label: String,
    },
    Circle {
        center: Vector2<f64>,
        radius: f64,
        label: String,
    },
    Line {
        from: Vector2<f64>,
        to: Vector2<f64>,
        label: String,
    },
    Text {
        pos: Vector2<f64>,
        text: String,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// FusedFrame
// ────────────────────────────────────────────────────────────────────────────

/// Snapshot published once per cycle. Never mutated after publication;
/// [`FusedFrame::extrapolate`] derives a new frame instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedFrame {
    pub id: u64,
    pub timestamp: Timestamp,
    pub ball: FilteredVisionBall,
    pub ball_regime: BallRegime,
    #[serde(with = "bots_as_list")]
    pub bots: BTreeMap<BotId, FilteredVisionBot>,
    pub kick_event: Option<KickEvent>,
    pub kick_fit_state: Option<BallTrajectoryState>,
    /// Cameras that contributed to this frame.
    pub cameras: Vec<CameraId>,
    #[serde(default)]
    pub annotations: Vec<QualityAnnotation>,
    #[serde(default)]
    pub layers: BTreeMap<DebugLayer, Vec<DebugShape>>,
}

impl Default for FusedFrame {
    fn default() -> Self {
        Self {
            id: 0,
            timestamp: 0,
            ball: FilteredVisionBall::default(),
            ball_regime: BallRegime::Rolling,
            bots: BTreeMap::new(),
            kick_event: None,
            kick_fit_state: None,
            cameras: Vec::new(),
            annotations: Vec::new(),
            layers: BTreeMap::new(),
        }
    }
}

impl FusedFrame {
    /// The frame as it would look at `t`: robots advance with their
    /// velocity, the ball along its trajectory. Returns an unchanged copy
    /// when `t` is not after the frame's timestamp.
    pub fn extrapolate(&self, t: Timestamp, params: &BallParameters) -> Self {
        if t <= self.timestamp {
            return self.clone();
        }
        Self {
            timestamp: t,
            ball: self.ball.extrapolate(t, params),
            bots: self
                .bots
                .iter()
                .map(|(id, bot)| (*id, bot.extrapolate(bot.timestamp, t)))
                .collect(),
            ..self.clone()
        }
    }

    pub fn bot(&self, id: BotId) -> Option<&FilteredVisionBot> {
        self.bots.get(&id)
    }
}

/// JSON maps need string keys; robots travel as a list and are re-keyed by
/// their id on the way back in.
mod bots_as_list {
    use std::collections::BTreeMap;

    use fieldsense_types::{BotId, FilteredVisionBot};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bots: &BTreeMap<BotId, FilteredVisionBot>, s: S) -> Result<S::Ok, S::Error> {
        let list: Vec<&FilteredVisionBot> = bots.values().collect();
        list.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<BotId, FilteredVisionBot>, D::Error> {
        let list = Vec::<FilteredVisionBot>::deserialize(d)?;
        Ok(list.into_iter().map(|bot| (bot.bot_id, bot)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use fieldsense_types::{secs_to_ns, BallTrajectoryState};
    use nalgebra::Vector3;

    fn frame() -> FusedFrame {
        let bot = FilteredVisionBot {
            bot_id: BotId::yellow(2),
            timestamp: secs_to_ns(1.0),
            pos: Vector2::new(0.0, 0.0),
            vel: Vector2::new(1000.0, 0.0),
            orientation: 0.0,
            angular_vel: 0.0,
            uncertainty: 1.0,
            camera_id: 0,
        };
        let ball = FilteredVisionBall::visible(
            secs_to_ns(1.0),
            BallTrajectoryState {
                vel: Vector3::new(500.0, 0.0, 0.0),
                v_switch_to_roll: 500.0,
                ..Default::default()
            },
        )
        .unwrap();
        FusedFrame {
            id: 7,
            timestamp: secs_to_ns(1.0),
            ball,
            bots: BTreeMap::from([(bot.bot_id, bot)]),
            ..Default::default()
        }
    }

    #[test]
    fn extrapolating_to_own_timestamp_is_identity() {
        let f = frame();
        assert_eq!(f.extrapolate(f.timestamp, &BallParameters::default()), f);
    }

    #[test]
    fn extrapolation_advances_objects_without_touching_the_source() {
        let f = frame();
        let later = f.extrapolate(secs_to_ns(1.5), &BallParameters::default());
        assert_eq!(later.id, f.id);
        assert_eq!(later.timestamp, secs_to_ns(1.5));
        assert_abs_diff_eq!(later.bot(BotId::yellow(2)).unwrap().pos.x, 500.0, epsilon = 1e-9);
        assert!(later.ball.pos().x > 0.0);
        assert_eq!(f.bot(BotId::yellow(2)).unwrap().pos.x, 0.0);
    }

    #[test]
    fn frame_serializes_to_json() {
        let mut f = frame();
        f.layers.insert(
            DebugLayer::Viewports,
            vec![DebugShape::Text {
                pos: Vector2::zeros(),
                text: "cam 0".into(),
            }],
        );
        let json = serde_json::to_string(&f).unwrap();
        let back: FusedFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
