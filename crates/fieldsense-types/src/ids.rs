//! Robot and camera identities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a physical overhead camera.
pub type CameraId = u32;

/// Team colour of a robot marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamColor {
    Yellow,
    Blue,
}

/// Identity of a robot on the field: team colour plus shirt number.
///
/// Identities are unique across the field; the fusion stage relies on this to
/// group per-camera trackers of the same robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BotId {
    pub team: TeamColor,
    pub number: u8,
}

impl BotId {
    pub fn new(team: TeamColor, number: u8) -> Self {
        Self { team, number }
    }

    pub fn yellow(number: u8) -> Self {
        Self::new(TeamColor::Yellow, number)
    }

    pub fn blue(number: u8) -> Self {
        Self::new(TeamColor::Blue, number)
    }
}

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.team {
            TeamColor::Yellow => 'Y',
            TeamColor::Blue => 'B',
        };
        write!(f, "{prefix}{}", self.number)
    }
}
