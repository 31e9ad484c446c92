//! Error taxonomy shared by every FieldSense crate.

use thiserror::Error;

use crate::ids::CameraId;

/// Global error type of the vision pipeline.
///
/// Per-detection and per-camera problems are absorbed where they are
/// detected; only the variants below ever cross a crate boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisionError {
    /// A ball state violated a physical invariant (non-finite values or a
    /// negative switch-to-roll velocity).
    #[error("Invalid ball state: {0}")]
    InvalidBallState(String),

    /// A physical configuration cannot produce a meaningful answer (e.g. a
    /// non-positive chip damping product).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Camera geometry failed the sanity checks.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Unknown camera {0}")]
    UnknownCamera(CameraId),

    /// The event bus could not deliver a message.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Async runtime problems (e.g. starting the publish task outside Tokio).
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vision_error_display() {
        let err = VisionError::InvalidBallState("v_switch_to_roll is NaN".to_string());
        assert!(err.to_string().contains("Invalid ball state"));
        assert!(err.to_string().contains("NaN"));

        let err2 = VisionError::UnknownCamera(7);
        assert_eq!(err2.to_string(), "Unknown camera 7");
    }
}
