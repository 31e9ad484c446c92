//! [`CameraWatchdog`] – detects stalled or disconnected cameras.
//!
//! Cameras never announce that they went away. Instead every accepted frame
//! counts as a heartbeat, and a camera whose last heartbeat deviates from
//! the other cameras by more than the tolerance is considered stale. The
//! reference is the median of all heartbeat timestamps, so a single camera
//! drifting away cannot drag the reference with it.
//!
//! # Example
//!
//! ```
//! use fieldsense_kernel::watchdog::{CameraHealth, CameraWatchdog};
//!
//! let mut wd = CameraWatchdog::new(500_000_000);
//! wd.heartbeat(0, 1_000_000_000);
//! wd.heartbeat(1, 1_000_000_000);
//! wd.heartbeat(2, 1_600_000_000);
//!
//! assert_eq!(wd.health(0), CameraHealth::Healthy);
//! assert_eq!(wd.check_all(), vec![2]);
//! ```

use std::collections::BTreeMap;

use fieldsense_types::{CameraId, Timestamp};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Health state reported for a single camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraHealth {
    /// The camera's last frame is close to the other cameras'.
    Healthy,
    /// The camera drifted beyond the tolerance or is unknown.
    Stale,
}

// ────────────────────────────────────────────────────────────────────────────
// CameraWatchdog
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CameraWatchdog {
    tolerance: Timestamp,
    heartbeats: BTreeMap<CameraId, Timestamp>,
}

impl CameraWatchdog {
    /// `tolerance` is the allowed deviation from the reference in ns.
    pub fn new(tolerance: Timestamp) -> Self {
        Self {
            tolerance,
            heartbeats: BTreeMap::new(),
        }
    }

    /// Record the capture time of the latest frame of `camera_id`.
    pub fn heartbeat(&mut self, camera_id: CameraId, timestamp: Timestamp) {
        let entry = self.heartbeats.entry(camera_id).or_insert(timestamp);
        *entry = (*entry).max(timestamp);
    }

    pub fn remove(&mut self, camera_id: CameraId) {
        self.heartbeats.remove(&camera_id);
    }

    pub fn clear(&mut self) {
        self.heartbeats.clear();
    }

    /// Median of all heartbeat timestamps. For an even count the upper
    /// median is used, so with two cameras the silent one is the stale one.
    pub fn reference_timestamp(&self) -> Option<Timestamp> {
        let mut times: Vec<Timestamp> = self.heartbeats.values().copied().collect();
        if times.is_empty() {
            return None;
        }
        times.sort_unstable();
        Some(times[times.len() / 2])
    }

    pub fn health(&self, camera_id: CameraId) -> CameraHealth {
        match (self.heartbeats.get(&camera_id), self.reference_timestamp()) {
            (Some(t), Some(reference)) if (t - reference).abs() <= self.tolerance => CameraHealth::Healthy,
            _ => CameraHealth::Stale,
        }
    }

    /// Ids of all stale cameras, ascending.
    pub fn check_all(&self) -> Vec<CameraId> {
        let Some(reference) = self.reference_timestamp() else {
            return Vec::new();
        };
        self.heartbeats
            .iter()
            .filter(|(_, t)| (**t - reference).abs() > self.tolerance)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn cameras(&self) -> impl Iterator<Item = CameraId> + '_ {
        self.heartbeats.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Timestamp = 1_000_000;

    #[test]
    fn single_camera_is_never_stale() {
        let mut wd = CameraWatchdog::new(500 * MS);
        wd.heartbeat(3, 42 * MS);
        assert!(wd.check_all().is_empty());
        assert_eq!(wd.health(3), CameraHealth::Healthy);
    }

    #[test]
    fn drifting_camera_is_isolated() {
        let mut wd = CameraWatchdog::new(500 * MS);
        wd.heartbeat(0, 1000 * MS);
        wd.heartbeat(1, 1000 * MS);
        wd.heartbeat(2, 1600 * MS);
        assert_eq!(wd.check_all(), vec![2]);
        assert_eq!(wd.health(2), CameraHealth::Stale);
    }

    #[test]
    fn lagging_camera_is_isolated() {
        let mut wd = CameraWatchdog::new(500 * MS);
        wd.heartbeat(0, 100 * MS);
        wd.heartbeat(1, 2000 * MS);
        wd.heartbeat(2, 2010 * MS);
        assert_eq!(wd.check_all(), vec![0]);
    }

    #[test]
    fn heartbeats_never_move_backwards() {
        let mut wd = CameraWatchdog::new(500 * MS);
        wd.heartbeat(0, 1000 * MS);
        wd.heartbeat(0, 10 * MS);
        assert_eq!(wd.reference_timestamp(), Some(1000 * MS));
    }

    #[test]
    fn unknown_camera_is_stale() {
        let wd = CameraWatchdog::new(500 * MS);
        assert_eq!(wd.health(9), CameraHealth::Stale);
    }

    #[test]
    fn removed_camera_no_longer_counts() {
        let mut wd = CameraWatchdog::new(500 * MS);
        wd.heartbeat(0, 0);
        wd.heartbeat(1, 1000 * MS);
        assert_eq!(wd.check_all(), vec![0]);
        wd.remove(0);
        assert!(wd.check_all().is_empty());
        assert_eq!(wd.cameras().collect::<Vec<_>>(), vec![1]);
    }
}
