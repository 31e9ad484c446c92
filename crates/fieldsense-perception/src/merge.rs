//! Cross-camera merge of robot trackers.

use std::cmp::Ordering;

use fieldsense_types::{FilteredVisionBot, Timestamp};

use crate::robot_tracker::RobotTracker;

/// Candidate order: newest update first, then lowest uncertainty, then
/// lowest camera id.
fn preference(a: &RobotTracker, b: &RobotTracker) -> Ordering {
    b.last_update()
        .cmp(&a.last_update())
        .then_with(|| a.uncertainty().total_cmp(&b.uncertainty()))
        .then_with(|| a.camera_id().cmp(&b.camera_id()))
}

/// Merge the per-camera trackers of one robot into a single state at
/// `timestamp`.
///
/// Trackers whose last update lags `timestamp` by more than `stale_tolerance`
/// are not considered. Returns `None` when no candidate is left.
pub fn merge_robot_trackers<'a>(
    trackers: impl IntoIterator<Item = &'a RobotTracker>,
    timestamp: Timestamp,
    stale_tolerance: Timestamp,
) -> Option<FilteredVisionBot> {
    trackers
        .into_iter()
        .filter(|tracker| timestamp - tracker.last_update() <= stale_tolerance)
        .min_by(|a, b| preference(a, b))
        .map(|winner| winner.state_at(timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cam_filter::TrackerConfig;
    use fieldsense_types::{BotId, CamRobot, secs_to_ns};
    use nalgebra::Vector2;

    fn tracker(camera_id: u32, x: f64, t: f64) -> RobotTracker {
        let detection = CamRobot {
            bot_id: BotId::blue(1),
            pos: Vector2::new(x, 0.0),
            orientation: 0.0,
            confidence: 1.0,
            camera_id,
            t_capture: secs_to_ns(t),
            frame_number: 0,
        };
        RobotTracker::new(&detection, &TrackerConfig::default())
    }

    #[test]
    fn most_recent_tracker_wins() {
        let trackers = [tracker(0, 10.0, 1.00), tracker(1, 20.0, 1.01)];
        let merged = merge_robot_trackers(&trackers, secs_to_ns(1.01), secs_to_ns(0.2)).unwrap();
        assert_eq!(merged.camera_id, 1);
    }

    #[test]
    fn identical_candidates_fall_back_to_lowest_camera_id() {
        let trackers = [tracker(5, 10.0, 1.0), tracker(2, 20.0, 1.0)];
        let merged = merge_robot_trackers(&trackers, secs_to_ns(1.0), secs_to_ns(0.2)).unwrap();
        assert_eq!(merged.camera_id, 2);
    }

    #[test]
    fn stale_trackers_are_excluded() {
        let trackers = [tracker(0, 10.0, 0.5), tracker(1, 20.0, 0.95)];
        let merged = merge_robot_trackers(&trackers, secs_to_ns(1.0), secs_to_ns(0.2)).unwrap();
        assert_eq!(merged.camera_id, 1);

        let only_stale = [tracker(0, 10.0, 0.5)];
        assert!(merge_robot_trackers(&only_stale, secs_to_ns(1.0), secs_to_ns(0.2)).is_none());
    }

    #[test]
    fn merged_state_is_at_requested_time() {
        let trackers = [tracker(0, 10.0, 1.0)];
        let merged = merge_robot_trackers(&trackers, secs_to_ns(1.05), secs_to_ns(0.2)).unwrap();
        assert_eq!(merged.timestamp, secs_to_ns(1.05));
        assert_eq!(merged.bot_id, BotId::blue(1));
    }
}
