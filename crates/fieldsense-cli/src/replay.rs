//! Replay of recorded vision input.
//!
//! A recording is a JSON-lines file; every line is one tagged record:
//!
//! ```text
//! {"type":"geometry","field":{"field_length":12000,"field_width":9000,"boundary_width":300}}
//! {"type":"robot_info","bot_id":{"team":"blue","number":3},"chip_armed":true}
//! {"type":"detection","camera_id":0,"frame_number":1,"t_capture":1000000000,"robots":[],"balls":[]}
//! {"type":"reset_ball","pos":[0,0,0],"vel":[0,0,0]}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fieldsense_middleware::{EventPayload, Topic, TopicReceiver};
use fieldsense_runtime::VisionFilter;
use fieldsense_types::{CamDetectionFrame, CamGeometry, RobotInfo, VisionError};
use nalgebra::Vector3;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayRecord {
    Detection(CamDetectionFrame),
    Geometry(CamGeometry),
    RobotInfo(RobotInfo),
    ResetBall { pos: Vector3<f64>, vel: Vector3<f64> },
}

/// Counters reported once the replay ends.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplaySummary {
    pub records: usize,
    pub skipped_lines: usize,
    pub frames: usize,
    pub kicks: usize,
}

/// Feed every record of `input` into `filter`, writing each published frame
/// to `out` as one JSON line (unless `quiet`). Stops early once `shutdown`
/// is set.
pub fn run<R: BufRead, W: Write>(
    filter: &VisionFilter,
    input: R,
    out: &mut W,
    quiet: bool,
    shutdown: &Arc<AtomicBool>,
) -> Result<ReplaySummary, VisionError> {
    let bus = filter.bus();
    let mut frames = bus.subscribe_to(Topic::Frames);
    let mut kicks = bus.subscribe_to(Topic::Kicks);
    let mut summary = ReplaySummary::default();

    for (index, line) in input.lines().enumerate() {
        if shutdown.load(Ordering::SeqCst) {
            info!(line = index + 1, "replay interrupted");
            break;
        }
        let line = line.map_err(|e| VisionError::Runtime(format!("failed to read recording: {e}")))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let record: ReplayRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = index + 1, error = %e, "skipping unreadable record");
                summary.skipped_lines += 1;
                continue;
            }
        };
        summary.records += 1;
        apply(filter, record);

        summary.kicks += drain_kicks(&mut kicks);
        summary.frames += drain_frames(&mut frames, out, quiet)?;
    }

    Ok(summary)
}

fn apply(filter: &VisionFilter, record: ReplayRecord) {
    match record {
        ReplayRecord::Detection(frame) => filter.process_detection_frame(&frame),
        ReplayRecord::Geometry(geometry) => {
            if let Err(e) = filter.on_new_camera_geometry(&geometry) {
                warn!(error = %e, "geometry record rejected");
            }
        }
        ReplayRecord::RobotInfo(info) => filter.update_robot_info(info),
        ReplayRecord::ResetBall { pos, vel } => filter.reset_ball(pos, vel),
    }
}

fn drain_frames<W: Write>(frames: &mut TopicReceiver, out: &mut W, quiet: bool) -> Result<usize, VisionError> {
    let mut count = 0;
    while let Some(event) = frames.try_next() {
        if let EventPayload::Frame(frame) = event.payload {
            count += 1;
            if !quiet {
                let json = serde_json::to_string(frame.as_ref())
                    .map_err(|e| VisionError::Runtime(format!("failed to encode frame {}: {e}", frame.id)))?;
                writeln!(out, "{json}").map_err(|e| VisionError::Runtime(format!("failed to write frame: {e}")))?;
            }
        }
    }
    Ok(count)
}

fn drain_kicks(kicks: &mut TopicReceiver) -> usize {
    let mut count = 0;
    while let Some(event) = kicks.try_next() {
        if let EventPayload::Kick(kick) = event.payload {
            info!(kind = ?kick.kind, bot = %kick.kicking_bot, t = kick.timestamp, "kick");
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsense_runtime::VisionFilterConfig;

    fn inline_filter() -> VisionFilter {
        VisionFilter::new(VisionFilterConfig {
            use_threads: false,
            ..Default::default()
        })
        .expect("valid config")
    }

    const RECORDING: &str = r#"
# two frames from one camera
{"type":"geometry","field":{"field_length":12000,"field_width":9000,"boundary_width":300}}
{"type":"robot_info","bot_id":{"team":"blue","number":3}}
{"type":"detection","camera_id":0,"frame_number":1,"t_capture":1000000000,"robots":[{"bot_id":{"team":"blue","number":3},"pos":[100.0,0.0],"orientation":0.0}],"balls":[{"pos":[0.0,0.0,0.0]}]}
this line is not json
{"type":"detection","camera_id":0,"frame_number":2,"t_capture":1016000000,"balls":[{"pos":[30.0,0.0,0.0]}]}
{"type":"reset_ball","pos":[0.0,0.0,0.0],"vel":[0.0,0.0,0.0]}
"#;

    #[test]
    fn replay_prints_one_json_line_per_frame() {
        let filter = inline_filter();
        let mut out = Vec::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let summary = run(&filter, RECORDING.as_bytes(), &mut out, false, &shutdown).expect("replay");

        assert_eq!(summary.records, 5);
        assert_eq!(summary.skipped_lines, 1);
        assert_eq!(summary.frames, 2);

        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).expect("frame json"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["timestamp"], 1_016_000_000i64);
    }

    #[test]
    fn shutdown_flag_stops_replay() {
        let filter = inline_filter();
        let mut out = Vec::new();
        let shutdown = Arc::new(AtomicBool::new(true));
        let summary = run(&filter, RECORDING.as_bytes(), &mut out, true, &shutdown).expect("replay");
        assert_eq!(summary, ReplaySummary::default());
        assert!(out.is_empty());
    }
}
