//! End-to-end scenarios through the whole vision pipeline.

use std::collections::BTreeMap;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use fieldsense_middleware::{EventPayload, Topic};
use fieldsense_perception::{
    BallFilter, BallFilterConfig, BallFilterPreprocessor, BallObservation, BallRegime, DebugLayer, DebugShape,
    PreprocessorConfig,
};
use fieldsense_physics::{BallParameters, BallTrajectory, FilteredVisionBall};
use fieldsense_runtime::{VisionFilter, VisionFilterConfig};
use fieldsense_types::{BotId, CamDetectionFrame, FilteredVisionBot, KickKind, secs_to_ns};
use nalgebra::{Vector2, Vector3};

const FRAME_DT: f64 = 1.0 / 60.0;

fn inline_filter() -> VisionFilter {
    VisionFilter::new(VisionFilterConfig {
        use_threads: false,
        ..Default::default()
    })
    .unwrap()
}

fn frame(camera_id: u32, number: u64, t: f64) -> CamDetectionFrame {
    CamDetectionFrame::new(camera_id, number, secs_to_ns(t))
}

#[test]
fn drifting_camera_is_evicted() {
    let filter = inline_filter();
    let t = 10.0;
    filter.process_detection_frame(&frame(0, 1, t).with_robot(BotId::blue(0), Vector2::new(-2000.0, 0.0), 0.0));
    filter.process_detection_frame(&frame(1, 1, t).with_robot(BotId::blue(1), Vector2::new(2000.0, 0.0), 0.0));
    filter.process_detection_frame(&frame(2, 1, t + 0.6).with_robot(BotId::blue(2), Vector2::zeros(), 0.0));

    let latest = filter.latest_frame();
    assert_eq!(latest.cameras, vec![0, 1]);
    assert_eq!(filter.cameras(), vec![0, 1]);
    assert_eq!(latest.timestamp, secs_to_ns(t));
    assert!(latest.bot(BotId::blue(2)).is_none());
}

#[test]
fn frame_timestamps_never_run_backwards() {
    let filter = inline_filter();
    let schedule = [
        (0, 1.000),
        (1, 0.990),
        (0, 1.016),
        (1, 1.006),
        (0, 1.010), // older than camera 0's last frame, dropped
        (1, 1.030),
        (0, 1.032),
        (1, 1.020), // dropped
        (0, 1.048),
    ];
    let mut stamps = Vec::new();
    for (i, (camera, t)) in schedule.into_iter().enumerate() {
        filter.process_detection_frame(&frame(camera, i as u64, t));
        stamps.push(filter.latest_frame().timestamp);
    }
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]), "timestamps {stamps:?}");
    assert_eq!(*stamps.last().unwrap(), secs_to_ns(1.048));
}

#[test]
fn flickering_robot_is_tracked_but_not_published() {
    let filter = inline_filter();
    let steady = BotId::yellow(1);
    let ghost = BotId::yellow(2);

    let mut number = 0;
    let mut feed = |filter: &VisionFilter, frames: u64, ghost_every: u64| {
        for _ in 0..frames {
            number += 1;
            let t = 1.0 + number as f64 * FRAME_DT;
            let mut detection = frame(0, number, t).with_robot(steady, Vector2::new(-1000.0, 0.0), 0.0);
            if number % ghost_every == 0 {
                detection = detection.with_robot(ghost, Vector2::new(1000.0, 500.0), 0.0);
            }
            filter.process_detection_frame(&detection);
        }
    };

    feed(&filter, 40, 10);
    let latest = filter.latest_frame();
    assert!(latest.bot(steady).is_some());
    assert!(latest.bot(ghost).is_none());
    let quality_labels: Vec<String> = latest.layers[&DebugLayer::RobotQuality]
        .iter()
        .filter_map(|shape| match shape {
            DebugShape::Text { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert!(
        quality_labels.iter().any(|label| label.starts_with(&ghost.to_string())),
        "ghost still tracked internally: {quality_labels:?}"
    );

    // Once seen reliably the robot is published, exactly once.
    feed(&filter, 40, 1);
    let latest = filter.latest_frame();
    assert!(latest.bot(ghost).is_some());
    assert_eq!(latest.bots.len(), 2);
}

#[test]
fn robot_seen_by_two_cameras_is_published_once() {
    let filter = inline_filter();
    let bot = BotId::blue(4);
    for i in 1..=30u64 {
        let t = 1.0 + i as f64 * FRAME_DT;
        filter.process_detection_frame(&frame(0, i, t).with_robot(bot, Vector2::new(0.0, 0.0), 0.0));
        filter.process_detection_frame(&frame(1, i, t + 0.001).with_robot(bot, Vector2::new(5.0, 0.0), 0.0));
    }
    let latest = filter.latest_frame();
    assert_eq!(latest.bots.len(), 1);
    // Camera 1 reported last.
    assert_eq!(latest.bot(bot).map(|b| b.camera_id), Some(1));
}

#[test]
fn late_detections_move_the_viewport_border() {
    let filter = inline_filter();
    filter.process_detection_frame(&frame(0, 1, 1.0).with_robot(BotId::blue(0), Vector2::new(-3000.0, 0.0), 0.0));
    filter.process_detection_frame(&frame(1, 1, 1.001));

    let near_center = BotId::blue(5);
    for i in 2..=61u64 {
        let t = 1.0 + i as f64 * FRAME_DT;
        filter.process_detection_frame(&frame(0, i, t).with_robot(near_center, Vector2::new(-800.0, 0.0), 0.0));
        filter.process_detection_frame(
            &frame(1, i, t + 0.001).with_robot(BotId::yellow(1), Vector2::new(3000.0, 0.0), 0.0),
        );
    }
    let latest = filter.latest_frame();
    assert_eq!(latest.bot(near_center).map(|b| b.camera_id), Some(0));
    assert!(latest.bot(BotId::yellow(1)).is_some());
}

#[test]
fn rolling_ball_is_followed() {
    let filter = inline_filter();
    for i in 1..=30u64 {
        let t = i as f64 * FRAME_DT;
        let x = 2000.0 * t;
        filter.process_detection_frame(&frame(0, i, 1.0 + t).with_ball(Vector3::new(x, 0.0, 0.0)));
    }
    let latest = filter.latest_frame();
    assert_eq!(latest.ball_regime, BallRegime::Rolling);
    assert!(latest.ball.pos().x > 800.0, "ball at {}", latest.ball.pos());
    assert!((1000.0..3000.0).contains(&latest.ball.vel().x), "ball velocity {}", latest.ball.vel());
    assert_abs_diff_eq!(latest.ball.invisible_for(), 0.0, epsilon = 1e-9);
}

#[test]
fn extrapolating_to_own_timestamp_is_identity() {
    let filter = inline_filter();
    for i in 1..=10u64 {
        let t = 1.0 + i as f64 * FRAME_DT;
        filter.process_detection_frame(
            &frame(0, i, t)
                .with_robot(BotId::blue(1), Vector2::new(100.0 * i as f64, 0.0), 0.0)
                .with_ball(Vector3::new(50.0 * i as f64, 0.0, 0.0)),
        );
    }
    let latest = filter.latest_frame();
    assert_eq!(filter.extrapolate_frame(latest.timestamp), *latest);
    assert_eq!(filter.extrapolate_frame(latest.timestamp - 1_000), *latest);

    let ahead = filter.extrapolate_frame(latest.timestamp + secs_to_ns(0.1));
    assert_eq!(ahead.id, latest.id);
    assert!(ahead.timestamp > latest.timestamp);
    // The stored frame is untouched.
    assert_eq!(filter.latest_frame().timestamp, latest.timestamp);
}

#[test]
fn chip_kick_next_to_robot_switches_ball_to_chipped() {
    let params = BallParameters::default();
    let mut pre = BallFilterPreprocessor::new(PreprocessorConfig::default(), params);
    let mut ball_filter = BallFilter::new(BallFilterConfig::default(), params);
    let robots = [FilteredVisionBot {
        bot_id: BotId::yellow(7),
        timestamp: 0,
        pos: Vector2::new(-90.0, 0.0),
        vel: Vector2::zeros(),
        orientation: 0.0,
        angular_vel: 0.0,
        uncertainty: 1.0,
        camera_id: 0,
    }];
    let infos = BTreeMap::new();
    let observation = |t: f64, vel: Vector3<f64>| BallObservation {
        camera_id: 0,
        tracker_id: 0,
        timestamp: secs_to_ns(t),
        pos: Vector3::new(2000.0 * (t - 1.0), 0.0, 0.0),
        vel,
        uncertainty: 1.0,
        tracker_updates: 10,
    };

    let first = observation(1.0, Vector3::new(2000.0, 0.0, 0.0));
    let out = pre.update(&FilteredVisionBall::default(), &[first], &robots, &infos);
    assert!(out.kick_event.is_none());
    let ball = ball_filter.update(&out, first.timestamp);
    assert_eq!(ball.regime, BallRegime::Rolling);

    let second = observation(1.016, Vector3::new(2000.0, 0.0, 3000.0));
    let out = pre.update(ball_filter.current(), &[second], &robots, &infos);
    assert!(out.kick_event.is_none());
    ball_filter.update(&out, second.timestamp);

    let third = observation(1.032, Vector3::new(2000.0, 0.0, 2840.0));
    let out = pre.update(ball_filter.current(), &[third], &robots, &infos);
    let kick = out.kick_event.clone().expect("chip kick");
    assert_eq!(kick.kind, KickKind::Chip);
    assert_eq!(kick.kicking_bot, BotId::yellow(7));
    assert_eq!(kick.position, second.pos);

    let ball = ball_filter.update(&out, third.timestamp);
    assert_eq!(ball.regime, BallRegime::Chipped);
    let fit = ball.kick_fit_state.expect("kick fit state");
    let trajectory = BallTrajectory::from_state(&fit, &params);
    assert!(trajectory.is_chipped());
    assert_abs_diff_eq!(trajectory.pos_at(0.0), kick.position, epsilon = 1e-9);
}

#[tokio::test]
async fn publish_task_streams_frames_until_stopped() -> Result<(), Box<dyn std::error::Error>> {
    let filter = VisionFilter::new(VisionFilterConfig {
        publish_interval_ms: 5.0,
        ..Default::default()
    })?;
    let mut frames = filter.bus().subscribe_to(Topic::Frames);
    filter.start()?;
    assert!(filter.is_running());

    filter.process_detection_frame(&frame(3, 1, 2.0).with_robot(BotId::blue(9), Vector2::zeros(), 0.0));

    let received = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match frames.next().await {
                Some(event) => match event.payload {
                    EventPayload::Frame(frame) if frame.cameras == vec![3] => return Some(frame),
                    _ => continue,
                },
                None => return None,
            }
        }
    })
    .await?;
    let received = received.ok_or("bus closed")?;
    assert_eq!(received.timestamp, secs_to_ns(2.0));

    filter.stop().await;
    assert!(!filter.is_running());
    assert!(filter.cameras().is_empty());
    assert_eq!(filter.latest_frame().timestamp, 0);
    Ok(())
}

#[tokio::test]
async fn starting_twice_keeps_one_task() -> Result<(), Box<dyn std::error::Error>> {
    let filter = VisionFilter::new(VisionFilterConfig::default())?;
    filter.start()?;
    filter.start()?;
    assert!(filter.is_running());
    filter.stop().await;
    assert!(!filter.is_running());
    Ok(())
}
