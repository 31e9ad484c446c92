//! [`VisionFilter`] – the fusion orchestrator.
//!
//! Owns one [`CamFilter`] per camera and turns their trackers into one
//! [`FusedFrame`] per publish cycle:
//!
//! 1. **Evict** cameras whose timestamp drifted away from the others
//!    ([`CameraWatchdog`]).
//! 2. **Stamp** the cycle with the newest camera timestamp, never earlier
//!    than the previous frame.
//! 3. **Merge** every robot's per-camera trackers into one state.
//! 4. **Gate** robots through the [`RobotQualityInspector`]; failing robots
//!    stay tracked but are not published.
//! 5. **Ball** observations run through the [`BallFilterPreprocessor`] and
//!    the [`BallFilter`].
//! 6. **Publish** the frame on the [`EventBus`] after the [`FrameInspector`]
//!    annotated it.
//!
//! Detection frames can be fed from any thread. The camera table is a
//! mutex-guarded map shared between the ingest path and the publish cycle;
//! neither holds it for longer than one merge pass.
//!
//! # Publishing modes
//!
//! With [`VisionFilterConfig::use_threads`] a Tokio task publishes every
//! [`VisionFilterConfig::publish_interval_ms`] once [`VisionFilter::start`]
//! ran. While no publish task is running, every accepted detection frame
//! publishes inline.
//!
//! # Example
//!
//! ```rust
//! use fieldsense_runtime::{VisionFilter, VisionFilterConfig};
//! use fieldsense_types::{BotId, CamDetectionFrame};
//! use nalgebra::Vector2;
//!
//! let filter = VisionFilter::new(VisionFilterConfig {
//!     use_threads: false,
//!     ..Default::default()
//! })
//! .expect("valid config");
//!
//! let frame = CamDetectionFrame::new(0, 1, 1_000_000_000)
//!     .with_robot(BotId::yellow(1), Vector2::new(100.0, 0.0), 0.0);
//! filter.process_detection_frame(&frame);
//! assert_eq!(filter.latest_frame().timestamp, 1_000_000_000);
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use fieldsense_kernel::{CameraWatchdog, FrameInspector, GeometryInspector, RobotQualityInspector};
use fieldsense_middleware::{EventBus, EventPayload};
use fieldsense_perception::preprocessor::observations_from_cameras;
use fieldsense_perception::robot_tracker::RobotTracker;
use fieldsense_perception::{
    BallFilter, BallFilterPreprocessor, BallObservation, CamFilter, DebugLayer, DebugShape, FusedFrame,
    PreprocessorOutput, ViewportArchitect, ViewportUpdate, merge_robot_trackers,
};
use fieldsense_types::{
    AnnotationKind, BotId, CamDetectionFrame, CamGeometry, CameraId, FilteredVisionBot, QualityAnnotation,
    RobotInfo, Timestamp, VisionError,
};
use nalgebra::{Vector2, Vector3};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::VisionFilterConfig;

/// `source` field of every event this module emits.
const EVENT_SOURCE: &str = "vision_filter";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Shared state
// ────────────────────────────────────────────────────────────────────────────

/// Everything besides the camera table. Locked for a whole publish cycle,
/// always before `cams` when both are needed.
struct FusionState {
    watchdog: CameraWatchdog,
    architect: ViewportArchitect,
    robot_quality: RobotQualityInspector,
    preprocessor: BallFilterPreprocessor,
    ball_filter: BallFilter,
    inspector: FrameInspector,
    geometry_inspector: GeometryInspector,
    /// Annotations raised between cycles, attached to the next frame.
    pending_annotations: Vec<QualityAnnotation>,
    next_frame_id: u64,
}

impl FusionState {
    fn new(config: &VisionFilterConfig) -> Self {
        let mut preprocessor = BallFilterPreprocessor::new(config.preprocessor.clone(), config.ball);
        preprocessor.set_model_identification(config.model_identification);
        Self {
            watchdog: CameraWatchdog::new(config.camera_staleness()),
            architect: ViewportArchitect::new(config.viewport.clone()),
            robot_quality: RobotQualityInspector::new(config.robot_quality.clone()),
            preprocessor,
            ball_filter: BallFilter::new(config.ball_filter.clone(), config.ball),
            inspector: FrameInspector::with_default_rules(&config.inspector),
            geometry_inspector: GeometryInspector::new(config.inspector.clone()),
            pending_annotations: Vec::new(),
            next_frame_id: 1,
        }
    }
}

struct Inner {
    config: VisionFilterConfig,
    cams: Mutex<BTreeMap<CameraId, CamFilter>>,
    state: Mutex<FusionState>,
    geometry: RwLock<Option<CamGeometry>>,
    robot_infos: RwLock<BTreeMap<BotId, RobotInfo>>,
    latest: RwLock<Arc<FusedFrame>>,
    bus: EventBus,
}

/// Handle of the running publish task.
struct PublishTask {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

// ────────────────────────────────────────────────────────────────────────────
// VisionFilter
// ────────────────────────────────────────────────────────────────────────────

pub struct VisionFilter {
    inner: Arc<Inner>,
    task: Mutex<Option<PublishTask>>,
}

impl VisionFilter {
    /// # Errors
    ///
    /// [`VisionError::InvalidConfiguration`] when `config` does not
    /// validate.
    pub fn new(config: VisionFilterConfig) -> Result<Self, VisionError> {
        Self::with_bus(config, EventBus::default())
    }

    /// Like [`VisionFilter::new`], publishing on an existing bus.
    pub fn with_bus(config: VisionFilterConfig, bus: EventBus) -> Result<Self, VisionError> {
        config.validate()?;
        let state = FusionState::new(&config);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                cams: Mutex::new(BTreeMap::new()),
                state: Mutex::new(state),
                geometry: RwLock::new(None),
                robot_infos: RwLock::new(BTreeMap::new()),
                latest: RwLock::new(Arc::new(FusedFrame::default())),
                bus,
            }),
            task: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &VisionFilterConfig {
        &self.inner.config
    }

    /// Bus on which frames, viewport updates, kicks, model identification
    /// results and quality annotations are published.
    pub fn bus(&self) -> EventBus {
        self.inner.bus.clone()
    }

    /// The most recently published frame.
    pub fn latest_frame(&self) -> Arc<FusedFrame> {
        Arc::clone(&read(&self.inner.latest))
    }

    /// Ids of the cameras currently registered.
    pub fn cameras(&self) -> Vec<CameraId> {
        lock(&self.inner.cams).keys().copied().collect()
    }

    // ── Inputs ──────────────────────────────────────────────────────────────

    /// Feed one camera detection frame.
    ///
    /// Frames with a non-positive capture time are skipped; frames not newer
    /// than the camera's last one are dropped by its filter.
    pub fn process_detection_frame(&self, frame: &CamDetectionFrame) {
        if self.inner.ingest(frame) && !self.is_running() {
            self.inner.publish();
        }
    }

    /// Apply a new geometry packet to every camera and re-layout the
    /// viewports.
    ///
    /// # Errors
    ///
    /// [`VisionError::InvalidGeometry`] when the packet is implausible; the
    /// previous geometry stays in effect and the rejection is annotated on
    /// the next frame.
    pub fn on_new_camera_geometry(&self, geometry: &CamGeometry) -> Result<(), VisionError> {
        self.inner.apply_geometry(geometry)
    }

    /// Replace the auxiliary robot information used to attribute kicks.
    pub fn set_robot_infos(&self, infos: impl IntoIterator<Item = RobotInfo>) {
        *write(&self.inner.robot_infos) = infos.into_iter().map(|info| (info.bot_id, info)).collect();
    }

    pub fn update_robot_info(&self, info: RobotInfo) {
        write(&self.inner.robot_infos).insert(info.bot_id, info);
    }

    /// Place the ball at `pos` moving with `vel`, discarding kick history.
    pub fn reset_ball(&self, pos: Vector3<f64>, vel: Vector3<f64>) {
        let timestamp = read(&self.inner.latest).timestamp;
        let mut state = lock(&self.inner.state);
        state.preprocessor.clear();
        state.ball_filter.reset_ball(pos, vel, timestamp);
        info!(x = pos.x, y = pos.y, z = pos.z, "ball reset");
    }

    pub fn set_model_identification(&self, enabled: bool) {
        lock(&self.inner.state).preprocessor.set_model_identification(enabled);
    }

    // ── Outputs ─────────────────────────────────────────────────────────────

    /// Run one publish cycle now and return the frame it produced.
    pub fn publish(&self) -> Arc<FusedFrame> {
        self.inner.publish()
    }

    /// The latest frame advanced to `t`. The stored frame is left untouched;
    /// for `t` not after its timestamp the frame is returned as is.
    pub fn extrapolate_frame(&self, t: Timestamp) -> FusedFrame {
        self.latest_frame().extrapolate(t, &self.inner.config.ball)
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Forget every camera, the ball history and the last frame.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// `true` while the background publish task is running.
    pub fn is_running(&self) -> bool {
        lock(&self.task).as_ref().is_some_and(|task| !task.handle.is_finished())
    }

    /// Spawn the periodic publish task on the current Tokio runtime.
    ///
    /// A no-op when the task already runs or `use_threads` is off.
    ///
    /// # Errors
    ///
    /// [`VisionError::Runtime`] when called outside a Tokio runtime.
    pub fn start(&self) -> Result<(), VisionError> {
        if !self.inner.config.use_threads {
            info!("publish task disabled, publishing inline");
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| VisionError::Runtime(format!("publish task needs a Tokio runtime: {e}")))?;

        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Ok(());
        }

        let period = Duration::from_secs_f64(self.inner.config.publish_interval_ms / 1000.0);
        let (cancel, mut cancelled) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        inner.publish();
                    }
                    changed = cancelled.changed() => {
                        if changed.is_err() || *cancelled.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("publish task stopped");
        });
        info!(interval_ms = self.inner.config.publish_interval_ms, "publish task started");
        *task = Some(PublishTask { cancel, handle });
        Ok(())
    }

    /// Stop the publish task (letting an in-flight cycle finish) and clear
    /// all per-camera state.
    pub async fn stop(&self) {
        let task = lock(&self.task).take();
        if let Some(task) = task {
            let _ = task.cancel.send(true);
            if let Err(e) = task.handle.await {
                warn!(error = %e, "publish task ended abnormally");
            }
        }
        self.inner.clear();
    }
}

impl Drop for VisionFilter {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            let _ = task.cancel.send(true);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

impl Inner {
    /// Ingest path. Returns `true` when the frame was accepted.
    fn ingest(&self, frame: &CamDetectionFrame) -> bool {
        if frame.t_capture <= 0 {
            debug!(camera_id = frame.camera_id, t = frame.t_capture, "skipping frame without capture time");
            return false;
        }
        let frame = frame.clone().stamped();

        let accepted = {
            let mut cams = lock(&self.cams);
            let cam = cams.entry(frame.camera_id).or_insert_with(|| {
                info!(camera_id = frame.camera_id, "camera added");
                let mut cam = CamFilter::new(frame.camera_id, self.config.tracker.clone());
                if let Some(geometry) = read(&self.geometry).as_ref() {
                    cam.update_field(geometry.field);
                    if let Some(calibration) = geometry.calibrations.get(&frame.camera_id) {
                        cam.update_calibration(calibration.clone());
                    }
                }
                cam
            });
            cam.update(&frame)
        };
        if !accepted {
            return false;
        }

        let mut state = lock(&self.state);
        state.watchdog.heartbeat(frame.camera_id, frame.t_capture);
        for robot in &frame.robots {
            state.robot_quality.add_detection(robot);
        }
        let duplicates = state.inspector.inspect_detection(&frame);
        state.pending_annotations.extend(duplicates);
        true
    }

    fn apply_geometry(&self, geometry: &CamGeometry) -> Result<(), VisionError> {
        let mut state = lock(&self.state);
        if let Err(error) = state.geometry_inspector.inspect(geometry) {
            let timestamp = read(&self.latest).timestamp;
            state.pending_annotations.push(QualityAnnotation::new(
                AnnotationKind::InvalidGeometry,
                timestamp,
                error.to_string(),
            ));
            return Err(error);
        }
        *write(&self.geometry) = Some(geometry.clone());

        let updates = state.architect.new_camera_geometry(geometry);
        {
            let mut cams = lock(&self.cams);
            for (id, cam) in cams.iter_mut() {
                cam.update_field(geometry.field);
                if let Some(calibration) = geometry.calibrations.get(id) {
                    cam.update_calibration(calibration.clone());
                }
            }
            apply_viewports(&mut cams, &updates, state.architect.margin());
        }
        drop(state);
        info!(cameras = geometry.calibrations.len(), "camera geometry applied");
        self.emit_viewports(updates);
        Ok(())
    }

    fn clear(&self) {
        let mut state = lock(&self.state);
        lock(&self.cams).clear();
        let next_frame_id = state.next_frame_id;
        *state = FusionState::new(&self.config);
        state.next_frame_id = next_frame_id;
        *write(&self.latest) = Arc::new(FusedFrame::default());
        info!("vision filter cleared");
    }

    /// One full publish cycle.
    fn publish(&self) -> Arc<FusedFrame> {
        let previous = Arc::clone(&read(&self.latest));
        let robot_infos = read(&self.robot_infos).clone();
        let mut state = lock(&self.state);

        // Steps 1 to 3 and the ball observations under one camera lock.
        let (timestamp, cameras, merged, observations, viewport_updates, average_dt) = {
            let mut cams = lock(&self.cams);

            for camera_id in state.watchdog.check_all() {
                if cams.remove(&camera_id).is_some() {
                    info!(camera_id, "camera evicted, timestamp drifted");
                }
                state.watchdog.remove(camera_id);
            }

            let timestamp = cams
                .values()
                .map(CamFilter::timestamp)
                .max()
                .unwrap_or(previous.timestamp)
                .max(previous.timestamp);

            let centers: BTreeMap<CameraId, Vector2<f64>> = cams
                .iter()
                .filter_map(|(id, cam)| coverage_center(cam).map(|center| (*id, center)))
                .collect();
            let viewport_updates = state.architect.update_cameras(&centers);
            apply_viewports(&mut cams, &viewport_updates, state.architect.margin());

            let mut per_bot: BTreeMap<BotId, Vec<&RobotTracker>> = BTreeMap::new();
            for tracker in cams.values().flat_map(CamFilter::valid_robots) {
                per_bot.entry(tracker.bot_id()).or_default().push(tracker);
            }
            let tolerance = self.config.merge_stale_tolerance();
            let merged: BTreeMap<BotId, FilteredVisionBot> = per_bot
                .into_iter()
                .filter_map(|(id, trackers)| merge_robot_trackers(trackers, timestamp, tolerance).map(|bot| (id, bot)))
                .collect();

            let observations =
                observations_from_cameras(cams.values(), timestamp, self.config.ball_observation_max_age());

            let average_dt = slowest_frame_dt(cams.values());
            let cameras: Vec<CameraId> = cams.keys().copied().collect();
            (timestamp, cameras, merged, observations, viewport_updates, average_dt)
        };

        // Step 4: quality gate.
        if let Some(dt) = average_dt {
            state.robot_quality.update_average_dt(dt);
        }
        state.robot_quality.prune(timestamp);
        let bots: BTreeMap<BotId, FilteredVisionBot> = merged
            .iter()
            .filter(|(id, _)| state.robot_quality.passes(**id))
            .map(|(id, bot)| (*id, bot.clone()))
            .collect();

        // Step 5: ball.
        let robots: Vec<FilteredVisionBot> = merged.values().cloned().collect();
        let FusionState {
            preprocessor,
            ball_filter,
            ..
        } = &mut *state;
        let pre: PreprocessorOutput = preprocessor.update(ball_filter.current(), &observations, &robots, &robot_infos);
        let ball = ball_filter.update(&pre, timestamp);

        // Step 6: assemble, inspect, publish.
        let mut frame = FusedFrame {
            id: state.next_frame_id,
            timestamp,
            ball: ball.ball,
            ball_regime: ball.regime,
            bots,
            kick_event: pre.kick_event.clone(),
            kick_fit_state: ball.kick_fit_state,
            cameras,
            annotations: std::mem::take(&mut state.pending_annotations),
            layers: BTreeMap::new(),
        };
        state.next_frame_id += 1;

        let found = state.inspector.inspect(&frame, Some(&previous));
        frame.annotations.extend(found);
        frame.layers = debug_layers(&state, &frame, &merged, &observations_xy(&observations));
        drop(state);

        let frame = Arc::new(frame);
        *write(&self.latest) = Arc::clone(&frame);

        self.emit(EventPayload::Frame(Arc::clone(&frame)));
        if let Some(kick) = pre.kick_event {
            self.emit(EventPayload::Kick(kick));
        }
        if let Some(result) = pre.model_ident {
            info!(kind = ?result.kind, samples = result.samples, "ball model identified");
            self.emit(EventPayload::ModelIdentification(result));
        }
        for annotation in &frame.annotations {
            self.emit(EventPayload::Quality(annotation.clone()));
        }
        self.emit_viewports(viewport_updates);
        frame
    }

    fn emit(&self, payload: EventPayload) {
        if let Err(e) = self.bus.emit(EVENT_SOURCE, payload) {
            warn!(error = %e, "failed to publish event");
        }
    }

    fn emit_viewports(&self, updates: Vec<ViewportUpdate>) {
        for update in updates {
            debug!(camera_id = update.camera_id, viewport = ?update.viewport, "viewport updated");
            self.emit(EventPayload::Viewport(update));
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn apply_viewports(cams: &mut BTreeMap<CameraId, CamFilter>, updates: &[ViewportUpdate], margin: f64) {
    for update in updates {
        if let Some(cam) = cams.get_mut(&update.camera_id) {
            cam.set_viewport(update.viewport, margin);
        }
    }
}

/// Frame interval of the slowest camera. Sizing the quality window by it
/// keeps robots seen only by a slow camera from being gated out.
fn slowest_frame_dt<'a>(cams: impl Iterator<Item = &'a CamFilter>) -> Option<f64> {
    cams.map(CamFilter::average_frame_dt).filter(|dt| dt.is_finite()).reduce(f64::max)
}

/// Where a camera looks: its calibrated position, else the centre of what it
/// has detected so far. Cameras with neither stay out of the layout and
/// accept detections anywhere.
fn coverage_center(cam: &CamFilter) -> Option<Vector2<f64>> {
    cam.calibration()
        .map(|c| c.camera_position.xy())
        .or_else(|| cam.detection_extent().map(|r| r.center()))
}

fn observations_xy(observations: &[BallObservation]) -> Vec<(CameraId, Vector2<f64>)> {
    observations.iter().map(|o| (o.camera_id, o.pos.xy())).collect()
}

fn debug_layers(
    state: &FusionState,
    frame: &FusedFrame,
    merged: &BTreeMap<BotId, FilteredVisionBot>,
    balls: &[(CameraId, Vector2<f64>)],
) -> BTreeMap<DebugLayer, Vec<DebugShape>> {
    let mut layers = BTreeMap::new();

    layers.insert(
        DebugLayer::Viewports,
        state
            .architect
            .viewports()
            .iter()
            .map(|(id, rect)| DebugShape::Rect {
                rect: *rect,
                label: format!("camera {id}"),
            })
            .collect(),
    );

    layers.insert(
        DebugLayer::RobotQuality,
        merged
            .values()
            .map(|bot| DebugShape::Text {
                pos: bot.pos,
                text: format!("{} {:.2}", bot.bot_id, state.robot_quality.detection_ratio(bot.bot_id)),
            })
            .collect(),
    );

    layers.insert(
        DebugLayer::BallTrackers,
        balls
            .iter()
            .map(|(camera_id, pos)| DebugShape::Circle {
                center: *pos,
                radius: 30.0,
                label: format!("camera {camera_id}"),
            })
            .collect(),
    );

    if let Some(kick) = &frame.kick_event {
        let from = kick.position.xy();
        layers.insert(
            DebugLayer::Kicks,
            vec![DebugShape::Line {
                from,
                to: from + kick.velocity.xy() * 0.2,
                label: format!("{:?} by {}", kick.kind, kick.kicking_bot),
            }],
        );
    }

    if !frame.annotations.is_empty() {
        layers.insert(
            DebugLayer::Quality,
            frame
                .annotations
                .iter()
                .map(|a| DebugShape::Text {
                    pos: Vector2::zeros(),
                    text: a.message.clone(),
                })
                .collect(),
        );
    }

    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsense_types::{CamCalibration, CamFieldSize, secs_to_ns};

    fn inline_filter() -> VisionFilter {
        VisionFilter::new(VisionFilterConfig {
            use_threads: false,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = VisionFilterConfig {
            publish_interval_ms: -1.0,
            ..Default::default()
        };
        assert!(VisionFilter::new(config).is_err());
    }

    #[test]
    fn frames_without_capture_time_are_skipped() {
        let filter = inline_filter();
        filter.process_detection_frame(&CamDetectionFrame::new(0, 1, 0));
        assert!(filter.cameras().is_empty());
        assert_eq!(filter.latest_frame().id, 0);
    }

    #[test]
    fn inline_mode_publishes_per_accepted_frame() {
        let filter = inline_filter();
        for i in 1..=3 {
            filter.process_detection_frame(&CamDetectionFrame::new(0, i, secs_to_ns(i as f64 * 0.016)));
        }
        // Not newer than the last frame: dropped, nothing published.
        filter.process_detection_frame(&CamDetectionFrame::new(0, 4, secs_to_ns(0.016)));
        assert_eq!(filter.latest_frame().id, 3);
        assert_eq!(filter.cameras(), vec![0]);
    }

    #[test]
    fn implausible_geometry_is_rejected_and_annotated() {
        let filter = inline_filter();
        let geometry = CamGeometry {
            field: CamFieldSize {
                field_length: -1.0,
                field_width: 9000.0,
                boundary_width: 300.0,
            },
            ..Default::default()
        };
        assert!(matches!(
            filter.on_new_camera_geometry(&geometry),
            Err(VisionError::InvalidGeometry(_))
        ));
        let frame = filter.publish();
        assert!(frame.annotations.iter().any(|a| a.kind == AnnotationKind::InvalidGeometry));
    }

    #[test]
    fn geometry_lays_out_viewports_for_known_cameras() {
        let filter = inline_filter();
        filter.process_detection_frame(&CamDetectionFrame::new(0, 1, secs_to_ns(1.0)));
        filter.process_detection_frame(&CamDetectionFrame::new(1, 1, secs_to_ns(1.0)));

        let mut geometry = CamGeometry::default();
        for (id, x) in [(0, -3000.0), (1, 3000.0)] {
            geometry.calibrations.insert(
                id,
                CamCalibration {
                    camera_id: id,
                    focal_length: 600.0,
                    principal_point: Vector2::new(640.0, 480.0),
                    camera_position: Vector3::new(x, 0.0, 4000.0),
                },
            );
        }
        filter.on_new_camera_geometry(&geometry).unwrap();

        let frame = filter.publish();
        let viewports = &frame.layers[&DebugLayer::Viewports];
        assert_eq!(viewports.len(), 2);
    }

    #[test]
    fn clear_forgets_cameras_but_keeps_frame_ids_rising() {
        let filter = inline_filter();
        filter.process_detection_frame(&CamDetectionFrame::new(0, 1, secs_to_ns(1.0)));
        let before = filter.latest_frame().id;
        filter.clear();
        assert!(filter.cameras().is_empty());
        assert_eq!(filter.latest_frame().timestamp, 0);
        assert!(filter.publish().id > before);
    }

    #[test]
    fn start_outside_runtime_fails() {
        let filter = VisionFilter::new(VisionFilterConfig::default()).unwrap();
        assert!(matches!(filter.start(), Err(VisionError::Runtime(_))));
    }

    #[test]
    fn quality_window_follows_the_slowest_camera() {
        let config = fieldsense_perception::TrackerConfig::default();
        let mut fast = CamFilter::new(0, config.clone());
        let mut slow = CamFilter::new(1, config);
        for i in 1..=20u64 {
            fast.update(&CamDetectionFrame::new(0, i, secs_to_ns(1.0 + i as f64 / 60.0)));
            slow.update(&CamDetectionFrame::new(1, i, secs_to_ns(1.0 + i as f64 / 30.0)));
        }
        let dt = slowest_frame_dt([&fast, &slow].into_iter()).unwrap();
        approx::assert_abs_diff_eq!(dt, 1.0 / 30.0, epsilon = 1e-6);
        assert!(slowest_frame_dt(std::iter::empty()).is_none());
    }
}
