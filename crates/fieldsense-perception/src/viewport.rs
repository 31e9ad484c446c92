//! Viewport architect: splits the field into one rectangle per camera.
//!
//! Cameras are grouped into columns along the field length by their ground
//! position; column borders sit halfway between neighbouring columns and
//! every column is split the same way along the width. The resulting
//! rectangles are disjoint (they only share edges) and together cover the
//! field including its run-off area.

use std::collections::BTreeMap;

use fieldsense_types::{CamGeometry, CamFieldSize, CameraId, Rectangle};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Cameras whose x positions differ by less than this share a column
    /// (mm).
    pub column_tolerance: f64,
    /// Extra margin around a viewport within which a camera still accepts
    /// detections (mm).
    pub margin: f64,
    /// An uncalibrated camera whose observed centre drifts further than this
    /// from the one used for the current layout triggers a new layout (mm).
    pub relayout_distance: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            column_tolerance: 1000.0,
            margin: 100.0,
            relayout_distance: 250.0,
        }
    }
}

/// A viewport changed; `viewport` is `None` when the camera was removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportUpdate {
    pub camera_id: CameraId,
    pub viewport: Option<Rectangle>,
}

#[derive(Debug, Clone, Default)]
pub struct ViewportArchitect {
    config: ViewportConfig,
    field: CamFieldSize,
    /// Positions from calibration, authoritative when present.
    calibrated: BTreeMap<CameraId, Vector2<f64>>,
    /// Positions currently used for the layout.
    positions: BTreeMap<CameraId, Vector2<f64>>,
    viewports: BTreeMap<CameraId, Rectangle>,
}

impl ViewportArchitect {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Report the active cameras with their observed coverage centres.
    ///
    /// The layout is recomputed when the set of cameras changes or when a
    /// layout position moves by more than `relayout_distance`. Calibrated
    /// positions take precedence over observed centres.
    pub fn update_cameras(&mut self, observed: &BTreeMap<CameraId, Vector2<f64>>) -> Vec<ViewportUpdate> {
        let positions: BTreeMap<CameraId, Vector2<f64>> = observed
            .iter()
            .map(|(id, center)| (*id, self.calibrated.get(id).copied().unwrap_or(*center)))
            .collect();
        let same_cameras = positions.keys().eq(self.positions.keys());
        let drifted = positions
            .iter()
            .zip(self.positions.values())
            .any(|((_, new), old)| (new - old).norm() > self.config.relayout_distance);
        if same_cameras && !drifted {
            return Vec::new();
        }
        self.relayout(positions)
    }

    /// Apply a geometry packet: new field size and camera positions.
    pub fn new_camera_geometry(&mut self, geometry: &CamGeometry) -> Vec<ViewportUpdate> {
        self.field = geometry.field;
        for (id, calibration) in &geometry.calibrations {
            self.calibrated.insert(*id, calibration.camera_position.xy());
        }
        let positions = self
            .positions
            .keys()
            .map(|id| {
                let pos = self.calibrated.get(id).or_else(|| self.positions.get(id)).copied();
                (*id, pos.unwrap_or_else(Vector2::zeros))
            })
            .collect();
        self.relayout(positions)
    }

    pub fn viewport(&self, camera_id: CameraId) -> Option<Rectangle> {
        self.viewports.get(&camera_id).copied()
    }

    pub fn viewports(&self) -> &BTreeMap<CameraId, Rectangle> {
        &self.viewports
    }

    pub fn margin(&self) -> f64 {
        self.config.margin
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.viewports.clear();
    }

    fn relayout(&mut self, positions: BTreeMap<CameraId, Vector2<f64>>) -> Vec<ViewportUpdate> {
        let layout = partition(&self.field.field_with_boundary(), &positions, self.config.column_tolerance);
        let mut updates = Vec::new();
        for id in self.viewports.keys() {
            if !layout.contains_key(id) {
                updates.push(ViewportUpdate {
                    camera_id: *id,
                    viewport: None,
                });
            }
        }
        for (id, rect) in &layout {
            if self.viewports.get(id) != Some(rect) {
                updates.push(ViewportUpdate {
                    camera_id: *id,
                    viewport: Some(*rect),
                });
            }
        }
        if !updates.is_empty() {
            info!(cameras = layout.len(), "viewports recomputed");
        }
        self.positions = positions;
        self.viewports = layout;
        updates
    }
}

/// Midpoints between consecutive values, framed by `lo` and `hi`.
fn borders(centers: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(centers.len() + 1);
    out.push(lo);
    for pair in centers.windows(2) {
        out.push((0.5 * (pair[0] + pair[1])).clamp(lo, hi));
    }
    out.push(hi);
    out
}

fn partition(
    area: &Rectangle,
    positions: &BTreeMap<CameraId, Vector2<f64>>,
    column_tolerance: f64,
) -> BTreeMap<CameraId, Rectangle> {
    let mut cams: Vec<(CameraId, Vector2<f64>)> = positions.iter().map(|(id, p)| (*id, *p)).collect();
    cams.sort_by(|a, b| a.1.x.total_cmp(&b.1.x).then(a.0.cmp(&b.0)));

    let mut columns: Vec<Vec<(CameraId, Vector2<f64>)>> = Vec::new();
    for cam in cams {
        match columns.last_mut() {
            Some(column) if cam.1.x - column[0].1.x < column_tolerance => column.push(cam),
            _ => columns.push(vec![cam]),
        }
    }

    let column_x: Vec<f64> = columns
        .iter()
        .map(|c| c.iter().map(|(_, p)| p.x).sum::<f64>() / c.len() as f64)
        .collect();
    let x_borders = borders(&column_x, area.min.x, area.max.x);

    let mut layout = BTreeMap::new();
    for (i, column) in columns.iter_mut().enumerate() {
        column.sort_by(|a, b| a.1.y.total_cmp(&b.1.y).then(a.0.cmp(&b.0)));
        let ys: Vec<f64> = column.iter().map(|(_, p)| p.y).collect();
        let y_borders = borders(&ys, area.min.y, area.max.y);
        for (j, (id, _)) in column.iter().enumerate() {
            layout.insert(
                *id,
                Rectangle {
                    min: Vector2::new(x_borders[i], y_borders[j]),
                    max: Vector2::new(x_borders[i + 1], y_borders[j + 1]),
                },
            );
        }
    }
    layout
}
