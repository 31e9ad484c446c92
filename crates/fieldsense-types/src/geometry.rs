//! Field geometry: axis-aligned rectangles, camera calibration and field
//! dimensions.

use std::collections::BTreeMap;

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::ids::CameraId;

// ────────────────────────────────────────────────────────────────────────────
// Rectangle
// ────────────────────────────────────────────────────────────────────────────

/// Axis-aligned rectangle in field coordinates (millimetres).
///
/// Boundaries are inclusive, so two rectangles that share an edge both
/// contain points lying exactly on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub min: Vector2<f64>,
    pub max: Vector2<f64>,
}

impl Rectangle {
    /// Build a rectangle from two arbitrary opposite corners.
    pub fn from_corners(a: Vector2<f64>, b: Vector2<f64>) -> Self {
        Self {
            min: Vector2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Vector2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Build a rectangle centred at `center` with the given extents.
    pub fn from_center(center: Vector2<f64>, width: f64, height: f64) -> Self {
        let half = Vector2::new(width.abs() * 0.5, height.abs() * 0.5);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Vector2<f64> {
        (self.min + self.max) * 0.5
    }

    /// `true` when `point` lies inside or on the boundary.
    pub fn contains(&self, point: &Vector2<f64>) -> bool {
        self.contains_with_margin(point, 0.0)
    }

    /// Like [`Rectangle::contains`], with the rectangle grown by `margin` on
    /// every side (a negative margin shrinks it).
    pub fn contains_with_margin(&self, point: &Vector2<f64>, margin: f64) -> bool {
        point.x >= self.min.x - margin
            && point.x <= self.max.x + margin
            && point.y >= self.min.y - margin
            && point.y <= self.max.y + margin
    }

    /// Area shared with `other` (zero when they only touch or are apart).
    pub fn intersection_area(&self, other: &Rectangle) -> f64 {
        let w = self.max.x.min(other.max.x) - self.min.x.max(other.min.x);
        let h = self.max.y.min(other.max.y) - self.min.y.max(other.min.y);
        if w <= 0.0 || h <= 0.0 { 0.0 } else { w * h }
    }

    /// Grow the rectangle so it also covers `point`.
    pub fn expand_to(&mut self, point: &Vector2<f64>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Calibration & field
// ────────────────────────────────────────────────────────────────────────────

/// Calibration of a single camera as delivered by the vision source.
///
/// Intrinsic calibration is consumed as given; only the derived camera
/// position is used by the pipeline (viewport layout and ball height
/// projection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CamCalibration {
    pub camera_id: CameraId,
    /// Focal length in pixels.
    #[serde(default)]
    pub focal_length: f64,
    /// Principal point in pixels.
    #[serde(default = "zero_vec2")]
    pub principal_point: Vector2<f64>,
    /// Camera position in field coordinates (mm); `z` is the height above
    /// the field surface.
    pub camera_position: Vector3<f64>,
}

fn zero_vec2() -> Vector2<f64> {
    Vector2::zeros()
}

/// Physical field dimensions (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CamFieldSize {
    pub field_length: f64,
    pub field_width: f64,
    /// Width of the run-off area surrounding the playing surface.
    #[serde(default)]
    pub boundary_width: f64,
}

impl CamFieldSize {
    /// The playing surface, centred at the origin with `x` along the length.
    pub fn field_rect(&self) -> Rectangle {
        Rectangle::from_center(Vector2::zeros(), self.field_length, self.field_width)
    }

    /// The playing surface including the run-off area.
    pub fn field_with_boundary(&self) -> Rectangle {
        Rectangle::from_center(
            Vector2::zeros(),
            self.field_length + 2.0 * self.boundary_width,
            self.field_width + 2.0 * self.boundary_width,
        )
    }
}

impl Default for CamFieldSize {
    fn default() -> Self {
        Self {
            field_length: 12_000.0,
            field_width: 9_000.0,
            boundary_width: 300.0,
        }
    }
}

/// A geometry packet: per-camera calibrations plus the field dimensions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CamGeometry {
    #[serde(default)]
    pub calibrations: BTreeMap<CameraId, CamCalibration>,
    #[serde(default)]
    pub field: CamFieldSize,
}
