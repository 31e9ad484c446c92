//! Sanity checks for incoming camera geometry.

use fieldsense_types::{CamGeometry, VisionError};
use tracing::warn;

use crate::frame_inspector::FrameInspectorConfig;

/// Rejects geometry packets with implausible field dimensions or camera
/// placements.
#[derive(Debug, Clone, Default)]
pub struct GeometryInspector {
    config: FrameInspectorConfig,
}

impl GeometryInspector {
    pub fn new(config: FrameInspectorConfig) -> Self {
        Self { config }
    }

    /// # Errors
    ///
    /// [`VisionError::InvalidGeometry`] describing the first failed check.
    pub fn inspect(&self, geometry: &CamGeometry) -> Result<(), VisionError> {
        let result = self.check(geometry);
        if let Err(error) = &result {
            warn!(%error, "camera geometry rejected");
        }
        result
    }

    fn check(&self, geometry: &CamGeometry) -> Result<(), VisionError> {
        let field = &geometry.field;
        let in_range = |v: f64, (lo, hi): (f64, f64)| v.is_finite() && v >= lo && v <= hi;
        if !in_range(field.field_length, self.config.field_length_range) {
            return Err(VisionError::InvalidGeometry(format!(
                "field length {} mm outside {:?}",
                field.field_length, self.config.field_length_range
            )));
        }
        if !in_range(field.field_width, self.config.field_width_range) {
            return Err(VisionError::InvalidGeometry(format!(
                "field width {} mm outside {:?}",
                field.field_width, self.config.field_width_range
            )));
        }
        if !(field.boundary_width.is_finite() && field.boundary_width >= 0.0) {
            return Err(VisionError::InvalidGeometry(format!(
                "boundary width {} mm must be non-negative",
                field.boundary_width
            )));
        }
        for (id, calibration) in &geometry.calibrations {
            if calibration.camera_id != *id {
                return Err(VisionError::InvalidGeometry(format!(
                    "calibration for camera {} is filed under camera {id}",
                    calibration.camera_id
                )));
            }
            let pos = calibration.camera_position;
            if !pos.iter().all(|c| c.is_finite()) || pos.z <= 0.0 {
                return Err(VisionError::InvalidGeometry(format!(
                    "camera {id} must be above the field, got height {}",
                    pos.z
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsense_types::{CamCalibration, CamFieldSize};
    use nalgebra::{Vector2, Vector3};

    fn calibration(id: u32, z: f64) -> CamCalibration {
        CamCalibration {
            camera_id: id,
            focal_length: 600.0,
            principal_point: Vector2::new(640.0, 480.0),
            camera_position: Vector3::new(0.0, 0.0, z),
        }
    }

    #[test]
    fn default_geometry_passes() {
        let mut geometry = CamGeometry::default();
        geometry.calibrations.insert(0, calibration(0, 4000.0));
        assert!(GeometryInspector::default().inspect(&geometry).is_ok());
    }

    #[test]
    fn tiny_field_is_rejected() {
        let geometry = CamGeometry {
            field: CamFieldSize {
                field_length: 12.0,
                field_width: 9.0,
                boundary_width: 0.3,
            },
            ..Default::default()
        };
        assert!(matches!(
            GeometryInspector::default().inspect(&geometry),
            Err(VisionError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn camera_below_field_is_rejected() {
        let mut geometry = CamGeometry::default();
        geometry.calibrations.insert(1, calibration(1, -10.0));
        assert!(GeometryInspector::default().inspect(&geometry).is_err());
    }

    #[test]
    fn mismatched_camera_id_is_rejected() {
        let mut geometry = CamGeometry::default();
        geometry.calibrations.insert(2, calibration(5, 4000.0));
        assert!(GeometryInspector::default().inspect(&geometry).is_err());
    }
}
