use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use chesscal_core::{
    CameraMatrix, CorrespondenceView, Distortion, ImageSize, PatternSize, Pose,
};

#[derive(thiserror::Error, Debug)]
pub enum PersistenceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Complete result of a calibration run.
///
/// `calibration_error` is the residual reported by the solver;
/// `reprojection_error` is recomputed from the final model by the
/// evaluator. For the shipped solver the two agree, a mismatch points at
/// an inconsistency between solver and camera model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub calibration_error: f64,
    pub reprojection_error: f64,
    pub camera_matrix: CameraMatrix,
    pub distortion: Distortion,
    pub poses: Vec<Pose>,
    pub image_size: ImageSize,
    pub pattern: PatternSize,
    pub accepted_images: Vec<String>,
    pub correspondences: Vec<CorrespondenceView>,
}

impl CalibrationRecord {
    /// The human-readable calibration report.
    pub fn report_text(&self) -> String {
        let mut out = String::new();
        out.push_str("\n~~~ Camera calibration ~~~\n\n");
        let _ = writeln!(out, "Calibration error : {}", self.calibration_error);
        let _ = writeln!(out, "Reprojection error : {}", self.reprojection_error);
        let _ = writeln!(out, "Camera matrix :\n{}", self.camera_matrix.0);
        let _ = writeln!(
            out,
            "Distortion coefficients :\n{:?}",
            self.distortion.coefficients()
        );
        out
    }

    /// Load a record from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this record to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Persist the text report and the JSON record together.
    ///
    /// Serialization happens before anything touches the disk, and a
    /// report whose record failed to write is removed again: after this
    /// returns, either both files exist or neither does.
    pub fn save(
        &self,
        report_path: impl AsRef<Path>,
        record_path: impl AsRef<Path>,
    ) -> Result<(), PersistenceError> {
        let report_path = report_path.as_ref();
        let json = serde_json::to_string_pretty(self)?;

        fs::write(report_path, self.report_text())?;
        if let Err(err) = fs::write(record_path, json) {
            let _ = fs::remove_file(report_path);
            return Err(err.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Vector3};

    fn sample_record() -> CalibrationRecord {
        CalibrationRecord {
            calibration_error: 0.42,
            reprojection_error: 0.42,
            camera_matrix: CameraMatrix::from_params(800.0, 810.0, 320.0, 240.0),
            distortion: Distortion {
                k1: -0.2,
                // Awkward decimal expansions; reloading must reproduce
                // these bit-for-bit.
                p2: 5.570784292914561e-17,
                k6: 9.26748381058434e-7,
                rational: true,
                ..Distortion::none()
            },
            poses: vec![Pose::new(
                Matrix3::identity(),
                Vector3::new(0.0, 0.0, 5.0),
            )],
            image_size: ImageSize {
                width: 640,
                height: 480,
            },
            pattern: PatternSize::new(6, 9),
            accepted_images: vec!["camera-01.png".into()],
            correspondences: Vec::new(),
        }
    }

    #[test]
    fn json_round_trip_preserves_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");

        let record = sample_record();
        record.write_json(&path).unwrap();
        let loaded = CalibrationRecord::load_json(&path).unwrap();
        assert_eq!(record, loaded);
    }

    #[test]
    fn report_carries_the_fixed_labels() {
        let text = sample_record().report_text();
        assert!(text.starts_with("\n~~~ Camera calibration ~~~\n\n"));
        assert!(text.contains("Calibration error : 0.42"));
        assert!(text.contains("Reprojection error : 0.42"));
        assert!(text.contains("Camera matrix :\n"));
        assert!(text.contains("Distortion coefficients :\n"));
    }

    #[test]
    fn failed_record_write_removes_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("calibration.log");
        let record_path = dir.path().join("missing").join("calibration.json");

        let err = sample_record().save(&report, &record_path);
        assert!(err.is_err());
        assert!(!report.exists());
    }

    #[test]
    fn save_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("calibration.log");
        let record_path = dir.path().join("calibration.json");

        sample_record().save(&report, &record_path).unwrap();
        assert!(report.exists());
        assert!(record_path.exists());
    }
}
