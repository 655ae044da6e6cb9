use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use chesscal_core::PatternSize;
use chesscal_detect::FeatureDetector;
use chesscal_solve::{CalibrationSolver, SolveError, SolveOptions};

use crate::collect::{BatchCollector, CollectError, ExecutionStrategy};
use crate::evaluate::{reprojection_error, EvaluateError};
use crate::record::{CalibrationRecord, PersistenceError};

pub const DEFAULT_FILE_PREFIX: &str = "camera-";
pub const DEFAULT_REPORT_NAME: &str = "calibration.log";
pub const DEFAULT_RECORD_NAME: &str = "calibration.json";

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("no calibration images matching {prefix}*.png in {}", dir.display())]
    NoImages { dir: PathBuf, prefix: String },

    #[error("failed to list images in {}", dir.display())]
    ListImages {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error(transparent)]
    Evaluate(#[from] EvaluateError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Settings for one end-to-end calibration run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Directory scanned for `<file_prefix>*.png` images.
    pub image_dir: PathBuf,
    pub file_prefix: String,
    pub pattern: PatternSize,
    pub options: SolveOptions,
    pub strategy: ExecutionStrategy,
    pub report_path: PathBuf,
    pub record_path: PathBuf,
}

impl RunConfig {
    pub fn new(image_dir: impl Into<PathBuf>, pattern: PatternSize) -> Self {
        let image_dir = image_dir.into();
        Self {
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            pattern,
            options: SolveOptions::default(),
            strategy: ExecutionStrategy::default(),
            report_path: image_dir.join(DEFAULT_REPORT_NAME),
            record_path: image_dir.join(DEFAULT_RECORD_NAME),
            image_dir,
        }
    }
}

/// List the calibration images of a directory, sorted by file name.
pub fn list_images(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, CalibrationError> {
    let entries = fs::read_dir(dir).map_err(|source| CalibrationError::ListImages {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".png"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Run the full pipeline: list images, collect correspondences, solve,
/// evaluate and persist the result.
///
/// Per-image failures are logged and survive as rejections; the run only
/// fails when no image yields the pattern, the solve degenerates or the
/// result cannot be persisted.
pub fn run_calibration<D, S>(
    config: &RunConfig,
    detector: &D,
    solver: &S,
) -> Result<CalibrationRecord, CalibrationError>
where
    D: FeatureDetector,
    S: CalibrationSolver,
{
    let paths = list_images(&config.image_dir, &config.file_prefix)?;
    if paths.is_empty() {
        return Err(CalibrationError::NoImages {
            dir: config.image_dir.clone(),
            prefix: config.file_prefix.clone(),
        });
    }
    info!("calibrating from {} images", paths.len());

    let collector =
        BatchCollector::new(detector, config.pattern).with_strategy(config.strategy);
    let (set, rejections) = collector.collect(&paths)?;
    for rejection in &rejections {
        warn!("rejected {}: {}", rejection.source, rejection.reason);
    }
    info!("{} of {} images accepted", set.len(), paths.len());

    let output = solver.solve(&set)?;
    let reproj = reprojection_error(
        &output.camera_matrix,
        &output.distortion,
        &output.poses,
        &set,
    )?;

    let record = CalibrationRecord {
        calibration_error: output.residual,
        reprojection_error: reproj,
        camera_matrix: output.camera_matrix,
        distortion: output.distortion,
        poses: output.poses,
        image_size: set.image_size,
        pattern: set.pattern,
        accepted_images: set.views.iter().map(|v| v.source.clone()).collect(),
        correspondences: set.views,
    };
    record.save(&config.report_path, &config.record_path)?;
    info!(
        "calibration error {:.4} px, wrote {} and {}",
        record.calibration_error,
        config.report_path.display(),
        config.record_path.display()
    );
    Ok(record)
}
