use serde::{Deserialize, Serialize};

use chesscal_core::{CameraMatrix, CorrespondenceSet, Distortion, Pose};

/// Errors produced by calibration solvers.
#[derive(thiserror::Error, Debug)]
pub enum SolveError {
    #[error("planar calibration needs at least 3 views, got {got}")]
    InsufficientViews { got: usize },

    #[error("view {view} has {got} correspondences, need at least 4")]
    ViewTooSmall { view: usize, got: usize },

    #[error("view {view} has mismatched image/object point counts")]
    MismatchedView { view: usize },

    #[error("view {view} has non-planar object points (z != 0)")]
    NonPlanar { view: usize },

    #[error("invalid solver option: {reason}")]
    InvalidOption { reason: &'static str },

    #[error("calibration system is degenerate: {reason}")]
    Degenerate { reason: &'static str },
}

/// Estimated camera model together with the per-view poses and the RMS
/// reprojection error of the final model over every point pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolveOutput {
    pub camera_matrix: CameraMatrix,
    pub distortion: Distortion,
    pub poses: Vec<Pose>,
    pub residual: f64,
}

/// Estimates a camera model from batched 2D/3D correspondences.
///
/// `poses` in the output line up index-for-index with `set.views`.
pub trait CalibrationSolver {
    fn solve(&self, set: &CorrespondenceSet) -> Result<SolveOutput, SolveError>;
}
