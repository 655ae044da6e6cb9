//! Core types and utilities for chessboard camera calibration.
//!
//! This crate is intentionally small: the calibration pattern geometry, the
//! camera model (matrix, distortion, pose), correspondence containers and a
//! lightweight grayscale image view. It does *not* depend on any concrete
//! corner detector or solver backend.

mod camera;
mod correspond;
mod image;
mod logger;
mod pattern;

pub use camera::{
    project_point, CameraMatrix, Distortion, ImageSize, Pose, ProjectError,
};
pub use correspond::{CorrespondenceSet, CorrespondenceView};
pub use image::{sample_bilinear, GrayImageView};
pub use logger::init_with_level;
pub use pattern::PatternSize;
