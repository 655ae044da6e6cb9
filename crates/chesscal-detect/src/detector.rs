use log::debug;
use nalgebra::Point2;

use chesscal_core::{GrayImageView, PatternSize};

use crate::corners::detect_corners;
use crate::grid::assemble_grid;
use crate::params::DetectorParams;
use crate::refine::refine_corners;

/// Finds the calibration pattern in a single grayscale image.
///
/// Implementations return the corner locations ordered row-major to match
/// `PatternSize::object_points`, or `None` when no complete pattern is
/// visible. Detectors run concurrently across images and must be stateless
/// per call.
pub trait FeatureDetector: Send + Sync {
    fn detect(&self, image: &image::GrayImage, pattern: PatternSize) -> Option<Vec<Point2<f64>>>;
}

impl<T: FeatureDetector + ?Sized> FeatureDetector for &T {
    fn detect(&self, image: &image::GrayImage, pattern: PatternSize) -> Option<Vec<Point2<f64>>> {
        (**self).detect(image, pattern)
    }
}

/// ChESS-based chessboard detector with sub-pixel refinement.
#[derive(Clone, Debug, Default)]
pub struct ChessboardDetector {
    pub params: DetectorParams,
}

impl ChessboardDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }
}

impl FeatureDetector for ChessboardDetector {
    fn detect(&self, image: &image::GrayImage, pattern: PatternSize) -> Option<Vec<Point2<f64>>> {
        let corners = detect_corners(image, &self.params);
        debug!("{} ChESS corners after strength filter", corners.len());

        let mut points = assemble_grid(&corners, pattern)?;

        let view = GrayImageView::new(
            image.width() as usize,
            image.height() as usize,
            image.as_raw(),
        );
        refine_corners(&view, &mut points, &self.params.refine);
        Some(points)
    }
}
