use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::camera::ImageSize;
use crate::pattern::PatternSize;

/// One accepted view: detected pixel corners paired with the planar
/// pattern points they correspond to. Corners are in pattern order
/// (row-major, column index running fastest).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceView {
    pub source: String,
    pub image_points: Vec<Point2<f64>>,
    pub object_points: Vec<Point3<f64>>,
}

/// Aggregated correspondences from a batch of images, ready for solving.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceSet {
    pub views: Vec<CorrespondenceView>,
    pub image_size: ImageSize,
    pub pattern: PatternSize,
}

impl CorrespondenceSet {
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Total number of point pairs across all views.
    pub fn point_count(&self) -> usize {
        self.views.iter().map(|v| v.image_points.len()).sum()
    }
}
