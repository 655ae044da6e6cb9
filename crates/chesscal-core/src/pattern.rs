use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Inner-corner grid dimensions of the physical calibration target.
///
/// The pattern is configured once per calibration run and passed explicitly
/// to the detector and collector; it is never shared mutable state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PatternSize {
    /// Number of inner corners in the vertical direction.
    pub rows: u32,
    /// Number of inner corners in the horizontal direction.
    pub cols: u32,
}

impl PatternSize {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Total number of feature points on the target.
    pub fn point_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    pub fn transposed(&self) -> Self {
        Self {
            rows: self.cols,
            cols: self.rows,
        }
    }

    /// 3D model points of the target on the unit z = 0 plane.
    ///
    /// Row-major with the column index varying fastest, matching the
    /// canonical ordering of detected 2D corners. The physical board is
    /// invariant, so the same set pairs with every accepted image.
    pub fn object_points(&self) -> Vec<Point3<f64>> {
        let mut points = Vec::with_capacity(self.point_count());
        for row in 0..self.rows {
            for col in 0..self.cols {
                points.push(Point3::new(col as f64, row as f64, 0.0));
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_points_are_row_major_on_the_unit_plane() {
        let pattern = PatternSize::new(3, 4);
        let points = pattern.object_points();

        assert_eq!(points.len(), 12);
        assert_eq!(points[0], Point3::new(0.0, 0.0, 0.0));
        // Column index varies fastest.
        assert_eq!(points[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(points[4], Point3::new(0.0, 1.0, 0.0));
        assert_eq!(points[11], Point3::new(3.0, 2.0, 0.0));
        assert!(points.iter().all(|p| p.z == 0.0));
    }

    #[test]
    fn transposed_swaps_dimensions() {
        let pattern = PatternSize::new(9, 6);
        assert_eq!(pattern.transposed(), PatternSize::new(6, 9));
        assert_eq!(pattern.point_count(), pattern.transposed().point_count());
    }
}
