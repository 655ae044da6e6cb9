use nalgebra::Point2;

use chesscal_core::{CameraMatrix, Distortion};

const UNDISTORT_ITERS: u32 = 50;

/// Map distorted pixel coordinates to their ideal pinhole positions under
/// the same camera matrix.
///
/// Each point is normalized through the intrinsics, the distortion model
/// is inverted iteratively, and the result is projected back to pixels.
pub fn undistort_points(
    points: &[Point2<f64>],
    camera: &CameraMatrix,
    distortion: &Distortion,
) -> Vec<Point2<f64>> {
    let fx = camera.fx();
    let fy = camera.fy();
    let cx = camera.cx();
    let cy = camera.cy();
    let skew = camera.skew();

    points
        .iter()
        .map(|p| {
            let yn = (p.y - cy) / fy;
            let xn = (p.x - cx - skew * yn) / fx;
            let (xu, yu) = distortion.undistort(xn, yn, UNDISTORT_ITERS);
            Point2::new(fx * xu + skew * yu + cx, fy * yu + cy)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_distortion_is_the_identity() {
        let camera = CameraMatrix::from_params(700.0, 700.0, 320.0, 240.0);
        let points = vec![Point2::new(100.0, 50.0), Point2::new(320.0, 240.0)];

        let out = undistort_points(&points, &camera, &Distortion::none());
        for (a, b) in points.iter().zip(out.iter()) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn inverts_a_distorted_projection() {
        let camera = CameraMatrix::from_params(700.0, 720.0, 320.0, 240.0);
        let distortion = Distortion {
            k1: -0.25,
            k2: 0.06,
            p1: 5e-4,
            ..Distortion::none()
        };

        // Ideal pinhole pixel, then its distorted observation.
        let (xn, yn) = (0.21, -0.17);
        let ideal = Point2::new(700.0 * xn + 320.0, 720.0 * yn + 240.0);
        let (xd, yd) = distortion.distort(xn, yn);
        let observed = Point2::new(700.0 * xd + 320.0, 720.0 * yd + 240.0);

        let out = undistort_points(&[observed], &camera, &distortion);
        assert_relative_eq!(out[0].x, ideal.x, epsilon = 1e-6);
        assert_relative_eq!(out[0].y, ideal.y, epsilon = 1e-6);
    }
}
