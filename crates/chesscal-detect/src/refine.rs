use nalgebra::{Matrix2, Point2, Vector2};

use chesscal_core::{sample_bilinear, GrayImageView};

use crate::params::RefineParams;

/// Polish corner locations to sub-pixel accuracy.
///
/// Each corner solves the saddle-point condition that the image gradient
/// at every pixel of the window is orthogonal to the vector from the
/// corner to that pixel. The normal equations are accumulated with
/// Gaussian weights and iterated until the update drops below
/// `params.epsilon` or `params.max_iterations` is reached. A corner that
/// drifts out of its window is reset to its initial position.
pub fn refine_corners(
    view: &GrayImageView<'_>,
    points: &mut [Point2<f64>],
    params: &RefineParams,
) {
    for p in points.iter_mut() {
        *p = refine_one(view, *p, params);
    }
}

fn refine_one(view: &GrayImageView<'_>, initial: Point2<f64>, params: &RefineParams) -> Point2<f64> {
    let hw = params.half_window as i32;
    let sigma = (f64::from(params.half_window) * 0.5).max(1.0);
    let inv_two_sigma2 = 1.0 / (2.0 * sigma * sigma);

    let mut p = initial;
    for _ in 0..params.max_iterations {
        let mut a = Matrix2::<f64>::zeros();
        let mut b = Vector2::<f64>::zeros();

        for j in -hw..=hw {
            for i in -hw..=hw {
                let sx = p.x + f64::from(i);
                let sy = p.y + f64::from(j);
                let gx = 0.5
                    * (sample_bilinear(view, sx + 1.0, sy) - sample_bilinear(view, sx - 1.0, sy));
                let gy = 0.5
                    * (sample_bilinear(view, sx, sy + 1.0) - sample_bilinear(view, sx, sy - 1.0));
                let w = (-(f64::from(i * i + j * j)) * inv_two_sigma2).exp();

                let gxx = w * gx * gx;
                let gxy = w * gx * gy;
                let gyy = w * gy * gy;
                a += Matrix2::new(gxx, gxy, gxy, gyy);
                b += Vector2::new(gxx * sx + gxy * sy, gxy * sx + gyy * sy);
            }
        }

        let Some(inv) = a.try_inverse() else {
            // Flat window, nothing to refine against.
            break;
        };
        let q = Point2::from(inv * b);
        let step = (q - p).norm();
        p = q;

        if (p - initial).norm() > f64::from(hw) {
            return initial;
        }
        if step < params.epsilon {
            break;
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Render an antialiased checker corner at `(cx, cy)`: each pixel is
    /// supersampled 4x4 and averaged over the two-tone quadrant pattern.
    /// Pixel `(x, y)` is centered at continuous coordinate `(x, y)` to
    /// match the bilinear sampling convention.
    fn render_corner(width: usize, height: usize, cx: f64, cy: f64) -> Vec<u8> {
        let mut data = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                let mut acc = 0.0f64;
                for sy in 0..4 {
                    for sx in 0..4 {
                        let px = x as f64 - 0.5 + (sx as f64 + 0.5) / 4.0;
                        let py = y as f64 - 0.5 + (sy as f64 + 0.5) / 4.0;
                        let bright = (px > cx) == (py > cy);
                        acc += if bright { 220.0 } else { 30.0 };
                    }
                }
                data[y * width + x] = (acc / 16.0).round() as u8;
            }
        }
        data
    }

    #[test]
    fn checker_corner_is_localized_below_a_quarter_pixel() {
        let (cx, cy) = (20.37, 18.62);
        let data = render_corner(40, 40, cx, cy);
        let view = GrayImageView::new(40, 40, &data);

        let mut points = [Point2::new(20.0, 19.0)];
        refine_corners(&view, &mut points, &RefineParams::default());

        let err = (points[0] - Point2::new(cx, cy)).norm();
        assert!(err < 0.25, "refined corner off by {err} px");
    }

    #[test]
    fn flat_image_leaves_the_corner_in_place() {
        let data = vec![128u8; 32 * 32];
        let view = GrayImageView::new(32, 32, &data);

        let mut points = [Point2::new(16.0, 16.0)];
        refine_corners(&view, &mut points, &RefineParams::default());
        assert_eq!(points[0], Point2::new(16.0, 16.0));
    }
}
