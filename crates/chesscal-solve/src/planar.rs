use log::{debug, info};
use nalgebra::{DMatrix, DVector, Matrix3, Point2};

use chesscal_core::{
    project_point, CameraMatrix, CorrespondenceSet, CorrespondenceView, Distortion, Pose,
};

use crate::options::SolveOptions;
use crate::solver::{CalibrationSolver, SolveError, SolveOutput};

const MIN_VIEWS: usize = 3;
const MIN_POINTS_PER_VIEW: usize = 4;

/// Closed-form planar calibration (Zhang) with Gauss-Newton distortion
/// refinement.
///
/// Intrinsics come from the homography constraint system, per-view poses
/// from the homography columns, and the distortion coefficients selected
/// by [`SolveOptions`] are then fitted to the reprojection residuals with
/// the geometry held fixed.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlanarSolver {
    pub options: SolveOptions,
}

impl PlanarSolver {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }
}

impl CalibrationSolver for PlanarSolver {
    fn solve(&self, set: &CorrespondenceSet) -> Result<SolveOutput, SolveError> {
        if set.len() < MIN_VIEWS {
            return Err(SolveError::InsufficientViews { got: set.len() });
        }

        let mut homographies = Vec::with_capacity(set.len());
        for (i, view) in set.views.iter().enumerate() {
            if view.image_points.len() != view.object_points.len() {
                return Err(SolveError::MismatchedView { view: i });
            }
            if view.image_points.len() < MIN_POINTS_PER_VIEW {
                return Err(SolveError::ViewTooSmall {
                    view: i,
                    got: view.image_points.len(),
                });
            }
            if view.object_points.iter().any(|p| p.z.abs() > 1e-9) {
                return Err(SolveError::NonPlanar { view: i });
            }
            let obj2d: Vec<Point2<f64>> = view
                .object_points
                .iter()
                .map(|p| Point2::new(p.x, p.y))
                .collect();
            homographies.push(estimate_homography_dlt(&obj2d, &view.image_points)?);
        }

        info!(
            "planar solve: {} views, {} point pairs",
            set.len(),
            set.point_count()
        );

        let k = intrinsics_from_planar_homographies(&homographies)?;
        let mut fx = k[(0, 0)];
        let mut fy = k[(1, 1)];
        let mut cx = k[(0, 2)];
        let mut cy = k[(1, 2)];

        if let Some(ratio) = self.options.fix_aspect_ratio {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(SolveError::InvalidOption {
                    reason: "fix_aspect_ratio must be finite and > 0",
                });
            }
            // Closest constrained fit to the unconstrained pair under
            // fx = ratio * fy.
            fy = (ratio * fx + fy) / (ratio * ratio + 1.0);
            fx = ratio * fy;
        }
        if let Some((pcx, pcy)) = self.options.fix_principal_point {
            if !pcx.is_finite() || !pcy.is_finite() {
                return Err(SolveError::InvalidOption {
                    reason: "fix_principal_point must be finite",
                });
            }
            cx = pcx;
            cy = pcy;
        }

        let camera = CameraMatrix::from_params(fx, fy, cx, cy);
        let k_inv = camera.0.try_inverse().ok_or(SolveError::Degenerate {
            reason: "intrinsic matrix is not invertible",
        })?;

        let mut poses = Vec::with_capacity(homographies.len());
        for h in &homographies {
            poses.push(extrinsics_from_homography(&k_inv, h)?);
        }

        let distortion = refine_distortion(&camera, &poses, &set.views, &self.options);
        let residual = rms_reprojection(&camera, &distortion, &poses, &set.views)?;
        debug!("planar solve residual: {residual:.6} px");

        let output = SolveOutput {
            camera_matrix: camera,
            distortion,
            poses,
            residual,
        };
        if !is_valid_output(&output) {
            return Err(SolveError::Degenerate {
                reason: "solve produced a non-finite calibration",
            });
        }
        Ok(output)
    }
}

/// Direct linear transform homography with Hartley normalization.
fn estimate_homography_dlt(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
) -> Result<Matrix3<f64>, SolveError> {
    let (src_n, ts) = normalize_points_hartley(src);
    let (dst_n, td) = normalize_points_hartley(dst);

    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for i in 0..n {
        let x = src_n[i].x;
        let y = src_n[i].y;
        let u = dst_n[i].x;
        let v = dst_n[i].y;
        let r0 = 2 * i;
        let r1 = r0 + 1;
        a[(r0, 0)] = -x;
        a[(r0, 1)] = -y;
        a[(r0, 2)] = -1.0;
        a[(r0, 6)] = u * x;
        a[(r0, 7)] = u * y;
        a[(r0, 8)] = u;

        a[(r1, 3)] = -x;
        a[(r1, 4)] = -y;
        a[(r1, 5)] = -1.0;
        a[(r1, 6)] = v * x;
        a[(r1, 7)] = v * y;
        a[(r1, 8)] = v;
    }

    let svd = a.svd(true, true);
    let vt = svd.v_t.ok_or(SolveError::Degenerate {
        reason: "SVD failed in homography estimation",
    })?;
    let h = vt.row(vt.nrows() - 1);
    let hn = Matrix3::new(
        h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8],
    );

    let mut hdenorm = td.try_inverse().unwrap_or_else(Matrix3::identity) * hn * ts;
    if hdenorm[(2, 2)].abs() > 1e-12 {
        hdenorm /= hdenorm[(2, 2)];
    }
    Ok(hdenorm)
}

/// Hartley normalization: translate to the centroid and scale the mean
/// distance to sqrt(2). Returns the normalized points and the transform.
fn normalize_points_hartley(points: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

    let mean_dist = points
        .iter()
        .map(|p| ((p.x - mean_x).powi(2) + (p.y - mean_y).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let scale = if mean_dist.abs() > 1e-18 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let normalized = points
        .iter()
        .map(|p| Point2::new((p.x - mean_x) * scale, (p.y - mean_y) * scale))
        .collect();

    let t = Matrix3::new(
        scale,
        0.0,
        -mean_x * scale,
        0.0,
        scale,
        -mean_y * scale,
        0.0,
        0.0,
        1.0,
    );
    (normalized, t)
}

/// One row of the absolute-conic constraint system for homography `h`.
fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> [f64; 6] {
    [
        h[(0, i)] * h[(0, j)],
        h[(0, i)] * h[(1, j)] + h[(1, i)] * h[(0, j)],
        h[(1, i)] * h[(1, j)],
        h[(2, i)] * h[(0, j)] + h[(0, i)] * h[(2, j)],
        h[(2, i)] * h[(1, j)] + h[(1, i)] * h[(2, j)],
        h[(2, i)] * h[(2, j)],
    ]
}

fn intrinsics_from_planar_homographies(
    homographies: &[Matrix3<f64>],
) -> Result<Matrix3<f64>, SolveError> {
    let mut v = DMatrix::<f64>::zeros(2 * homographies.len(), 6);
    for (i, h) in homographies.iter().enumerate() {
        let v12 = v_ij(h, 0, 1);
        let v11 = v_ij(h, 0, 0);
        let v22 = v_ij(h, 1, 1);
        for j in 0..6 {
            v[(2 * i, j)] = v12[j];
            v[(2 * i + 1, j)] = v11[j] - v22[j];
        }
    }

    let svd = v.svd(true, true);
    let vt = svd.v_t.ok_or(SolveError::Degenerate {
        reason: "SVD failed in the intrinsic constraint system",
    })?;
    let b = vt.row(vt.nrows() - 1);
    let mut b11 = b[0];
    let mut b12 = b[1];
    let mut b22 = b[2];
    let mut b13 = b[3];
    let mut b23 = b[4];
    let mut b33 = b[5];

    let mut denom = b11 * b22 - b12 * b12;
    if denom.abs() < 1e-18 || b11.abs() < 1e-18 {
        return Err(SolveError::Degenerate {
            reason: "singular intrinsic constraint system",
        });
    }

    let mut v0 = (b12 * b13 - b11 * b23) / denom;
    let mut lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;

    // Nullspace sign is arbitrary; flip once if needed.
    if lambda <= 0.0 {
        b11 = -b11;
        b12 = -b12;
        b22 = -b22;
        b13 = -b13;
        b23 = -b23;
        b33 = -b33;
        denom = b11 * b22 - b12 * b12;
        if denom.abs() < 1e-18 || b11.abs() < 1e-18 {
            return Err(SolveError::Degenerate {
                reason: "singular intrinsic constraint system",
            });
        }
        v0 = (b12 * b13 - b11 * b23) / denom;
        lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    }
    if lambda <= 0.0 {
        return Err(SolveError::Degenerate {
            reason: "negative lambda in planar calibration",
        });
    }

    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    Ok(Matrix3::new(alpha, gamma, u0, 0.0, beta, v0, 0.0, 0.0, 1.0))
}

/// Recover the view pose from its homography: the first two rotation
/// columns come from the homography, the third completes the frame, and
/// the nearest proper rotation is taken by SVD.
fn extrinsics_from_homography(
    k_inv: &Matrix3<f64>,
    h: &Matrix3<f64>,
) -> Result<Pose, SolveError> {
    let r1_raw = k_inv * h.column(0).into_owned();
    let r2_raw = k_inv * h.column(1).into_owned();
    let t_raw = k_inv * h.column(2).into_owned();
    let scale = 1.0 / r1_raw.norm().max(1e-18);

    let r1 = r1_raw * scale;
    let r2 = r2_raw * scale;
    let r3 = r1.cross(&r2);
    let approx_r = Matrix3::from_columns(&[r1, r2, r3]);

    let svd = approx_r.svd(true, true);
    let u = svd.u.ok_or(SolveError::Degenerate {
        reason: "SVD failed in pose orthogonalization",
    })?;
    let vt = svd.v_t.ok_or(SolveError::Degenerate {
        reason: "SVD failed in pose orthogonalization",
    })?;
    let mut r = u * vt;
    if r.determinant() < 0.0 {
        r = -r;
    }

    Ok(Pose::new(r, t_raw * scale))
}

fn coeff_mut(d: &mut Distortion, idx: usize) -> &mut f64 {
    match idx {
        0 => &mut d.k1,
        1 => &mut d.k2,
        2 => &mut d.p1,
        3 => &mut d.p2,
        4 => &mut d.k3,
        5 => &mut d.k4,
        6 => &mut d.k5,
        7 => &mut d.k6,
        _ => unreachable!("distortion model has 8 coefficients"),
    }
}

/// Fit the free distortion coefficients to the reprojection residuals by
/// Gauss-Newton with a numerical Jacobian, holding intrinsics and poses
/// fixed. Coefficients removed by the options stay at zero.
fn refine_distortion(
    camera: &CameraMatrix,
    poses: &[Pose],
    views: &[CorrespondenceView],
    options: &SolveOptions,
) -> Distortion {
    const EPS: f64 = 1e-7;
    const MAX_ITERS: usize = 20;

    let mut distortion = Distortion {
        rational: options.rational_model,
        ..Distortion::none()
    };

    let free: Vec<usize> = options
        .free_mask()
        .iter()
        .enumerate()
        .filter_map(|(i, &f)| f.then_some(i))
        .collect();
    let total: usize = views.iter().map(|v| v.image_points.len()).sum();
    if free.is_empty() || total * 2 < free.len() {
        return distortion;
    }

    for _ in 0..MAX_ITERS {
        let mut jac = DMatrix::<f64>::zeros(2 * total, free.len());
        let mut res = DVector::<f64>::zeros(2 * total);

        let mut row = 0usize;
        for (pose, view) in poses.iter().zip(views.iter()) {
            for (p3, p2) in view.object_points.iter().zip(view.image_points.iter()) {
                let Ok(pred) = project_point(camera, &distortion, pose, p3) else {
                    row += 2;
                    continue;
                };
                res[row] = pred.x - p2.x;
                res[row + 1] = pred.y - p2.y;

                for (col, &idx) in free.iter().enumerate() {
                    let mut perturbed = distortion;
                    *coeff_mut(&mut perturbed, idx) += EPS;
                    let Ok(shifted) = project_point(camera, &perturbed, pose, p3) else {
                        continue;
                    };
                    jac[(row, col)] = (shifted.x - pred.x) / EPS;
                    jac[(row + 1, col)] = (shifted.y - pred.y) / EPS;
                }
                row += 2;
            }
        }

        let jt = jac.transpose();
        let h = &jt * &jac;
        let g = &jt * &res;
        let Some(delta) = h.lu().solve(&g) else {
            break;
        };

        for (col, &idx) in free.iter().enumerate() {
            *coeff_mut(&mut distortion, idx) -= delta[col];
        }
        if delta.norm() < 1e-12 {
            break;
        }
    }
    distortion
}

/// RMS reprojection error of the model over every point pair, in pixels.
fn rms_reprojection(
    camera: &CameraMatrix,
    distortion: &Distortion,
    poses: &[Pose],
    views: &[CorrespondenceView],
) -> Result<f64, SolveError> {
    let mut sq_sum = 0.0f64;
    let mut count = 0usize;
    for (pose, view) in poses.iter().zip(views.iter()) {
        for (p3, p2) in view.object_points.iter().zip(view.image_points.iter()) {
            let Ok(pred) = project_point(camera, distortion, pose, p3) else {
                continue;
            };
            sq_sum += (pred - p2).norm_squared();
            count += 1;
        }
    }
    if count == 0 {
        return Err(SolveError::Degenerate {
            reason: "no reprojectable points",
        });
    }
    Ok((sq_sum / count as f64).sqrt())
}

fn is_valid_output(output: &SolveOutput) -> bool {
    output.camera_matrix.is_finite()
        && output.camera_matrix.fx().abs() > 1e-12
        && output.camera_matrix.fy().abs() > 1e-12
        && output.residual.is_finite()
        && output.distortion.is_finite()
        && output.poses.iter().all(Pose::is_finite)
}
