use nalgebra::{Matrix2, Matrix3, Point2, Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Pixel dimensions shared by every image of a calibration batch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// 3x3 intrinsic camera matrix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraMatrix(pub Matrix3<f64>);

impl CameraMatrix {
    pub fn from_params(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self(Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0))
    }

    pub fn fx(&self) -> f64 {
        self.0[(0, 0)]
    }

    pub fn fy(&self) -> f64 {
        self.0[(1, 1)]
    }

    pub fn cx(&self) -> f64 {
        self.0[(0, 2)]
    }

    pub fn cy(&self) -> f64 {
        self.0[(1, 2)]
    }

    /// Skew term; zero for square-sampled sensors, the planar solve may
    /// produce a tiny numerical residual here.
    pub fn skew(&self) -> f64 {
        self.0[(0, 1)]
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

/// Radial-tangential lens distortion, optionally with the rational
/// denominator terms (k4..k6).
///
/// The coefficient vector flattens to `[k1, k2, p1, p2, k3]`, extended with
/// `[k4, k5, k6]` when the rational model is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
    /// Whether k4..k6 participate in the model.
    pub rational: bool,
}

impl Distortion {
    pub fn none() -> Self {
        Self::default()
    }

    /// Flattened coefficient vector, `[k1, k2, p1, p2, k3]` order.
    pub fn coefficients(&self) -> Vec<f64> {
        let mut coeffs = vec![self.k1, self.k2, self.p1, self.p2, self.k3];
        if self.rational {
            coeffs.extend_from_slice(&[self.k4, self.k5, self.k6]);
        }
        coeffs
    }

    pub fn is_finite(&self) -> bool {
        self.coefficients().iter().all(|v| v.is_finite())
    }

    /// Apply the distortion model to normalized image coordinates.
    pub fn distort(&self, xn: f64, yn: f64) -> (f64, f64) {
        let r2 = xn * xn + yn * yn;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let mut radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        if self.rational {
            radial /= 1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6;
        }

        let xd = xn * radial + 2.0 * self.p1 * xn * yn + self.p2 * (r2 + 2.0 * xn * xn);
        let yd = yn * radial + self.p1 * (r2 + 2.0 * yn * yn) + 2.0 * self.p2 * xn * yn;
        (xd, yd)
    }

    /// Invert the distortion model for one normalized point.
    ///
    /// Newton iteration with a numerical Jacobian, bounded by `max_iter`
    /// steps or a 1e-10 step norm. Returns the last iterate if the Jacobian
    /// degenerates; the model is smooth near the optical axis so this
    /// converges in a handful of steps for realistic coefficients.
    pub fn undistort(&self, xd: f64, yd: f64, max_iter: u32) -> (f64, f64) {
        const EPS: f64 = 1e-10;
        const DELTA: f64 = 1e-7;

        let target = Vector2::new(xd, yd);
        let mut p = target;
        for _ in 0..max_iter {
            let (ex, ey) = self.distort(p.x, p.y);
            let err = Vector2::new(ex, ey) - target;
            if err.norm() < EPS {
                break;
            }

            let (fx1, fy1) = self.distort(p.x + DELTA, p.y);
            let (fx2, fy2) = self.distort(p.x, p.y + DELTA);
            let jac = Matrix2::new(
                (fx1 - ex) / DELTA,
                (fx2 - ex) / DELTA,
                (fy1 - ey) / DELTA,
                (fy2 - ey) / DELTA,
            );

            let Some(inv) = jac.try_inverse() else {
                break;
            };
            let step = inv * err;
            p -= step;
            if step.norm() < EPS {
                break;
            }
        }
        (p.x, p.y)
    }
}

/// Per-view extrinsic parameters: the rigid transform from pattern space
/// into camera space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Map a pattern-space point into camera space.
    pub fn transform(&self, point: &Point3<f64>) -> Vector3<f64> {
        self.rotation * point.coords + self.translation
    }

    pub fn is_finite(&self) -> bool {
        self.rotation.iter().all(|v| v.is_finite()) && self.translation.iter().all(|v| v.is_finite())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("point is at the camera center (z ~ 0), projection undefined")]
    PointAtCameraCenter,
}

/// Project a pattern-space 3D point through pose, distortion and camera
/// matrix into pixel coordinates.
pub fn project_point(
    camera: &CameraMatrix,
    distortion: &Distortion,
    pose: &Pose,
    point: &Point3<f64>,
) -> Result<Point2<f64>, ProjectError> {
    let pc = pose.transform(point);
    if pc.z <= f64::EPSILON.sqrt() {
        return Err(ProjectError::PointAtCameraCenter);
    }

    let xn = pc.x / pc.z;
    let yn = pc.y / pc.z;
    let (xd, yd) = distortion.distort(xn, yn);

    let u = camera.fx() * xd + camera.skew() * yd + camera.cx();
    let v = camera.fy() * yd + camera.cy();
    Ok(Point2::new(u, v))
}
