//! Camera calibration solvers.
//!
//! The shipped backend estimates intrinsics from planar homographies
//! (Zhang's method) and refines lens distortion by Gauss-Newton on the
//! reprojection residuals. Alternative backends plug in through the
//! [`CalibrationSolver`] trait.

mod options;
mod planar;
mod solver;

pub use options::SolveOptions;
pub use planar::PlanarSolver;
pub use solver::{CalibrationSolver, SolveError, SolveOutput};
