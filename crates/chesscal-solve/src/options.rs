use serde::{Deserialize, Serialize};

/// Solver configuration fixed for the duration of one calibration run.
///
/// The defaults enable the rational distortion model with k4 and k5 held
/// at zero, leaving `[k1, k2, p1, p2, k3, k6]` free. Flags only remove
/// parameters from the refinement; they never change the closed-form
/// intrinsics estimate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveOptions {
    /// Use the rational distortion denominator (k4..k6).
    pub rational_model: bool,
    /// Hold the tangential coefficients p1, p2 at zero.
    pub zero_tangential: bool,
    pub fix_k1: bool,
    pub fix_k2: bool,
    pub fix_k3: bool,
    pub fix_k4: bool,
    pub fix_k5: bool,
    pub fix_k6: bool,
    /// Enforce fx = ratio * fy on the closed-form estimate.
    pub fix_aspect_ratio: Option<f64>,
    /// Pin the principal point to these pixel coordinates.
    pub fix_principal_point: Option<(f64, f64)>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            rational_model: true,
            zero_tangential: false,
            fix_k1: false,
            fix_k2: false,
            fix_k3: false,
            fix_k4: true,
            fix_k5: true,
            fix_k6: false,
            fix_aspect_ratio: None,
            fix_principal_point: None,
        }
    }
}

impl SolveOptions {
    /// Which distortion coefficients participate in refinement, in the
    /// order `[k1, k2, p1, p2, k3, k4, k5, k6]`.
    pub(crate) fn free_mask(&self) -> [bool; 8] {
        [
            !self.fix_k1,
            !self.fix_k2,
            !self.zero_tangential,
            !self.zero_tangential,
            !self.fix_k3,
            self.rational_model && !self.fix_k4,
            self.rational_model && !self.fix_k5,
            self.rational_model && !self.fix_k6,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mask_frees_the_reference_coefficients() {
        let mask = SolveOptions::default().free_mask();
        assert_eq!(mask, [true, true, true, true, true, false, false, true]);
    }

    #[test]
    fn plain_model_never_frees_rational_terms() {
        let options = SolveOptions {
            rational_model: false,
            fix_k4: false,
            fix_k5: false,
            fix_k6: false,
            ..SolveOptions::default()
        };
        assert_eq!(
            options.free_mask(),
            [true, true, true, true, true, false, false, false]
        );
    }
}
