/// Tuning knobs for the chessboard detector.
#[derive(Clone, Copy, Debug)]
pub struct DetectorParams {
    /// Relative response threshold for the ChESS corner detector.
    pub corner_threshold_rel: f32,
    /// Non-maximum suppression radius in pixels.
    pub nms_radius: u32,
    /// Minimum corner response kept for grid assembly.
    pub min_strength: f32,
    /// Sub-pixel refinement settings.
    pub refine: RefineParams,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            corner_threshold_rel: 0.2,
            nms_radius: 2,
            min_strength: 0.0,
            refine: RefineParams::default(),
        }
    }
}

/// Settings for gradient-based sub-pixel corner refinement.
#[derive(Clone, Copy, Debug)]
pub struct RefineParams {
    /// Half-size of the refinement window; the full window spans
    /// `2 * half_window + 1` pixels per side.
    pub half_window: u32,
    pub max_iterations: u32,
    /// Stop once an iteration moves the corner less than this.
    pub epsilon: f64,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iterations: 30,
            epsilon: 1e-5,
        }
    }
}
