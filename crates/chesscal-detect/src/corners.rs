use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor, ThresholdMode};
use log::warn;
use nalgebra::Point2;

use crate::params::DetectorParams;

/// A raw ChESS corner candidate.
#[derive(Clone, Copy, Debug)]
pub struct Corner {
    pub position: Point2<f64>,
    /// Edge orientation in radians, defined modulo pi.
    pub orientation: f32,
    pub strength: f32,
}

fn chess_config(params: &DetectorParams) -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.threshold_mode = ThresholdMode::Relative;
    cfg.threshold_value = params.corner_threshold_rel;
    cfg.nms_radius = params.nms_radius;
    cfg
}

fn adapt(c: &CornerDescriptor) -> Corner {
    Corner {
        position: Point2::new(c.x as f64, c.y as f64),
        // The first descriptor axis tracks the stronger edge direction.
        orientation: c.axes[0].angle,
        strength: c.response,
    }
}

/// Detect ChESS corners in a grayscale image, filtered by strength.
///
/// A detection-stage failure is logged and treated as an image with no
/// corners, so a single bad frame cannot abort a batch.
pub fn detect_corners(img: &image::GrayImage, params: &DetectorParams) -> Vec<Corner> {
    let cfg = chess_config(params);
    let descriptors = match find_chess_corners_image(img, &cfg) {
        Ok(descriptors) => descriptors,
        Err(err) => {
            warn!("ChESS corner detection failed: {err}");
            return Vec::new();
        }
    };
    descriptors
        .iter()
        .map(adapt)
        .filter(|c| c.strength >= params.min_strength)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(squares: u32, square_px: u32) -> image::GrayImage {
        let side = squares * square_px;
        image::GrayImage::from_fn(side, side, |x, y| {
            let parity = (x / square_px + y / square_px) % 2;
            image::Luma([if parity == 0 { 230 } else { 25 }])
        })
    }

    #[test]
    fn checkerboard_yields_corners() {
        let img = checkerboard(6, 24);
        let corners = detect_corners(&img, &DetectorParams::default());

        assert!(!corners.is_empty());
        for c in &corners {
            assert!(c.position.x >= 0.0 && c.position.x < 144.0);
            assert!(c.position.y >= 0.0 && c.position.y < 144.0);
            assert!(c.orientation.is_finite());
            assert!(c.strength > 0.0);
        }
    }

    #[test]
    fn strength_filter_drops_weak_corners() {
        let img = checkerboard(6, 24);
        let mut params = DetectorParams::default();
        params.min_strength = f32::MAX;
        assert!(detect_corners(&img, &params).is_empty());
    }
}
