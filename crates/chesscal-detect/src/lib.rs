//! Chessboard corner detection for camera calibration.
//!
//! The detector front end finds ChESS corners with the `chess-corners`
//! crate, assembles them into an ordered row-major grid using the corner
//! orientations, and polishes each corner to sub-pixel accuracy on the
//! grayscale image.

mod corners;
mod detector;
mod grid;
mod params;
mod refine;

pub use corners::{detect_corners, Corner};
pub use detector::{ChessboardDetector, FeatureDetector};
pub use grid::assemble_grid;
pub use params::{DetectorParams, RefineParams};
pub use refine::refine_corners;
