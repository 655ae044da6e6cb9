//! Camera calibration from batches of chessboard images.
//!
//! The pipeline walks an image directory, detects the calibration pattern
//! in every image (sequentially or over a worker pool), solves for the
//! camera model from the accepted views and persists a human-readable
//! report next to a machine-readable JSON record.
//!
//! The high-level entry point is [`run_calibration`]; the stages are also
//! usable on their own through [`BatchCollector`], the solver crates and
//! [`CalibrationRecord`].

mod collect;
mod evaluate;
mod record;
mod run;
mod undistort;

pub use collect::{
    BatchCollector, CollectError, ExecutionStrategy, Rejection, RejectionReason,
};
pub use evaluate::{reprojection_error, EvaluateError};
pub use record::{CalibrationRecord, PersistenceError};
pub use run::{
    list_images, run_calibration, CalibrationError, RunConfig, DEFAULT_FILE_PREFIX,
    DEFAULT_RECORD_NAME, DEFAULT_REPORT_NAME,
};
pub use undistort::undistort_points;

pub use chesscal_core as core;
pub use chesscal_detect as detect;
pub use chesscal_solve as solve;
