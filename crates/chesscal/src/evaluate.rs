use chesscal_core::{
    project_point, CameraMatrix, CorrespondenceSet, Distortion, Pose, ProjectError,
};

#[derive(thiserror::Error, Debug)]
pub enum EvaluateError {
    #[error("{poses} poses for {views} views")]
    PoseCountMismatch { poses: usize, views: usize },

    #[error("correspondence set has no points")]
    EmptySet,

    #[error(transparent)]
    Project(#[from] ProjectError),
}

/// RMS reprojection error of a camera model over a correspondence set.
///
/// Every view's object points are projected through its pose and compared
/// against the detected corners; the result is the square root of the
/// mean squared pixel error over all point pairs of all views.
pub fn reprojection_error(
    camera: &CameraMatrix,
    distortion: &Distortion,
    poses: &[Pose],
    set: &CorrespondenceSet,
) -> Result<f64, EvaluateError> {
    if poses.len() != set.len() {
        return Err(EvaluateError::PoseCountMismatch {
            poses: poses.len(),
            views: set.len(),
        });
    }
    let count = set.point_count();
    if count == 0 {
        return Err(EvaluateError::EmptySet);
    }

    let mut sq_sum = 0.0f64;
    for (pose, view) in poses.iter().zip(set.views.iter()) {
        for (p3, p2) in view.object_points.iter().zip(view.image_points.iter()) {
            let pred = project_point(camera, distortion, pose, p3)?;
            sq_sum += (pred - p2).norm_squared();
        }
    }
    Ok((sq_sum / count as f64).sqrt())
}
