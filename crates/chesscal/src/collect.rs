use std::path::{Path, PathBuf};

use log::{debug, info};
use nalgebra::Point2;
use rayon::prelude::*;

use chesscal_core::{CorrespondenceSet, CorrespondenceView, ImageSize, PatternSize};
use chesscal_detect::FeatureDetector;

/// How the collector walks the image batch.
///
/// Images are independent, so the worker pool runs the detector on all
/// available cores. Results are assembled in input order either way; the
/// two strategies produce identical output.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExecutionStrategy {
    Sequential,
    #[default]
    WorkerPool,
}

/// Why an image was left out of the correspondence set.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RejectionReason {
    #[error("image could not be read: {0}")]
    UnreadableImage(String),

    #[error("no complete chessboard pattern found")]
    PatternNotFound,

    #[error("image is {got:?}, batch is {expected:?}")]
    DimensionMismatch { expected: ImageSize, got: ImageSize },
}

/// A skipped image together with the reason; the batch keeps going.
#[derive(Clone, Debug, PartialEq)]
pub struct Rejection {
    pub source: String,
    pub reason: RejectionReason,
}

#[derive(thiserror::Error, Debug)]
pub enum CollectError {
    #[error("no chessboard pattern found in any of the {total} images")]
    NoPatternFound { total: usize },
}

enum ImageOutcome {
    Loaded {
        source: String,
        size: ImageSize,
        points: Option<Vec<Point2<f64>>>,
    },
    Unreadable {
        source: String,
        message: String,
    },
}

/// Runs a [`FeatureDetector`] over a batch of image files and gathers the
/// accepted views into a [`CorrespondenceSet`].
///
/// The first readable image fixes the batch dimensions; later images that
/// disagree are rejected rather than failing the run. The collector only
/// errors when not a single image yields the pattern.
pub struct BatchCollector<D> {
    detector: D,
    pattern: PatternSize,
    strategy: ExecutionStrategy,
}

impl<D: FeatureDetector> BatchCollector<D> {
    pub fn new(detector: D, pattern: PatternSize) -> Self {
        Self {
            detector,
            pattern,
            strategy: ExecutionStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn process(&self, path: &Path) -> ImageOutcome {
        let source = path.display().to_string();
        debug!("processing {source}");
        match image::open(path) {
            Ok(img) => {
                let gray = img.to_luma8();
                let size = ImageSize {
                    width: gray.width(),
                    height: gray.height(),
                };
                let points = self.detector.detect(&gray, self.pattern);
                if points.is_none() {
                    info!("{source}: chessboard not found");
                }
                ImageOutcome::Loaded {
                    source,
                    size,
                    points,
                }
            }
            Err(err) => ImageOutcome::Unreadable {
                source,
                message: err.to_string(),
            },
        }
    }

    /// Detect the pattern in every image and assemble the accepted views
    /// in input order.
    pub fn collect(
        &self,
        paths: &[PathBuf],
    ) -> Result<(CorrespondenceSet, Vec<Rejection>), CollectError> {
        let outcomes: Vec<ImageOutcome> = match self.strategy {
            ExecutionStrategy::Sequential => paths.iter().map(|p| self.process(p)).collect(),
            // Indexed parallel map keeps the results in input order.
            ExecutionStrategy::WorkerPool => {
                paths.par_iter().map(|p| self.process(p)).collect()
            }
        };

        let object_points = self.pattern.object_points();
        let mut views = Vec::new();
        let mut rejections = Vec::new();
        let mut reference: Option<ImageSize> = None;

        for outcome in outcomes {
            match outcome {
                ImageOutcome::Unreadable { source, message } => rejections.push(Rejection {
                    source,
                    reason: RejectionReason::UnreadableImage(message),
                }),
                ImageOutcome::Loaded {
                    source,
                    size,
                    points,
                } => {
                    let expected = *reference.get_or_insert(size);
                    if size != expected {
                        rejections.push(Rejection {
                            source,
                            reason: RejectionReason::DimensionMismatch {
                                expected,
                                got: size,
                            },
                        });
                        continue;
                    }
                    match points {
                        Some(image_points) => views.push(CorrespondenceView {
                            source,
                            image_points,
                            object_points: object_points.clone(),
                        }),
                        None => rejections.push(Rejection {
                            source,
                            reason: RejectionReason::PatternNotFound,
                        }),
                    }
                }
            }
        }

        // A non-empty view list implies a reference size was recorded.
        let image_size = match reference {
            Some(size) if !views.is_empty() => size,
            _ => {
                return Err(CollectError::NoPatternFound {
                    total: paths.len(),
                })
            }
        };

        Ok((
            CorrespondenceSet {
                views,
                image_size,
                pattern: self.pattern,
            },
            rejections,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Detector whose result is encoded in the top-left pixel: values
    /// below 100 yield a full grid shifted by the pixel value, anything
    /// else is a miss.
    struct PixelCodedDetector;

    impl FeatureDetector for PixelCodedDetector {
        fn detect(
            &self,
            image: &image::GrayImage,
            pattern: PatternSize,
        ) -> Option<Vec<Point2<f64>>> {
            let code = image.get_pixel(0, 0).0[0];
            if code >= 100 {
                return None;
            }
            Some(
                pattern
                    .object_points()
                    .iter()
                    .map(|p| Point2::new(p.x * 10.0 + f64::from(code), p.y * 10.0))
                    .collect(),
            )
        }
    }

    fn write_coded_image(dir: &Path, name: &str, code: u8, size: (u32, u32)) -> PathBuf {
        let mut img = image::GrayImage::from_pixel(size.0, size.1, image::Luma([200u8]));
        img.put_pixel(0, 0, image::Luma([code]));
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn accepted_views_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_coded_image(dir.path(), "a.png", 2, (32, 32)),
            write_coded_image(dir.path(), "b.png", 200, (32, 32)),
            write_coded_image(dir.path(), "c.png", 7, (32, 32)),
        ];

        let collector = BatchCollector::new(PixelCodedDetector, PatternSize::new(3, 4))
            .with_strategy(ExecutionStrategy::Sequential);
        let (set, rejections) = collector.collect(&paths).unwrap();

        assert_eq!(set.views.len(), 2);
        assert_eq!(set.views[0].image_points[0].x, 2.0);
        assert_eq!(set.views[1].image_points[0].x, 7.0);
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].reason, RejectionReason::PatternNotFound);
        assert_eq!(
            set.image_size,
            ImageSize {
                width: 32,
                height: 32
            }
        );
    }

    #[test]
    fn worker_pool_matches_sequential_output() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..8)
            .map(|i| {
                write_coded_image(dir.path(), &format!("img-{i}.png"), i as u8, (24, 24))
            })
            .collect();

        let pattern = PatternSize::new(3, 3);
        let sequential = BatchCollector::new(PixelCodedDetector, pattern)
            .with_strategy(ExecutionStrategy::Sequential)
            .collect(&paths)
            .unwrap();
        let pooled = BatchCollector::new(PixelCodedDetector, pattern)
            .with_strategy(ExecutionStrategy::WorkerPool)
            .collect(&paths)
            .unwrap();

        assert_eq!(sequential.0, pooled.0);
        assert_eq!(sequential.1, pooled.1);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_coded_image(dir.path(), "a.png", 1, (32, 32)),
            write_coded_image(dir.path(), "b.png", 2, (16, 16)),
        ];

        let collector = BatchCollector::new(PixelCodedDetector, PatternSize::new(3, 3));
        let (set, rejections) = collector.collect(&paths).unwrap();

        assert_eq!(set.views.len(), 1);
        assert!(matches!(
            rejections[0].reason,
            RejectionReason::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn unreadable_image_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("broken.png");
        fs::write(&garbage, b"not a png").unwrap();
        let paths = vec![
            garbage,
            write_coded_image(dir.path(), "ok.png", 3, (20, 20)),
        ];

        let collector = BatchCollector::new(PixelCodedDetector, PatternSize::new(3, 3));
        let (set, rejections) = collector.collect(&paths).unwrap();

        assert_eq!(set.views.len(), 1);
        assert!(matches!(
            rejections[0].reason,
            RejectionReason::UnreadableImage(_)
        ));
    }

    #[test]
    fn all_misses_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_coded_image(dir.path(), "a.png", 250, (32, 32)),
            write_coded_image(dir.path(), "b.png", 251, (32, 32)),
        ];

        let collector = BatchCollector::new(PixelCodedDetector, PatternSize::new(3, 3));
        let err = collector.collect(&paths).unwrap_err();
        assert!(matches!(err, CollectError::NoPatternFound { total: 2 }));
    }
}
