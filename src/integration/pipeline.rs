//! TrackingPipeline for combining detection loading with tracking.

use thiserror::Error;

use crate::error::TrackingError;
use crate::scoring::Scorer;
use crate::tracker::{DetectionStore, Track, Walker, WalkerConfig};
use crate::validation::{GapCheck, GroundTruth, TruthDetection, ValidationReport, Validator};

use super::DetectionSource;

#[derive(Debug, Error)]
pub enum PipelineError<E> {
    #[error("detection source failed: {0}")]
    Source(E),
    #[error(transparent)]
    Tracking(#[from] TrackingError),
}

/// A combined runner that bundles a detection loader with the walker.
///
/// This struct provides a convenient way to run end-to-end tracking
/// by combining any `DetectionSource` with a `Walker`.
pub struct TrackingPipeline<D: DetectionSource> {
    source: D,
    config: WalkerConfig,
}

impl<D: DetectionSource> TrackingPipeline<D> {
    /// Create a new tracking pipeline with the given loader and walker config.
    pub fn new(source: D, config: WalkerConfig) -> Self {
        Self { source, config }
    }

    /// Load all detections into a validated store.
    pub fn load_store(&mut self) -> Result<DetectionStore, PipelineError<D::Error>> {
        let detections = self.source.load().map_err(PipelineError::Source)?;
        Ok(DetectionStore::from_detections(detections)?)
    }

    /// Load the detections and link them into tracks.
    pub fn run<S: Scorer + ?Sized>(
        &mut self,
        scorer: &S,
    ) -> Result<Vec<Track>, PipelineError<D::Error>> {
        let store = self.load_store()?;
        let walker = Walker::new(&store, scorer, self.config.clone())?;
        Ok(walker.calc_tracks()?)
    }

    /// Track, merge the given ground truth, and validate the tracks against it.
    pub fn run_and_validate<S, I>(
        &mut self,
        scorer: &S,
        truth: I,
        merge_radius: f64,
        check: GapCheck,
    ) -> Result<(Vec<Track>, ValidationReport), PipelineError<D::Error>>
    where
        S: Scorer + ?Sized,
        I: IntoIterator<Item = TruthDetection>,
    {
        let store = self.load_store()?;
        let tracks = Walker::new(&store, scorer, self.config.clone())?.calc_tracks()?;
        let ground_truth = GroundTruth::merge(&store, truth, merge_radius)?;
        let report = Validator::new(&ground_truth).validate(&tracks, check)?;
        Ok((tracks, report))
    }

    /// Get a reference to the underlying loader.
    pub fn source(&self) -> &D {
        &self.source
    }

    /// Get a mutable reference to the underlying loader.
    pub fn source_mut(&mut self) -> &mut D {
        &mut self.source
    }

    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::DetectionBuilder;
    use crate::tracker::Detection;
    use ndarray::Array2;

    struct FailingSource;

    impl DetectionSource for FailingSource {
        type Error = String;

        fn load(&mut self) -> Result<Vec<Detection>, Self::Error> {
            Err("archive truncated".to_string())
        }
    }

    fn near_one(t: &[&Track], d: &[&Detection]) -> Array2<f64> {
        Array2::from_elem((t.len(), d.len()), 0.9)
    }

    fn det(key: u64, frame: u64, x: f64) -> Detection {
        DetectionBuilder::new(key)
            .frame(frame)
            .position(x, 0.0)
            .orientation(0.0)
            .id_bits(5, 4)
            .build()
    }

    #[test]
    fn test_tracking_pipeline() {
        let source = vec![det(1, 0, 0.0), det(2, 1, 1.0), det(3, 1, 50.0)];
        let config = WalkerConfig::new(1, 10.0, 0.5).unwrap();
        let mut pipeline = TrackingPipeline::new(source, config);
        let tracks = pipeline.run(&near_one).unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].keys().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(tracks[1].keys().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_source_error_is_surfaced() {
        let config = WalkerConfig::new(1, 10.0, 0.5).unwrap();
        let mut pipeline = TrackingPipeline::new(FailingSource, config);
        match pipeline.run(&near_one) {
            Err(PipelineError::Source(msg)) => assert_eq!(msg, "archive truncated"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_detection_aborts_pipeline() {
        let mut bad = det(2, 1, 1.0);
        bad.position.y = f64::NAN;
        let config = WalkerConfig::new(1, 10.0, 0.5).unwrap();
        let mut pipeline = TrackingPipeline::new(vec![det(1, 0, 0.0), bad], config);
        assert!(matches!(
            pipeline.run(&near_one),
            Err(PipelineError::Tracking(TrackingError::MalformedDetection { key: 2, .. }))
        ));
    }
}
