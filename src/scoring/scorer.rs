//! The seam between score producers and the assignment step.

use std::sync::Arc;

use ndarray::Array2;

use crate::error::{Result, TrackingError};
use crate::scoring::classifier::Classifier;
use crate::scoring::features::FeatureSet;
use crate::tracker::{Detection, Track};

/// Maps M tracks and N candidates to an M x N matrix of compatibility scores.
///
/// Higher means more likely the same object. Implementations must be pure:
/// the walker relies on identical inputs producing identical scores.
pub trait Scorer: Send + Sync {
    fn score(&self, tracks: &[&Track], detections: &[&Detection]) -> Result<Array2<f64>>;
}

impl<F> Scorer for F
where
    F: Fn(&[&Track], &[&Detection]) -> Array2<f64> + Send + Sync,
{
    fn score(&self, tracks: &[&Track], detections: &[&Detection]) -> Result<Array2<f64>> {
        let scores = self(tracks, detections);
        let expected = (tracks.len(), detections.len());
        if scores.dim() != expected {
            return Err(TrackingError::FeatureShape {
                feature: "score function".to_string(),
                expected,
                got: scores.dim(),
            });
        }
        Ok(scores)
    }
}

/// Scores pairs with a trained classifier applied to a fixed feature set.
#[derive(Debug, Clone)]
pub struct ClassifierScorer<C> {
    classifier: Arc<C>,
    features: FeatureSet,
}

impl<C: Classifier> ClassifierScorer<C> {
    /// Fails with `FeatureShape` if the classifier was fitted on a different
    /// number of features, or on differently named or ordered columns when it
    /// recorded their names.
    pub fn new(classifier: Arc<C>, features: FeatureSet) -> Result<Self> {
        let names = features.names();
        match classifier.n_features() {
            Some(n) if n == features.len() => {}
            other => {
                return Err(TrackingError::FeatureShape {
                    feature: names.join(","),
                    expected: (1, features.len()),
                    got: (1, other.unwrap_or(0)),
                });
            }
        }
        if let Some(fitted) = classifier.feature_names() {
            if fitted != names.as_slice() {
                return Err(TrackingError::FeatureShape {
                    feature: format!("{} (fitted as {})", names.join(","), fitted.join(",")),
                    expected: (1, fitted.len()),
                    got: (1, names.len()),
                });
            }
        }
        Ok(Self {
            classifier,
            features,
        })
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }
}

impl<C: Classifier> Scorer for ClassifierScorer<C> {
    fn score(&self, tracks: &[&Track], detections: &[&Detection]) -> Result<Array2<f64>> {
        let shape = (tracks.len(), detections.len());
        if shape.0 == 0 || shape.1 == 0 {
            return Ok(Array2::zeros(shape));
        }
        let x = self.features.design_matrix(tracks, detections)?;
        let proba = self.classifier.predict_proba(&x)?;
        proba
            .into_shape_with_order(shape)
            .map_err(|_| TrackingError::FeatureShape {
                feature: "classifier output".to_string(),
                expected: shape,
                got: (x.nrows(), 1),
            })
    }
}
