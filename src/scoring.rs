//! Compatibility scores between track tails and candidate detections.
//!
//! Features turn geometry and identity into pairwise matrices, a
//! [`Classifier`] fuses them, and the [`Scorer`] trait is all the walker
//! depends on.

mod classifier;
pub mod features;
mod scorer;
mod training;

pub use classifier::{Classifier, LogisticRegression, LogisticRegressionConfig};
pub use features::{Feature, FeatureSet, Symmetry};
pub use scorer::{ClassifierScorer, Scorer};
pub use training::{
    PRESET_FRAME_DIFF, PRESET_RADIUS, TrainingData, TrainingReport, make_detection_score_fun,
    preset_classifier_config, preset_features, train,
};
