//! Error taxonomy for tracking, training and validation.

use thiserror::Error;

use crate::tracker::{DetectionKey, FrameIdx};

pub type Result<T> = std::result::Result<T, TrackingError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    /// Input detection cannot be used; aborts the run.
    #[error("malformed detection {key}: {reason}")]
    MalformedDetection { key: DetectionKey, reason: String },

    /// Ground truth cannot be merged, e.g. a truth track seen twice in one frame.
    #[error("malformed ground truth for track {truth_id}: {reason}")]
    MalformedGroundTruth { truth_id: u64, reason: String },

    /// A feature or classifier produced/expected the wrong shape.
    #[error("feature shape mismatch in `{feature}`: expected {expected:?}, got {got:?}")]
    FeatureShape {
        feature: String,
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("insufficient training data: {0}")]
    InsufficientData(String),

    /// `None` when there were no produced tracks to define a range.
    #[error("no ground truth overlaps the validated frame range {0:?}")]
    EmptyGroundTruth(Option<(FrameIdx, FrameIdx)>),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TrackingError {
    pub(crate) fn malformed(key: DetectionKey, reason: impl Into<String>) -> Self {
        Self::MalformedDetection {
            key,
            reason: reason.into(),
        }
    }
}
