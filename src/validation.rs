//! Comparing produced tracks with ground truth.

mod ground_truth;
mod validator;

pub use ground_truth::{GroundTruth, GroundTruthTrack, TruthDetection, TruthEntry, TruthId};
pub use validator::{GapCheck, ValidationReport, ValidationScore, ValidationSummary, Validator};
