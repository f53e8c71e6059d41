//! Gap-tolerant linking of per-frame detections into tracks.
//!
//! A [`Walker`] consumes a [`DetectionStore`] and a [`Scorer`] and links
//! detections frame by frame; a [`Validator`] compares the resulting tracks
//! with [`GroundTruth`].

pub mod error;
pub mod integration;
pub mod scoring;
pub mod tracker;
pub mod validation;

pub use error::{Result, TrackingError};
pub use integration::{DetectionBuilder, DetectionSource, TrackingPipeline};
pub use scoring::{ClassifierScorer, Scorer, train};
pub use tracker::{Detection, DetectionStore, Track, Walker, WalkerConfig};
pub use validation::{GapCheck, GroundTruth, Validator};
