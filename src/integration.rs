//! Integration module for connecting external detection loaders with the
//! tracker.
//!
//! Loading and deserialising detection archives is left to implementors of
//! [`DetectionSource`]; this module turns their output into tracks.

mod builder;
mod detector;
mod pipeline;

pub use builder::DetectionBuilder;
pub use detector::DetectionSource;
pub use pipeline::{PipelineError, TrackingPipeline};
