//! Trait for external detection loaders.

use crate::tracker::Detection;

/// Trait for detection loaders.
///
/// Implement this trait to connect a detection archive or a live detection
/// pipeline to the tracker. The loader owns the on-disk format.
///
/// # Example
///
/// ```ignore
/// use tagtrack_rs::{Detection, DetectionSource};
///
/// struct ArchiveLoader {
///     // Your reader here
/// }
///
/// impl DetectionSource for ArchiveLoader {
///     type Error = std::io::Error;
///
///     fn load(&mut self) -> Result<Vec<Detection>, Self::Error> {
///         // Read and decode the archive
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for loading failures.
    type Error;

    /// Load every detection of the sequence, in any order.
    ///
    /// Missing positions should be reported as NaN coordinates so the tracker
    /// can reject them instead of the loader silently dropping detections.
    fn load(&mut self) -> Result<Vec<Detection>, Self::Error>;
}

impl DetectionSource for Vec<Detection> {
    type Error = std::convert::Infallible;

    fn load(&mut self) -> Result<Vec<Detection>, Self::Error> {
        Ok(self.clone())
    }
}
