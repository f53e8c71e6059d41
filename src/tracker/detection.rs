//! Single observed object instance.

use nalgebra::Point2;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};

pub type DetectionKey = u64;
pub type FrameIdx = u64;
pub type CameraId = u16;

/// Detection input for the tracker.
///
/// Positions of all cameras share one coordinate frame. A loader that has no
/// position for a detection fills it with NaN; such a detection is rejected by
/// [`Detection::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Unique key of this detection
    pub key: DetectionKey,
    /// Frame the detection was observed in
    pub frame_idx: FrameIdx,
    /// Camera that observed the detection
    pub cam_id: CameraId,
    /// Position in world coordinates
    pub position: Point2<f64>,
    /// Orientation in radians
    pub orientation: f64,
    /// Identity descriptor, e.g. per-bit probabilities of a decoded tag
    pub descriptor: Array1<f64>,
}

impl Detection {
    pub fn new(
        key: DetectionKey,
        frame_idx: FrameIdx,
        cam_id: CameraId,
        x: f64,
        y: f64,
        orientation: f64,
        descriptor: Array1<f64>,
    ) -> Self {
        Self {
            key,
            frame_idx,
            cam_id,
            position: Point2::new(x, y),
            orientation,
            descriptor,
        }
    }

    /// Euclidean distance between the two positions.
    #[inline]
    pub fn distance(&self, other: &Detection) -> f64 {
        nalgebra::distance(&self.position, &other.position)
    }

    /// Reject detections downstream code cannot reason about.
    pub fn validate(&self) -> Result<()> {
        if !self.position.x.is_finite() || !self.position.y.is_finite() {
            return Err(TrackingError::malformed(self.key, "missing position"));
        }
        if !self.orientation.is_finite() {
            return Err(TrackingError::malformed(self.key, "missing orientation"));
        }
        if self.descriptor.iter().any(|v| !v.is_finite()) {
            return Err(TrackingError::malformed(
                self.key,
                "non-finite identity descriptor",
            ));
        }
        Ok(())
    }
}
