//! Builder for creating Detection objects field by field.

use ndarray::Array1;

use crate::tracker::{CameraId, Detection, DetectionKey, FrameIdx};

/// Builder for creating `Detection` objects.
///
/// Position and orientation start out missing (NaN), so a detection built
/// without them is rejected when the store is built.
#[derive(Debug, Clone)]
pub struct DetectionBuilder {
    key: DetectionKey,
    frame_idx: FrameIdx,
    cam_id: CameraId,
    x: f64,
    y: f64,
    orientation: f64,
    descriptor: Array1<f64>,
}

impl DetectionBuilder {
    /// Create a new detection builder.
    pub fn new(key: DetectionKey) -> Self {
        Self {
            key,
            frame_idx: 0,
            cam_id: 0,
            x: f64::NAN,
            y: f64::NAN,
            orientation: f64::NAN,
            descriptor: Array1::zeros(0),
        }
    }

    pub fn frame(mut self, frame_idx: FrameIdx) -> Self {
        self.frame_idx = frame_idx;
        self
    }

    pub fn camera(mut self, cam_id: CameraId) -> Self {
        self.cam_id = cam_id;
        self
    }

    /// Set position in world coordinates.
    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set orientation in radians.
    pub fn orientation(mut self, orientation: f64) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set orientation in degrees.
    pub fn orientation_degrees(mut self, degrees: f64) -> Self {
        self.orientation = degrees.to_radians();
        self
    }

    /// Set the identity descriptor.
    pub fn descriptor(mut self, descriptor: impl Into<Array1<f64>>) -> Self {
        self.descriptor = descriptor.into();
        self
    }

    /// Set the descriptor from a decoded id: bit `i` of `id` becomes a
    /// probability of 1.0 or 0.0 at position `i`, most significant bit first.
    pub fn id_bits(mut self, id: u32, bits: usize) -> Self {
        self.descriptor = Array1::from_shape_fn(bits, |i| {
            let shift = bits - 1 - i;
            if shift < 32 && (id >> shift) & 1 == 1 { 1.0 } else { 0.0 }
        });
        self
    }

    /// Build the final `Detection`.
    pub fn build(self) -> Detection {
        Detection::new(
            self.key,
            self.frame_idx,
            self.cam_id,
            self.x,
            self.y,
            self.orientation,
            self.descriptor,
        )
    }
}
