use serde::{Deserialize, Serialize};

/// Track state enumeration for the linking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackState {
    /// Accepting extension
    #[default]
    Open,
    /// No further extension attempted
    Closed,
}

/// How two consecutive detections of a track were joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    /// Same camera, `gap` skipped frames in between
    Temporal { gap: u64 },
    /// Across a registered camera boundary
    CameraGap { gap: u64 },
}

impl LinkKind {
    pub fn gap(&self) -> u64 {
        match *self {
            LinkKind::Temporal { gap } | LinkKind::CameraGap { gap } => gap,
        }
    }

    pub fn is_camera_gap(&self) -> bool {
        matches!(self, LinkKind::CameraGap { .. })
    }
}
