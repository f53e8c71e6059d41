mod camera;
mod detection;
pub mod matching;
mod store;
mod track;
mod track_set;
mod track_state;
mod walker;

pub use camera::CameraAdjacency;
pub use detection::{CameraId, Detection, DetectionKey, FrameIdx};
pub use matching::{AssignmentResult, AssignmentStrategy};
pub use store::DetectionStore;
pub use track::{Track, TrackId};
pub use track_set::TrackSet;
pub use track_state::{LinkKind, TrackState};
pub use walker::{Walker, WalkerConfig};
