//! Ordered chain of detections believed to be the same object.

use serde::{Deserialize, Serialize};

use crate::error::TrackingError;
use crate::tracker::detection::{CameraId, Detection, DetectionKey, FrameIdx};
use crate::tracker::track_state::{LinkKind, TrackState};

pub type TrackId = u64;

/// Append-only track.
///
/// Frame indices strictly increase along `detections`; `links[i]` describes
/// the step from `detections[i]` to `detections[i + 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrack")]
pub struct Track {
    /// Track identifier, dense within one tracking run
    pub id: TrackId,
    /// Current lifecycle state
    pub state: TrackState,
    detections: Vec<Detection>,
    links: Vec<LinkKind>,
}

#[derive(Deserialize)]
struct RawTrack {
    id: TrackId,
    state: TrackState,
    detections: Vec<Detection>,
    links: Vec<LinkKind>,
}

impl TryFrom<RawTrack> for Track {
    type Error = TrackingError;

    fn try_from(raw: RawTrack) -> Result<Self, Self::Error> {
        let id = raw.id;
        let invalid = |reason: &str| TrackingError::InvalidConfig(format!("track {id}: {reason}"));
        let mut track = Track::from_chain(raw.id, raw.detections)
            .ok_or_else(|| invalid("empty or not ordered by frame"))?;
        if track.links != raw.links {
            return Err(invalid("links do not match its detections"));
        }
        track.state = raw.state;
        Ok(track)
    }
}

impl Track {
    /// Start a new open track from a single detection.
    pub fn new(id: TrackId, first: Detection) -> Self {
        Self {
            id,
            state: TrackState::Open,
            detections: vec![first],
            links: Vec::new(),
        }
    }

    /// Build a track from an already ordered chain, e.g. a ground-truth prefix.
    ///
    /// Returns `None` if the chain is empty or frames do not strictly increase.
    pub fn from_chain(id: TrackId, detections: Vec<Detection>) -> Option<Self> {
        let mut iter = detections.into_iter();
        let mut track = Track::new(id, iter.next()?);
        for det in iter {
            let last = track.last();
            if det.frame_idx <= last.frame_idx {
                return None;
            }
            let gap = det.frame_idx - last.frame_idx - 1;
            let link = if det.cam_id == last.cam_id {
                LinkKind::Temporal { gap }
            } else {
                LinkKind::CameraGap { gap }
            };
            track.detections.push(det);
            track.links.push(link);
        }
        Some(track)
    }

    /// Most recent detection.
    pub fn last(&self) -> &Detection {
        // never empty: constructed from at least one detection
        &self.detections[self.detections.len() - 1]
    }

    pub fn first(&self) -> &Detection {
        &self.detections[0]
    }

    /// The detection before the most recent one, if any.
    pub fn previous(&self) -> Option<&Detection> {
        self.detections.iter().rev().nth(1)
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn links(&self) -> &[LinkKind] {
        &self.links
    }

    pub fn keys(&self) -> impl Iterator<Item = DetectionKey> + '_ {
        self.detections.iter().map(|d| d.key)
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn start_frame(&self) -> FrameIdx {
        self.first().frame_idx
    }

    pub fn end_frame(&self) -> FrameIdx {
        self.last().frame_idx
    }

    pub fn last_camera(&self) -> CameraId {
        self.last().cam_id
    }

    pub fn is_open(&self) -> bool {
        self.state == TrackState::Open
    }

    /// Extend with a detection of a later frame.
    pub(crate) fn append(&mut self, detection: Detection, link: LinkKind) {
        debug_assert!(detection.frame_idx > self.end_frame());
        self.detections.push(detection);
        self.links.push(link);
    }

    pub(crate) fn close(&mut self) {
        self.state = TrackState::Closed;
    }
}
