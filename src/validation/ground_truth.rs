//! Merging ground-truth annotations with pipeline detections.

use std::collections::{BTreeMap, HashMap, HashSet};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TrackingError};
use crate::tracker::{CameraId, DetectionKey, DetectionStore, FrameIdx};

pub type TruthId = u64;

/// One annotated observation of a ground-truth object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruthDetection {
    pub truth_id: TruthId,
    pub frame_idx: FrameIdx,
    pub cam_id: CameraId,
    pub position: Point2<f64>,
}

impl TruthDetection {
    pub fn new(truth_id: TruthId, frame_idx: FrameIdx, cam_id: CameraId, x: f64, y: f64) -> Self {
        Self {
            truth_id,
            frame_idx,
            cam_id,
            position: Point2::new(x, y),
        }
    }
}

/// A truth observation and the pipeline detection confirming it, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthEntry {
    pub frame_idx: FrameIdx,
    pub cam_id: CameraId,
    /// `None` when no pipeline detection was within the merge radius
    pub key: Option<DetectionKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthTrack {
    pub id: TruthId,
    /// All observations, ordered by frame
    pub entries: Vec<TruthEntry>,
    /// Keys of the positives, ordered by frame
    pub keys: Vec<DetectionKey>,
}

impl GroundTruthTrack {
    /// Entries within the inclusive frame range.
    pub fn entries_in(&self, first: FrameIdx, last: FrameIdx) -> impl Iterator<Item = &TruthEntry> + '_ {
        self.entries
            .iter()
            .filter(move |e| e.frame_idx >= first && e.frame_idx <= last)
    }
}

/// Ground-truth tracks expressed in pipeline detection keys.
///
/// A positive is a pipeline detection confirmed by a truth observation in the
/// same frame and camera within the merge radius; every other pipeline
/// detection is a false positive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruth {
    tracks: BTreeMap<TruthId, GroundTruthTrack>,
    positives: HashMap<DetectionKey, TruthId>,
    false_positives: Vec<DetectionKey>,
}

impl GroundTruth {
    /// Match every truth observation to the nearest unclaimed pipeline
    /// detection of the same frame and camera within `merge_radius`.
    ///
    /// Pairs are claimed in order of increasing distance, ties broken by
    /// truth id and then detection key.
    pub fn merge<I>(store: &DetectionStore, truth: I, merge_radius: f64) -> Result<Self>
    where
        I: IntoIterator<Item = TruthDetection>,
    {
        if !(merge_radius > 0.0) {
            return Err(TrackingError::InvalidConfig(format!(
                "merge_radius must be positive, got {merge_radius}"
            )));
        }

        let mut by_frame: BTreeMap<(FrameIdx, CameraId), Vec<TruthDetection>> = BTreeMap::new();
        let mut seen: HashSet<(TruthId, FrameIdx)> = HashSet::new();
        for t in truth {
            if !t.position.x.is_finite() || !t.position.y.is_finite() {
                return Err(TrackingError::MalformedGroundTruth {
                    truth_id: t.truth_id,
                    reason: format!("missing position in frame {}", t.frame_idx),
                });
            }
            if !seen.insert((t.truth_id, t.frame_idx)) {
                return Err(TrackingError::MalformedGroundTruth {
                    truth_id: t.truth_id,
                    reason: format!("observed twice in frame {}", t.frame_idx),
                });
            }
            by_frame.entry((t.frame_idx, t.cam_id)).or_default().push(t);
        }

        let mut positives = HashMap::new();
        let mut tracks: BTreeMap<TruthId, GroundTruthTrack> = BTreeMap::new();

        for ((frame_idx, cam_id), truths) in &by_frame {
            let candidates: Vec<_> = store
                .frame(*frame_idx)
                .iter()
                .filter(|d| d.cam_id == *cam_id)
                .collect();

            let mut pairs = Vec::new();
            for (ti, t) in truths.iter().enumerate() {
                for (di, d) in candidates.iter().enumerate() {
                    let dist = nalgebra::distance(&t.position, &d.position);
                    if dist <= merge_radius {
                        pairs.push((dist, t.truth_id, d.key, ti, di));
                    }
                }
            }
            pairs.sort_by(|a, b| {
                a.0.total_cmp(&b.0)
                    .then_with(|| a.1.cmp(&b.1))
                    .then_with(|| a.2.cmp(&b.2))
            });

            let mut truth_match: Vec<Option<DetectionKey>> = vec![None; truths.len()];
            let mut claimed = vec![false; candidates.len()];
            for (_, _, key, ti, di) in pairs {
                if truth_match[ti].is_none() && !claimed[di] {
                    truth_match[ti] = Some(key);
                    claimed[di] = true;
                }
            }

            for (t, key) in truths.iter().zip(truth_match) {
                if let Some(key) = key {
                    positives.insert(key, t.truth_id);
                }
                tracks
                    .entry(t.truth_id)
                    .or_insert_with(|| GroundTruthTrack {
                        id: t.truth_id,
                        entries: Vec::new(),
                        keys: Vec::new(),
                    })
                    .entries
                    .push(TruthEntry {
                        frame_idx: *frame_idx,
                        cam_id: *cam_id,
                        key,
                    });
            }
        }

        for track in tracks.values_mut() {
            track.entries.sort_by_key(|e| e.frame_idx);
            track.keys = track.entries.iter().filter_map(|e| e.key).collect();
        }

        let false_positives: Vec<DetectionKey> = store
            .iter()
            .map(|d| d.key)
            .filter(|key| !positives.contains_key(key))
            .collect();

        debug!(
            truth_tracks = tracks.len(),
            positives = positives.len(),
            false_positives = false_positives.len(),
            "merged ground truth"
        );

        Ok(Self {
            tracks,
            positives,
            false_positives,
        })
    }

    /// Truth tracks in ascending id order.
    pub fn tracks(&self) -> impl Iterator<Item = &GroundTruthTrack> + '_ {
        self.tracks.values()
    }

    pub fn track(&self, id: TruthId) -> Option<&GroundTruthTrack> {
        self.tracks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Truth track confirmed by this pipeline detection.
    pub fn truth_of(&self, key: DetectionKey) -> Option<TruthId> {
        self.positives.get(&key).copied()
    }

    pub fn is_positive(&self, key: DetectionKey) -> bool {
        self.positives.contains_key(&key)
    }

    pub fn num_positives(&self) -> usize {
        self.positives.len()
    }

    /// Pipeline detections without a truth observation nearby, ordered by
    /// frame and key.
    pub fn false_positives(&self) -> &[DetectionKey] {
        &self.false_positives
    }
}
