//! In-memory snapshot of detections grouped by frame.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, TrackingError};
use crate::tracker::detection::{Detection, DetectionKey, FrameIdx};

/// Detections ordered by frame index and, within a frame, by key.
#[derive(Debug, Clone, Default)]
pub struct DetectionStore {
    frames: BTreeMap<FrameIdx, Vec<Detection>>,
    index: HashMap<DetectionKey, (FrameIdx, usize)>,
    descriptor_len: Option<usize>,
}

impl DetectionStore {
    /// Build a store, validating every detection.
    ///
    /// Fails on the first malformed detection, a duplicate key, or a
    /// descriptor whose length differs from the ones seen before.
    pub fn from_detections<I>(detections: I) -> Result<Self>
    where
        I: IntoIterator<Item = Detection>,
    {
        let mut frames: BTreeMap<FrameIdx, Vec<Detection>> = BTreeMap::new();
        let mut descriptor_len = None;
        let mut seen = HashMap::new();

        for det in detections {
            det.validate()?;
            match descriptor_len {
                None => descriptor_len = Some(det.descriptor.len()),
                Some(len) if len != det.descriptor.len() => {
                    return Err(TrackingError::malformed(
                        det.key,
                        format!(
                            "descriptor length {} differs from {}",
                            det.descriptor.len(),
                            len
                        ),
                    ));
                }
                Some(_) => {}
            }
            if seen.insert(det.key, det.frame_idx).is_some() {
                return Err(TrackingError::malformed(det.key, "duplicate key"));
            }
            frames.entry(det.frame_idx).or_default().push(det);
        }

        let mut index = HashMap::with_capacity(seen.len());
        for (frame_idx, dets) in frames.iter_mut() {
            dets.sort_by_key(|d| d.key);
            for (pos, det) in dets.iter().enumerate() {
                index.insert(det.key, (*frame_idx, pos));
            }
        }

        Ok(Self {
            frames,
            index,
            descriptor_len,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn descriptor_len(&self) -> Option<usize> {
        self.descriptor_len
    }

    /// Frame indices in increasing order.
    pub fn frame_indices(&self) -> impl Iterator<Item = FrameIdx> + '_ {
        self.frames.keys().copied()
    }

    /// Detections of one frame, ordered by key. Empty for unknown frames.
    pub fn frame(&self, frame_idx: FrameIdx) -> &[Detection] {
        self.frames
            .get(&frame_idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn frames(&self) -> impl Iterator<Item = (FrameIdx, &[Detection])> + '_ {
        self.frames.iter().map(|(f, d)| (*f, d.as_slice()))
    }

    pub fn get(&self, key: DetectionKey) -> Option<&Detection> {
        let (frame_idx, pos) = self.index.get(&key)?;
        self.frames.get(frame_idx).and_then(|d| d.get(*pos))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Detection> + '_ {
        self.frames.values().flatten()
    }

    /// First and last frame index, if any detections exist.
    pub fn frame_range(&self) -> Option<(FrameIdx, FrameIdx)> {
        let first = *self.frames.keys().next()?;
        let last = *self.frames.keys().next_back()?;
        Some((first, last))
    }
}
