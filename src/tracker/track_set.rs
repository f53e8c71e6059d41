//! Arena of tracks threaded through a tracking run.

use crate::tracker::detection::{Detection, FrameIdx};
use crate::tracker::track::{Track, TrackId};
use crate::tracker::track_state::LinkKind;

/// All tracks of a run, addressed by their id (the arena index).
///
/// Open tracks are kept in a separate id list in creation order, which is
/// the only structure mutated per frame.
#[derive(Debug, Clone, Default)]
pub struct TrackSet {
    tracks: Vec<Track>,
    open: Vec<TrackId>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new open track and return its id.
    pub fn spawn(&mut self, detection: Detection) -> TrackId {
        let id = self.tracks.len() as TrackId;
        self.tracks.push(Track::new(id, detection));
        self.open.push(id);
        id
    }

    pub(crate) fn extend(&mut self, id: TrackId, detection: Detection, link: LinkKind) {
        self.tracks[id as usize].append(detection, link);
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(id as usize)
    }

    /// Open tracks in ascending id order.
    pub fn open_tracks(&self) -> impl Iterator<Item = &Track> + '_ {
        self.open.iter().map(|&id| &self.tracks[id as usize])
    }

    pub fn num_open(&self) -> usize {
        self.open.len()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Close every open track that can no longer be extended at `frame_idx`
    /// or later, i.e. whose last detection is more than `frame_diff` frames
    /// behind. Returns the number of tracks closed.
    pub fn close_stale(&mut self, frame_idx: FrameIdx, frame_diff: u64) -> usize {
        let tracks = &mut self.tracks;
        let before = self.open.len();
        self.open.retain(|&id| {
            let track = &mut tracks[id as usize];
            if frame_idx.saturating_sub(track.end_frame()) > frame_diff {
                track.close();
                false
            } else {
                true
            }
        });
        before - self.open.len()
    }

    /// Close all remaining tracks and hand out every track in id order.
    pub fn into_tracks(mut self) -> Vec<Track> {
        for id in self.open.drain(..) {
            self.tracks[id as usize].close();
        }
        self.tracks
    }

    /// Every track in id order, leaving open tracks open.
    pub fn into_tracks_keep_open(self) -> Vec<Track> {
        self.tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::track_state::TrackState;
    use ndarray::array;

    fn det(key: u64, frame_idx: FrameIdx) -> Detection {
        Detection::new(key, frame_idx, 0, 0.0, 0.0, 0.0, array![0.5])
    }

    #[test]
    fn test_spawn_assigns_dense_ids() {
        let mut set = TrackSet::new();
        assert_eq!(set.spawn(det(10, 0)), 0);
        assert_eq!(set.spawn(det(11, 0)), 1);
        assert_eq!(set.num_open(), 2);
    }

    #[test]
    fn test_close_stale() {
        let mut set = TrackSet::new();
        let a = set.spawn(det(1, 0));
        let b = set.spawn(det(2, 1));
        set.extend(b, det(3, 2), LinkKind::Temporal { gap: 0 });

        // frame_diff = 2: track a (last frame 0) may still link into frame 2
        assert_eq!(set.close_stale(2, 2), 0);
        assert_eq!(set.close_stale(3, 2), 1);
        assert_eq!(set.get(a).map(|t| t.state), Some(TrackState::Closed));
        assert_eq!(set.open_tracks().map(|t| t.id).collect::<Vec<_>>(), vec![b]);

        let tracks = set.into_tracks();
        assert!(tracks.iter().all(|t| t.state == TrackState::Closed));
        assert_eq!(tracks[1].len(), 2);
    }
}
