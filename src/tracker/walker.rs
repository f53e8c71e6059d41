//! Frame-by-frame track linking.

use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TrackingError};
use crate::scoring::Scorer;
use crate::tracker::camera::CameraAdjacency;
use crate::tracker::detection::{Detection, FrameIdx};
use crate::tracker::matching::{self, AssignmentResult, AssignmentStrategy, CameraRule};
use crate::tracker::store::DetectionStore;
use crate::tracker::track::{Track, TrackId};
use crate::tracker::track_set::TrackSet;
use crate::tracker::track_state::LinkKind;

/// Configuration for the [`Walker`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkerConfig {
    /// Largest frame difference a link may span; `frame_diff - 1` frames may be skipped
    pub frame_diff: u64,
    /// Candidates must lie strictly closer than this to a track's last position;
    /// zero disables linking
    pub tracking_radius: f64,
    /// A pair is only linked if its score is strictly above this
    pub threshold: f64,
    pub assignment: AssignmentStrategy,
    /// Attempt links into cameras adjacent to a track's last camera
    pub cam_gap: bool,
    pub adjacency: CameraAdjacency,
}

impl WalkerConfig {
    /// Same-camera linking with greedy assignment.
    pub fn new(frame_diff: u64, tracking_radius: f64, threshold: f64) -> Result<Self> {
        let config = Self {
            frame_diff,
            tracking_radius,
            threshold,
            assignment: AssignmentStrategy::Greedy,
            cam_gap: false,
            adjacency: CameraAdjacency::new(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_assignment(mut self, assignment: AssignmentStrategy) -> Self {
        self.assignment = assignment;
        self
    }

    /// Enable camera-gap links between the given adjacent cameras.
    pub fn with_camera_gap(mut self, adjacency: CameraAdjacency) -> Self {
        self.cam_gap = true;
        self.adjacency = adjacency;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_diff == 0 {
            return Err(TrackingError::InvalidConfig(
                "frame_diff must be at least 1".to_string(),
            ));
        }
        if !(self.tracking_radius >= 0.0) || self.tracking_radius.is_infinite() {
            return Err(TrackingError::InvalidConfig(format!(
                "tracking_radius must be finite and non-negative, got {}",
                self.tracking_radius
            )));
        }
        if self.threshold.is_nan() {
            return Err(TrackingError::InvalidConfig(
                "threshold must be a number".to_string(),
            ));
        }
        if self.cam_gap && self.adjacency.is_empty() {
            return Err(TrackingError::InvalidConfig(
                "cam_gap enabled without any adjacent cameras".to_string(),
            ));
        }
        Ok(())
    }
}

/// Links the detections of a [`DetectionStore`] into tracks.
///
/// Frames are processed in increasing order. For each frame, open tracks
/// whose last detection is exactly `gap + 1` frames back are matched against
/// the still unclaimed detections, for `gap = 0, 1, .., frame_diff - 1`;
/// camera-gap passes follow in the same order. Unclaimed detections start new
/// tracks and tracks more than `frame_diff` frames behind are closed.
pub struct Walker<'a, S: Scorer + ?Sized> {
    store: &'a DetectionStore,
    scorer: &'a S,
    config: WalkerConfig,
}

#[derive(Debug, Default)]
struct FrameStats {
    linked: usize,
    camera_links: usize,
}

impl<'a, S: Scorer + ?Sized> Walker<'a, S> {
    pub fn new(store: &'a DetectionStore, scorer: &'a S, config: WalkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            scorer,
            config,
        })
    }

    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }

    /// Process every frame and return all tracks in id order, all closed.
    pub fn calc_tracks(&self) -> Result<Vec<Track>> {
        let set = self.walk(|_| false)?;
        Ok(set.into_tracks())
    }

    /// Like [`Walker::calc_tracks`], but `stop` is asked before each frame
    /// and ends the run early when it returns `true`.
    ///
    /// Tracks that could still be extended stay open in the result.
    pub fn calc_tracks_until<F>(&self, stop: F) -> Result<Vec<Track>>
    where
        F: FnMut(FrameIdx) -> bool,
    {
        let set = self.walk(stop)?;
        Ok(set.into_tracks_keep_open())
    }

    fn walk<F>(&self, mut stop: F) -> Result<TrackSet>
    where
        F: FnMut(FrameIdx) -> bool,
    {
        let mut set = TrackSet::new();
        let mut frames = 0usize;

        for (frame_idx, detections) in self.store.frames() {
            if stop(frame_idx) {
                debug!(frame = frame_idx, "tracking interrupted");
                break;
            }
            let closed = set.close_stale(frame_idx, self.config.frame_diff);
            let mut claimed = vec![false; detections.len()];
            let mut stats = FrameStats::default();

            for gap in 0..self.config.frame_diff {
                stats.linked += self.link_pass(
                    &mut set,
                    frame_idx,
                    detections,
                    &mut claimed,
                    gap,
                    CameraRule::SameCamera,
                )?;
            }
            if self.config.cam_gap {
                for gap in 0..self.config.frame_diff {
                    stats.camera_links += self.link_pass(
                        &mut set,
                        frame_idx,
                        detections,
                        &mut claimed,
                        gap,
                        CameraRule::Adjacent(&self.config.adjacency),
                    )?;
                }
            }

            let mut spawned = 0;
            for (det, _) in detections.iter().zip(&claimed).filter(|(_, c)| !**c) {
                set.spawn(det.clone());
                spawned += 1;
            }
            frames += 1;

            debug!(
                frame = frame_idx,
                detections = detections.len(),
                linked = stats.linked,
                camera_links = stats.camera_links,
                spawned,
                closed,
                open = set.num_open(),
                "frame processed"
            );
        }

        info!(
            frames,
            tracks = set.len(),
            detections = self.store.len(),
            "tracking finished"
        );
        Ok(set)
    }

    /// Match open tracks ending `gap + 1` frames before `frame_idx` against
    /// the unclaimed detections of that frame. Returns the number of links.
    fn link_pass(
        &self,
        set: &mut TrackSet,
        frame_idx: FrameIdx,
        detections: &[Detection],
        claimed: &mut [bool],
        gap: u64,
        rule: CameraRule<'_>,
    ) -> Result<usize> {
        let links: Vec<(TrackId, usize)> = {
            let tracks: Vec<&Track> = set
                .open_tracks()
                .filter(|t| t.end_frame() + 1 + gap == frame_idx)
                .collect();
            let cols: Vec<usize> = (0..detections.len()).filter(|&j| !claimed[j]).collect();
            if tracks.is_empty() || cols.is_empty() {
                return Ok(0);
            }
            let candidates: Vec<&Detection> = cols.iter().map(|&j| &detections[j]).collect();

            let mask = matching::eligibility_mask(
                &tracks,
                &candidates,
                self.config.tracking_radius,
                rule,
            );

            // only pairs passing the radius filter are ever scored
            let rows: Vec<usize> = (0..tracks.len())
                .filter(|&i| mask.row(i).iter().any(|&e| e))
                .collect();
            let used_cols: Vec<usize> = (0..candidates.len())
                .filter(|&j| mask.column(j).iter().any(|&e| e))
                .collect();
            if rows.is_empty() {
                return Ok(0);
            }

            let sub_tracks: Vec<&Track> = rows.iter().map(|&i| tracks[i]).collect();
            let sub_candidates: Vec<&Detection> =
                used_cols.iter().map(|&j| candidates[j]).collect();
            let sub_mask = mask
                .select(Axis(0), &rows)
                .select(Axis(1), &used_cols);

            let scores = self.scorer.score(&sub_tracks, &sub_candidates)?;
            let AssignmentResult { matches, .. } = matching::assign(
                self.config.assignment,
                &scores,
                &sub_mask,
                self.config.threshold,
            );

            matches
                .into_iter()
                .map(|(i, j)| (sub_tracks[i].id, cols[used_cols[j]]))
                .collect()
        };

        let link = match rule {
            CameraRule::SameCamera => LinkKind::Temporal { gap },
            CameraRule::Adjacent(_) => LinkKind::CameraGap { gap },
        };
        for &(track_id, j) in &links {
            set.extend(track_id, detections[j].clone(), link);
            claimed[j] = true;
        }
        Ok(links.len())
    }
}
