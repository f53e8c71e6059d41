//! Matching produced tracks against ground truth.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TrackingError};
use crate::tracker::{DetectionKey, FrameIdx, Track, TrackId};
use crate::validation::ground_truth::{GroundTruth, TruthId};

/// Which gap closures to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GapCheck {
    /// Length in frames of the temporal gaps to check
    pub gap: u64,
    /// Check gaps at the start of each track
    pub gap_l: bool,
    /// Check gaps at the end of each track
    pub gap_r: bool,
    /// Check camera-boundary gaps spanning at most `gap` skipped frames
    pub cam_gap: bool,
}

/// Match quality of one produced track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationScore {
    pub track_id: TrackId,
    /// Ground-truth track with the most detections in this track
    pub truth_id: Option<TruthId>,
    pub track_span: (FrameIdx, FrameIdx),
    /// Frame span of the matched truth track within the validated range
    pub truth_span: Option<(FrameIdx, FrameIdx)>,
    pub length: usize,
    /// Detections belonging to `truth_id`
    pub matched: usize,
    /// Detections belonging to other truth tracks
    pub inserts: usize,
    /// Detections not confirmed by any truth observation
    pub false_positives: usize,
    /// Observations of `truth_id` inside `track_span` missing from this track
    pub deletes: usize,
    /// Overlaps two or more truth tracks
    pub merge_error: bool,
    /// `truth_id` is covered by two or more produced tracks
    pub fragmented: bool,
    /// Whether the gaps this track should have closed towards its past were closed
    pub gap_left: Option<bool>,
    /// Whether the gaps this track should have closed towards its future were closed
    pub gap_right: Option<bool>,
    pub cam_gap: Option<bool>,
}

impl ValidationScore {
    /// Fraction of the track's detections that belong to its truth track.
    pub fn purity(&self) -> f64 {
        self.matched as f64 / self.length as f64
    }

    pub fn is_clean_match(&self) -> bool {
        self.truth_id.is_some() && !self.merge_error
    }
}

/// Aggregate metrics, plain ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub frame_range: (FrameIdx, FrameIdx),
    pub num_tracks: usize,
    pub num_truth_tracks: usize,
    /// Positives among all produced detections
    pub precision: f64,
    /// Truth observations covered by a produced track
    pub recall: f64,
    pub clean_matches: usize,
    pub merge_errors: usize,
    /// Truth tracks covered by two or more produced tracks
    pub fragmentation_events: usize,
    /// Sum over truth tracks of (covering tracks - 1)
    pub fragment_count: usize,
    pub gaps_checked: usize,
    pub gaps_closed: usize,
    /// `None` when no gap was checked
    pub gap_closure_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub scores: BTreeMap<TrackId, ValidationScore>,
    pub summary: ValidationSummary,
}

#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    truth: &'a GroundTruth,
}

fn and_check(slot: &mut Option<bool>, closed: bool) {
    *slot = Some(slot.unwrap_or(true) && closed);
}

impl<'a> Validator<'a> {
    pub fn new(truth: &'a GroundTruth) -> Self {
        Self { truth }
    }

    /// Score every produced track against ground truth.
    ///
    /// The validated range spans the produced tracks' frames; ground truth
    /// outside it is ignored. Fails with `EmptyGroundTruth` if no truth
    /// observation falls inside the range.
    pub fn validate(&self, tracks: &[Track], check: GapCheck) -> Result<ValidationReport> {
        let first = tracks.iter().map(Track::start_frame).min();
        let last = tracks.iter().map(Track::end_frame).max();
        let (first, last) = match (first, last) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(TrackingError::EmptyGroundTruth(None)),
        };

        let total_truth: usize = self
            .truth
            .tracks()
            .map(|t| t.entries_in(first, last).count())
            .sum();
        if total_truth == 0 {
            return Err(TrackingError::EmptyGroundTruth(Some((first, last))));
        }

        let mut owner: HashMap<DetectionKey, TrackId> = HashMap::new();
        for track in tracks {
            for key in track.keys() {
                owner.insert(key, track.id);
            }
        }

        // truth id -> produced tracks holding at least one of its positives
        let mut coverage: BTreeMap<TruthId, BTreeSet<TrackId>> = BTreeMap::new();
        for (&key, &track_id) in &owner {
            if let Some(truth_id) = self.truth.truth_of(key) {
                coverage.entry(truth_id).or_default().insert(track_id);
            }
        }

        let mut scores = BTreeMap::new();
        let mut produced = 0usize;
        let mut produced_positive = 0usize;
        for track in tracks {
            let score = self.score_track(track, &owner, &coverage);
            produced += score.length;
            produced_positive += score.length - score.false_positives;
            scores.insert(track.id, score);
        }

        let (gaps_checked, gaps_closed) = self.check_gaps(first, last, check, &owner, &mut scores);

        let covered = self
            .truth
            .tracks()
            .flat_map(|t| t.entries_in(first, last))
            .filter(|e| e.key.is_some_and(|k| owner.contains_key(&k)))
            .count();

        let fragmentation_events = coverage.values().filter(|c| c.len() >= 2).count();
        let fragment_count = coverage.values().map(|c| c.len().saturating_sub(1)).sum();
        let summary = ValidationSummary {
            frame_range: (first, last),
            num_tracks: tracks.len(),
            num_truth_tracks: self
                .truth
                .tracks()
                .filter(|t| t.entries_in(first, last).next().is_some())
                .count(),
            precision: produced_positive as f64 / produced as f64,
            recall: covered as f64 / total_truth as f64,
            clean_matches: scores.values().filter(|s| s.is_clean_match()).count(),
            merge_errors: scores.values().filter(|s| s.merge_error).count(),
            fragmentation_events,
            fragment_count,
            gaps_checked,
            gaps_closed,
            gap_closure_rate: (gaps_checked > 0)
                .then(|| gaps_closed as f64 / gaps_checked as f64),
        };

        info!(
            tracks = summary.num_tracks,
            precision = summary.precision,
            recall = summary.recall,
            fragments = summary.fragment_count,
            merges = summary.merge_errors,
            "validation finished"
        );

        Ok(ValidationReport { scores, summary })
    }

    fn score_track(
        &self,
        track: &Track,
        owner: &HashMap<DetectionKey, TrackId>,
        coverage: &BTreeMap<TruthId, BTreeSet<TrackId>>,
    ) -> ValidationScore {
        let mut per_truth: BTreeMap<TruthId, usize> = BTreeMap::new();
        let mut false_positives = 0;
        for key in track.keys() {
            match self.truth.truth_of(key) {
                Some(truth_id) => *per_truth.entry(truth_id).or_default() += 1,
                None => false_positives += 1,
            }
        }

        // most detections wins, lowest id on ties
        let best = per_truth
            .iter()
            .fold(None, |best: Option<(TruthId, usize)>, (&id, &n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((id, n)),
            });

        let track_span = (track.start_frame(), track.end_frame());
        let length = track.len();
        let (truth_id, matched, truth_span, deletes, fragmented) = match best {
            Some((truth_id, matched)) => {
                let truth_track = self.truth.track(truth_id);
                let deletes = truth_track
                    .map(|t| {
                        t.entries_in(track_span.0, track_span.1)
                            .filter(|e| e.key.and_then(|k| owner.get(&k)) != Some(&track.id))
                            .count()
                    })
                    .unwrap_or(0);
                let truth_span = truth_track.and_then(|t| {
                    let mut frames = t.entries_in(track_span.0, track_span.1).map(|e| e.frame_idx);
                    let first = frames.next()?;
                    Some((first, frames.last().unwrap_or(first)))
                });
                let fragmented = coverage.get(&truth_id).is_some_and(|c| c.len() >= 2);
                (Some(truth_id), matched, truth_span, deletes, fragmented)
            }
            None => (None, 0, None, 0, false),
        };

        ValidationScore {
            track_id: track.id,
            truth_id,
            track_span,
            truth_span,
            length,
            matched,
            inserts: length - matched - false_positives,
            false_positives,
            deletes,
            merge_error: per_truth.len() >= 2,
            fragmented,
            gap_left: None,
            gap_right: None,
            cam_gap: None,
        }
    }

    /// Walk consecutive positives of every truth track and record for each
    /// gap of interest whether both ends ended up in the same produced track.
    fn check_gaps(
        &self,
        first: FrameIdx,
        last: FrameIdx,
        check: GapCheck,
        owner: &HashMap<DetectionKey, TrackId>,
        scores: &mut BTreeMap<TrackId, ValidationScore>,
    ) -> (usize, usize) {
        let mut checked = 0;
        let mut closed_count = 0;

        for truth_track in self.truth.tracks() {
            let positives: Vec<_> = truth_track
                .entries_in(first, last)
                .filter_map(|e| e.key.map(|k| (e, k)))
                .collect();

            for pair in positives.windows(2) {
                let (a, key_a) = pair[0];
                let (b, key_b) = pair[1];
                let skipped = b.frame_idx - a.frame_idx - 1;
                let left_owner = owner.get(&key_a).copied();
                let right_owner = owner.get(&key_b).copied();
                let closed = left_owner.is_some() && left_owner == right_owner;

                if a.cam_id == b.cam_id {
                    if skipped != check.gap || !(check.gap_l || check.gap_r) {
                        continue;
                    }
                    if check.gap_l {
                        if let Some(score) = right_owner.and_then(|id| scores.get_mut(&id)) {
                            and_check(&mut score.gap_left, closed);
                        }
                    }
                    if check.gap_r {
                        if let Some(score) = left_owner.and_then(|id| scores.get_mut(&id)) {
                            and_check(&mut score.gap_right, closed);
                        }
                    }
                } else {
                    if !check.cam_gap || skipped > check.gap {
                        continue;
                    }
                    for id in [left_owner, right_owner].into_iter().flatten() {
                        if let Some(score) = scores.get_mut(&id) {
                            and_check(&mut score.cam_gap, closed);
                        }
                    }
                }

                checked += 1;
                if closed {
                    closed_count += 1;
                }
                debug!(
                    truth_id = truth_track.id,
                    from = a.frame_idx,
                    to = b.frame_idx,
                    closed,
                    "gap checked"
                );
            }
        }

        (checked, closed_count)
    }
}
