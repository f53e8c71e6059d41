//! Matching utilities for track linking.
//!
//! Rows of every matrix are tracks in ascending id order and columns are
//! detections in ascending key order, so index order doubles as the
//! deterministic tie-break.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tracker::camera::CameraAdjacency;
use crate::tracker::detection::Detection;
use crate::tracker::track::Track;

/// How a frame transition's assignment is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssignmentStrategy {
    /// Highest score first; ties go to the lower track id, then the lower
    /// detection key. Never leaves an eligible pair unmatched while a weaker
    /// pair sharing one of its endpoints is matched.
    #[default]
    Greedy,
    /// Maximise the summed score of matched pairs (Jonker-Volgenant).
    Optimal,
}

/// Which camera a candidate detection must be in relative to a track.
#[derive(Debug, Clone, Copy)]
pub enum CameraRule<'a> {
    SameCamera,
    Adjacent(&'a CameraAdjacency),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Hard pre-filter: a pair is eligible only if the candidate lies strictly
/// closer than `radius` to the track's last position and satisfies the
/// camera rule.
pub fn eligibility_mask(
    tracks: &[&Track],
    detections: &[&Detection],
    radius: f64,
    camera: CameraRule<'_>,
) -> Array2<bool> {
    let mut mask = Array2::from_elem((tracks.len(), detections.len()), false);
    for (i, t) in tracks.iter().enumerate() {
        let tail = t.last();
        for (j, d) in detections.iter().enumerate() {
            let camera_ok = match camera {
                CameraRule::SameCamera => tail.cam_id == d.cam_id,
                CameraRule::Adjacent(adjacency) => adjacency.is_adjacent(tail.cam_id, d.cam_id),
            };
            mask[[i, j]] = camera_ok && tail.distance(d) < radius;
        }
    }
    mask
}

fn accepts(score: f64, eligible: bool, thresh: f64) -> bool {
    eligible && score.is_finite() && score > thresh
}

pub fn assign(
    strategy: AssignmentStrategy,
    scores: &Array2<f64>,
    eligible: &Array2<bool>,
    thresh: f64,
) -> AssignmentResult {
    match strategy {
        AssignmentStrategy::Greedy => greedy_assignment(scores, eligible, thresh),
        AssignmentStrategy::Optimal => linear_assignment(scores, eligible, thresh),
    }
}

pub fn greedy_assignment(
    scores: &Array2<f64>,
    eligible: &Array2<bool>,
    thresh: f64,
) -> AssignmentResult {
    let (num_rows, num_cols) = scores.dim();

    let mut candidates: Vec<(f64, usize, usize)> = scores
        .indexed_iter()
        .filter(|&((i, j), &s)| accepts(s, eligible[[i, j]], thresh))
        .map(|((i, j), &s)| (s, i, j))
        .collect();
    candidates.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });

    let mut row_free = vec![true; num_rows];
    let mut col_free = vec![true; num_cols];
    let mut matches = Vec::new();
    for (_, i, j) in candidates {
        if row_free[i] && col_free[j] {
            row_free[i] = false;
            col_free[j] = false;
            matches.push((i, j));
        }
    }
    matches.sort_unstable();

    finish(matches, &row_free, &col_free)
}

/// Optimal assignment over the eligible pairs.
///
/// Each accepted pair is weighted by its margin over the acceptance floor,
/// which is positive for every accepted pair whatever the sign of the raw
/// score. Every row and column gets a dummy partner so that leaving it
/// unmatched is allowed; with matched pairs costing `c - w` and each dummy
/// `c / 2`, the total cost is `(rows + cols) * c / 2 - sum(w)`, so minimising
/// cost maximises the summed margin.
pub fn linear_assignment(
    scores: &Array2<f64>,
    eligible: &Array2<bool>,
    thresh: f64,
) -> AssignmentResult {
    let (num_rows, num_cols) = scores.dim();

    if num_rows == 0 || num_cols == 0 {
        return finish(vec![], &vec![true; num_rows], &vec![true; num_cols]);
    }

    let accepted: Vec<f64> = scores
        .indexed_iter()
        .filter(|&((i, j), &s)| accepts(s, eligible[[i, j]], thresh))
        .map(|(_, &s)| s)
        .collect();
    if accepted.is_empty() {
        return finish(vec![], &vec![true; num_rows], &vec![true; num_cols]);
    }
    let lowest = accepted.iter().copied().fold(f64::INFINITY, f64::min);
    let highest = accepted.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    // an infinite threshold gives no usable floor, fall back to just below
    // the weakest accepted score
    let floor = if thresh.is_finite() {
        thresh
    } else {
        lowest - 1.0
    };
    let weight = |s: f64| s - floor;

    let c = weight(highest) + 1.0;
    let size = num_rows + num_cols;
    let forbidden = 4.0 * c * size as f64;
    let mut padded = Array2::<f64>::from_elem((size, size), forbidden);

    for i in 0..num_rows {
        for j in 0..num_cols {
            if accepts(scores[[i, j]], eligible[[i, j]], thresh) {
                padded[[i, j]] = c - weight(scores[[i, j]]);
            }
        }
        padded[[i, num_cols + i]] = c / 2.0;
    }
    for j in 0..num_cols {
        padded[[num_rows + j, j]] = c / 2.0;
        for k in 0..num_rows {
            padded[[num_rows + j, num_cols + k]] = 0.0;
        }
    }

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            let mut row_free = vec![true; num_rows];
            let mut col_free = vec![true; num_cols];
            let mut matches = vec![];
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols
                    && accepts(scores[[row_idx, col_idx]], eligible[[row_idx, col_idx]], thresh)
                {
                    matches.push((row_idx, col_idx));
                    row_free[row_idx] = false;
                    col_free[col_idx] = false;
                }
            }
            finish(matches, &row_free, &col_free)
        }
        Err(_) => {
            warn!(rows = num_rows, cols = num_cols, "optimal assignment failed, resolving greedily");
            greedy_assignment(scores, eligible, thresh)
        }
    }
}

fn finish(matches: Vec<(usize, usize)>, row_free: &[bool], col_free: &[bool]) -> AssignmentResult {
    let free = |mask: &[bool]| -> Vec<usize> {
        mask.iter()
            .enumerate()
            .filter_map(|(i, &u)| if u { Some(i) } else { None })
            .collect()
    };
    AssignmentResult {
        matches,
        unmatched_tracks: free(row_free),
        unmatched_detections: free(col_free),
    }
}
