//! Pairwise feature primitives between track tails and candidate detections.
//!
//! Every feature maps M tracks and N candidates to an M x N matrix of
//! non-negative values and has no side effects.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};
use crate::tracker::{Detection, Track};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub type FeatureFn = dyn Fn(&[&Track], &[&Detection]) -> Array2<f64> + Send + Sync;

/// Rotational symmetry of the tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Symmetry {
    /// Distinguishable front and back, period 2π
    Full,
    /// Indistinguishable front and back, period π
    Half,
}

impl Symmetry {
    pub fn period(&self) -> f64 {
        match self {
            Symmetry::Full => 2.0 * PI,
            Symmetry::Half => PI,
        }
    }
}

fn pairwise<F>(tracks: &[&Track], detections: &[&Detection], f: F) -> Array2<f64>
where
    F: Fn(&Track, &Detection) -> f64,
{
    Array2::from_shape_fn((tracks.len(), detections.len()), |(i, j)| {
        f(tracks[i], detections[j])
    })
}

/// Euclidean distance between the track's last position and the candidate.
pub fn distance(tracks: &[&Track], detections: &[&Detection]) -> Array2<f64> {
    pairwise(tracks, detections, |t, d| t.last().distance(d))
}

/// Smallest absolute angle between two orientations, in `[0, period / 2]`.
pub fn angle_difference(a: f64, b: f64, symmetry: Symmetry) -> f64 {
    let period = symmetry.period();
    let diff = (a - b).rem_euclid(period);
    diff.min(period - diff)
}

pub fn orientation_distance(
    tracks: &[&Track],
    detections: &[&Detection],
    symmetry: Symmetry,
) -> Array2<f64> {
    pairwise(tracks, detections, |t, d| {
        angle_difference(t.last().orientation, d.orientation, symmetry)
    })
}

/// Mean absolute difference of the identity descriptors.
///
/// With per-bit probabilities this is the expected fraction of differing
/// bits; empty descriptors compare as identical.
pub fn id_distance(tracks: &[&Track], detections: &[&Detection]) -> Array2<f64> {
    pairwise(tracks, detections, |t, d| {
        let a = &t.last().descriptor;
        let b = &d.descriptor;
        if a.is_empty() || a.len() != b.len() {
            return if a.len() == b.len() { 0.0 } else { 1.0 };
        }
        (a - b).mapv(f64::abs).mean().unwrap_or(0.0)
    })
}

/// Number of skipped frames between the track's last detection and the candidate.
pub fn frame_gap(tracks: &[&Track], detections: &[&Detection]) -> Array2<f64> {
    pairwise(tracks, detections, |t, d| {
        d.frame_idx.saturating_sub(t.end_frame()).saturating_sub(1) as f64
    })
}

/// Distance from a constant-velocity extrapolation of the track to the candidate.
pub fn predicted_distance(tracks: &[&Track], detections: &[&Detection]) -> Array2<f64> {
    pairwise(tracks, detections, |t, d| {
        let last = t.last();
        let Some(prev) = t.previous() else {
            return last.distance(d);
        };
        let dt = (last.frame_idx - prev.frame_idx) as f64;
        let ahead = d.frame_idx.saturating_sub(last.frame_idx) as f64;
        let velocity = (last.position - prev.position) / dt;
        let predicted = last.position + velocity * ahead;
        nalgebra::distance(&predicted, &d.position)
    })
}

/// A named pairwise feature.
#[derive(Clone)]
pub struct Feature {
    name: String,
    func: Arc<FeatureFn>,
}

impl Feature {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[&Track], &[&Detection]) -> Array2<f64> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn distance() -> Self {
        Self::new("distance", distance)
    }

    pub fn orientation(symmetry: Symmetry) -> Self {
        Self::new("orientation_distance", move |t: &[&Track], d: &[&Detection]| {
            orientation_distance(t, d, symmetry)
        })
    }

    pub fn id_distance() -> Self {
        Self::new("id_distance", id_distance)
    }

    pub fn frame_gap() -> Self {
        Self::new("frame_gap", frame_gap)
    }

    pub fn predicted_distance() -> Self {
        Self::new("predicted_distance", predicted_distance)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate and check the result has shape (tracks, detections).
    pub fn compute(&self, tracks: &[&Track], detections: &[&Detection]) -> Result<Array2<f64>> {
        let values = (self.func)(tracks, detections);
        let expected = (tracks.len(), detections.len());
        if values.dim() != expected {
            return Err(TrackingError::FeatureShape {
                feature: self.name.clone(),
                expected,
                got: values.dim(),
            });
        }
        Ok(values)
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature").field("name", &self.name).finish()
    }
}

/// Ordered list of features.
///
/// The order is the column order of the fused feature vector and must match
/// the order a classifier was trained with.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    features: Vec<Feature>,
}

impl FeatureSet {
    pub fn new(features: Vec<Feature>) -> Result<Self> {
        if features.is_empty() {
            return Err(TrackingError::InvalidConfig(
                "feature set must not be empty".to_string(),
            ));
        }
        for (i, feature) in features.iter().enumerate() {
            if features[..i].iter().any(|f| f.name == feature.name) {
                return Err(TrackingError::InvalidConfig(format!(
                    "duplicate feature name `{}`",
                    feature.name
                )));
            }
        }
        Ok(Self { features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    /// One matrix per feature, in feature order.
    pub fn compute(&self, tracks: &[&Track], detections: &[&Detection]) -> Result<Vec<Array2<f64>>> {
        #[cfg(feature = "parallel")]
        {
            self.features
                .par_iter()
                .map(|f| f.compute(tracks, detections))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.features
                .iter()
                .map(|f| f.compute(tracks, detections))
                .collect()
        }
    }

    /// Fused design matrix of shape (M * N, F); row `i * N + j` holds the
    /// feature vector of pair (i, j).
    pub fn design_matrix(&self, tracks: &[&Track], detections: &[&Detection]) -> Result<Array2<f64>> {
        let matrices = self.compute(tracks, detections)?;
        let n = detections.len();
        Ok(Array2::from_shape_fn(
            (tracks.len() * n, matrices.len()),
            |(p, k)| matrices[k][[p / n, p % n]],
        ))
    }
}
