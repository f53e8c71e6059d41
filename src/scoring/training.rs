//! Building labelled pair samples from ground truth and fitting a classifier.

use std::sync::Arc;

use ndarray::{Array1, Array2};
use tracing::{debug, info};

use crate::error::{Result, TrackingError};
use crate::scoring::classifier::{Classifier, LogisticRegression, LogisticRegressionConfig};
use crate::scoring::features::{Feature, FeatureSet, Symmetry};
use crate::scoring::scorer::ClassifierScorer;
use crate::tracker::{Detection, DetectionStore, LinkKind, Track};
use crate::validation::GroundTruth;

/// Frame difference used by [`make_detection_score_fun`].
pub const PRESET_FRAME_DIFF: u64 = 1;
/// Training radius used by [`make_detection_score_fun`], in position units.
pub const PRESET_RADIUS: f64 = 110.0;

/// Pipeline detections together with their merged ground truth.
#[derive(Debug, Clone, Copy)]
pub struct TrainingData<'a> {
    pub store: &'a DetectionStore,
    pub truth: &'a GroundTruth,
}

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub feature_names: Vec<String>,
    pub n_samples: usize,
    pub n_positive: usize,
    pub n_negative: usize,
    /// Ground-truth continuations used as positives
    pub n_transitions: usize,
    /// Continuations skipped: beyond `frame_diff` or outside the radius
    pub n_skipped: usize,
    /// Training-set metrics at a 0.5 decision threshold
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

struct Samples {
    rows: Vec<f64>,
    labels: Vec<bool>,
    n_transitions: usize,
    n_skipped: usize,
}

fn collect_samples(
    data: &TrainingData<'_>,
    features: &FeatureSet,
    frame_diff: u64,
    radius: f64,
) -> Result<Samples> {
    let mut samples = Samples {
        rows: Vec::new(),
        labels: Vec::new(),
        n_transitions: 0,
        n_skipped: 0,
    };

    for truth_track in data.truth.tracks() {
        let chain: Vec<&Detection> = truth_track
            .keys
            .iter()
            .map(|&key| {
                data.store
                    .get(key)
                    .ok_or_else(|| TrackingError::malformed(key, "ground truth refers to unknown detection"))
            })
            .collect::<Result<_>>()?;
        let Some((first, rest)) = chain.split_first() else {
            continue;
        };

        let mut reference = Track::new(truth_track.id, (*first).clone());
        for &next in rest {
            let tail = reference.last();
            let gap = next.frame_idx - tail.frame_idx - 1;
            let link = if next.cam_id == tail.cam_id {
                LinkKind::Temporal { gap }
            } else {
                LinkKind::CameraGap { gap }
            };

            if gap < frame_diff && tail.distance(next) < radius {
                let candidates: Vec<&Detection> = data
                    .store
                    .frame(next.frame_idx)
                    .iter()
                    .filter(|c| tail.distance(c) < radius)
                    .collect();
                let x = features.design_matrix(&[&reference], &candidates)?;
                samples.rows.extend(x.iter().copied());
                samples
                    .labels
                    .extend(candidates.iter().map(|c| c.key == next.key));
                samples.n_transitions += 1;
            } else {
                samples.n_skipped += 1;
            }
            reference.append(next.clone(), link);
        }
    }

    Ok(samples)
}

/// Fit `classifier` on pair samples drawn from ground truth.
///
/// For every ground-truth continuation spanning at most `frame_diff` frames,
/// the candidates are all detections of the target frame closer than `radius` to
/// the reference's last detection; the true continuation is the positive,
/// the rest are negatives. Returns the fitted classifier, a report, and a
/// scorer applying the classifier to the same feature set.
pub fn train<C>(
    mut classifier: C,
    data: &TrainingData<'_>,
    features: FeatureSet,
    frame_diff: u64,
    radius: f64,
    verbose: bool,
) -> Result<(C, TrainingReport, ClassifierScorer<C>)>
where
    C: Classifier + Clone,
{
    if frame_diff == 0 {
        return Err(TrackingError::InvalidConfig(
            "frame_diff must be at least 1".to_string(),
        ));
    }
    if !(radius > 0.0) {
        return Err(TrackingError::InvalidConfig(format!(
            "training radius must be positive, got {radius}"
        )));
    }

    let samples = collect_samples(data, &features, frame_diff, radius)?;
    if samples.n_transitions == 0 {
        return Err(TrackingError::InsufficientData(format!(
            "no ground-truth continuation within {frame_diff} frames and radius {radius} \
             ({} skipped)",
            samples.n_skipped
        )));
    }

    let n_samples = samples.labels.len();
    let x = Array2::from_shape_vec((n_samples, features.len()), samples.rows).map_err(|_| {
        TrackingError::FeatureShape {
            feature: features.names().join(","),
            expected: (n_samples, features.len()),
            got: (0, 0),
        }
    })?;
    let y = Array1::from_vec(samples.labels);
    let n_positive = y.iter().filter(|&&label| label).count();

    if verbose {
        info!(
            samples = n_samples,
            positive = n_positive,
            transitions = samples.n_transitions,
            skipped = samples.n_skipped,
            "fitting classifier"
        );
    } else {
        debug!(
            samples = n_samples,
            positive = n_positive,
            transitions = samples.n_transitions,
            skipped = samples.n_skipped,
            "fitting classifier"
        );
    }

    classifier.fit(&x, &y)?;
    classifier.set_feature_names(features.names())?;
    let proba = classifier.predict_proba(&x)?;

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    let mut correct = 0usize;
    for (&p, &label) in proba.iter().zip(y.iter()) {
        let predicted = p >= 0.5;
        match (predicted, label) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            (false, false) => {}
        }
        if predicted == label {
            correct += 1;
        }
    }
    let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };

    let report = TrainingReport {
        feature_names: features.names(),
        n_samples,
        n_positive,
        n_negative: n_samples - n_positive,
        n_transitions: samples.n_transitions,
        n_skipped: samples.n_skipped,
        accuracy: ratio(correct, n_samples),
        precision: ratio(tp, tp + fp),
        recall: ratio(tp, tp + fn_),
    };

    if verbose {
        info!(
            accuracy = report.accuracy,
            precision = report.precision,
            recall = report.recall,
            "classifier trained"
        );
    }

    let scorer = ClassifierScorer::new(Arc::new(classifier.clone()), features)?;
    Ok((classifier, report, scorer))
}

/// The default feature set: distance, orientation, identity, skipped frames.
pub fn preset_features() -> Result<FeatureSet> {
    FeatureSet::new(vec![
        Feature::distance(),
        Feature::orientation(Symmetry::Full),
        Feature::id_distance(),
        Feature::frame_gap(),
    ])
}

pub fn preset_classifier_config() -> LogisticRegressionConfig {
    LogisticRegressionConfig {
        learning_rate: 0.5,
        max_iter: 1000,
        l2: 1e-3,
        tolerance: 1e-6,
        balanced: true,
    }
}

/// Train the preset feature set and classifier on `data`.
pub fn make_detection_score_fun(
    data: &TrainingData<'_>,
    verbose: bool,
) -> Result<(ClassifierScorer<LogisticRegression>, TrainingReport)> {
    let classifier = LogisticRegression::new(preset_classifier_config())?;
    let (_, report, scorer) = train(
        classifier,
        data,
        preset_features()?,
        PRESET_FRAME_DIFF,
        PRESET_RADIUS,
        verbose,
    )?;
    Ok((scorer, report))
}
