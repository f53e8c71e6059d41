//! Binary classifiers fusing pair features into a continuation probability.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};

/// A trainable binary classifier over fused feature vectors.
///
/// Rows of `x` are samples, columns are features in [`FeatureSet`] order.
///
/// [`FeatureSet`]: crate::scoring::FeatureSet
pub trait Classifier: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<bool>) -> Result<()>;

    /// Probability of the positive class for each row of `x`.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Number of features seen during `fit`, `None` before fitting.
    fn n_features(&self) -> Option<usize>;

    /// Record the names of the columns passed to the last `fit`, in column
    /// order. Classifiers that do not keep names ignore them.
    fn set_feature_names(&mut self, _names: Vec<String>) -> Result<()> {
        Ok(())
    }

    /// Column names recorded with [`Classifier::set_feature_names`].
    fn feature_names(&self) -> Option<&[String]> {
        None
    }
}

/// Hyperparameters for [`LogisticRegression`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionConfig {
    pub learning_rate: f64,
    pub max_iter: usize,
    /// L2 penalty on the weights (not the intercept)
    pub l2: f64,
    /// Stop when the largest gradient component falls below this
    pub tolerance: f64,
    /// Weight classes inversely to their frequency
    pub balanced: bool,
}

impl LogisticRegressionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(TrackingError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_iter == 0 {
            return Err(TrackingError::InvalidConfig(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if !(self.l2 >= 0.0) || !(self.tolerance >= 0.0) {
            return Err(TrackingError::InvalidConfig(
                "l2 and tolerance must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawModel")]
struct FittedModel {
    mean: Array1<f64>,
    scale: Array1<f64>,
    weights: Array1<f64>,
    intercept: f64,
    iterations: usize,
    feature_names: Vec<String>,
}

#[derive(Deserialize)]
struct RawModel {
    mean: Array1<f64>,
    scale: Array1<f64>,
    weights: Array1<f64>,
    intercept: f64,
    iterations: usize,
    #[serde(default)]
    feature_names: Vec<String>,
}

impl TryFrom<RawModel> for FittedModel {
    type Error = TrackingError;

    fn try_from(raw: RawModel) -> Result<Self> {
        let n = raw.weights.len();
        if raw.mean.len() != n || raw.scale.len() != n {
            return Err(TrackingError::FeatureShape {
                feature: "stored model".to_string(),
                expected: (n, n),
                got: (raw.mean.len(), raw.scale.len()),
            });
        }
        if !raw.feature_names.is_empty() && raw.feature_names.len() != n {
            return Err(TrackingError::FeatureShape {
                feature: raw.feature_names.join(","),
                expected: (1, n),
                got: (1, raw.feature_names.len()),
            });
        }
        if raw.scale.iter().any(|s| !(*s > 0.0)) {
            return Err(TrackingError::InvalidConfig(
                "stored model has a non-positive feature scale".to_string(),
            ));
        }
        Ok(Self {
            mean: raw.mean,
            scale: raw.scale,
            weights: raw.weights,
            intercept: raw.intercept,
            iterations: raw.iterations,
            feature_names: raw.feature_names,
        })
    }
}

/// Logistic regression on standardised features, fitted by batch gradient
/// descent. Deterministic: the same data always yields the same model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    config: LogisticRegressionConfig,
    model: Option<FittedModel>,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl LogisticRegression {
    pub fn new(config: LogisticRegressionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            model: None,
        })
    }

    pub fn config(&self) -> &LogisticRegressionConfig {
        &self.config
    }

    /// Weights in standardised feature space, if fitted.
    pub fn weights(&self) -> Option<&Array1<f64>> {
        self.model.as_ref().map(|m| &m.weights)
    }

    pub fn iterations(&self) -> Option<usize> {
        self.model.as_ref().map(|m| m.iterations)
    }

    fn standardize(model: &FittedModel, x: &Array2<f64>) -> Array2<f64> {
        (x - &model.mean) / &model.scale
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<bool>) -> Result<()> {
        let (n_samples, n_features) = x.dim();
        if y.len() != n_samples {
            return Err(TrackingError::FeatureShape {
                feature: "labels".to_string(),
                expected: (n_samples, 1),
                got: (y.len(), 1),
            });
        }
        let n_pos = y.iter().filter(|&&label| label).count();
        let n_neg = n_samples - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return Err(TrackingError::InsufficientData(format!(
                "need both classes, got {n_pos} positive and {n_neg} negative samples"
            )));
        }

        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > f64::EPSILON { s } else { 1.0 });
        let xs = (x - &mean) / &scale;

        let targets = y.mapv(|label| if label { 1.0 } else { 0.0 });
        let sample_weight = if self.config.balanced {
            let w_pos = n_samples as f64 / (2.0 * n_pos as f64);
            let w_neg = n_samples as f64 / (2.0 * n_neg as f64);
            y.mapv(|label| if label { w_pos } else { w_neg })
        } else {
            Array1::ones(n_samples)
        };

        let n = n_samples as f64;
        let mut weights = Array1::<f64>::zeros(n_features);
        let mut intercept = 0.0;
        let mut iterations = 0;
        for _ in 0..self.config.max_iter {
            iterations += 1;
            let p = (xs.dot(&weights) + intercept).mapv(sigmoid);
            let err = (p - &targets) * &sample_weight;
            let grad_w = xs.t().dot(&err) / n + &weights * self.config.l2;
            let grad_b = err.sum() / n;

            weights.scaled_add(-self.config.learning_rate, &grad_w);
            intercept -= self.config.learning_rate * grad_b;

            let largest = grad_w
                .iter()
                .fold(grad_b.abs(), |acc, g| acc.max(g.abs()));
            if largest < self.config.tolerance {
                break;
            }
        }

        self.model = Some(FittedModel {
            mean,
            scale,
            weights,
            intercept,
            iterations,
            feature_names: Vec::new(),
        });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let model = self.model.as_ref().ok_or_else(|| {
            TrackingError::InvalidConfig("classifier has not been fitted".to_string())
        })?;
        if x.ncols() != model.weights.len() {
            return Err(TrackingError::FeatureShape {
                feature: "classifier input".to_string(),
                expected: (x.nrows(), model.weights.len()),
                got: x.dim(),
            });
        }
        let xs = Self::standardize(model, x);
        Ok((xs.dot(&model.weights) + model.intercept).mapv(sigmoid))
    }

    fn n_features(&self) -> Option<usize> {
        self.model.as_ref().map(|m| m.weights.len())
    }

    fn set_feature_names(&mut self, names: Vec<String>) -> Result<()> {
        let model = self.model.as_mut().ok_or_else(|| {
            TrackingError::InvalidConfig("classifier has not been fitted".to_string())
        })?;
        if names.len() != model.weights.len() {
            return Err(TrackingError::FeatureShape {
                feature: names.join(","),
                expected: (1, model.weights.len()),
                got: (1, names.len()),
            });
        }
        model.feature_names = names;
        Ok(())
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.model
            .as_ref()
            .filter(|m| !m.feature_names.is_empty())
            .map(|m| m.feature_names.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn config() -> LogisticRegressionConfig {
        LogisticRegressionConfig {
            learning_rate: 0.5,
            max_iter: 2000,
            l2: 1e-4,
            tolerance: 1e-8,
            balanced: true,
        }
    }

    #[test]
    fn test_separates_by_distance() {
        let x = array![[0.5], [1.0], [1.5], [8.0], [9.0], [10.0], [12.0]];
        let y = array![true, true, true, false, false, false, false];
        let mut clf = LogisticRegression::new(config()).unwrap();
        clf.fit(&x, &y).unwrap();

        let p = clf.predict_proba(&array![[0.8], [11.0]]).unwrap();
        assert!(p[0] > 0.9, "near pair scored {}", p[0]);
        assert!(p[1] < 0.1, "far pair scored {}", p[1]);
        assert_eq!(clf.n_features(), Some(1));
    }

    #[test]
    fn test_constant_feature_does_not_break_fit() {
        let x = array![[0.0, 1.0], [1.0, 1.0], [5.0, 1.0], [6.0, 1.0]];
        let y = array![true, true, false, false];
        let mut clf = LogisticRegression::new(config()).unwrap();
        clf.fit(&x, &y).unwrap();
        let p = clf.predict_proba(&x).unwrap();
        assert!(p.iter().all(|v| v.is_finite()));
        assert!(p[0] > p[3]);
    }

    #[test]
    fn test_single_class_is_insufficient() {
        let mut clf = LogisticRegression::new(config()).unwrap();
        let err = clf.fit(&array![[1.0], [2.0]], &array![true, true]).unwrap_err();
        assert!(matches!(err, TrackingError::InsufficientData(_)));
    }

    #[test]
    fn test_feature_count_checked() {
        let mut clf = LogisticRegression::new(config()).unwrap();
        clf.fit(&array![[0.0], [5.0]], &array![true, false]).unwrap();
        let err = clf.predict_proba(&array![[0.0, 1.0]]).unwrap_err();
        assert!(matches!(err, TrackingError::FeatureShape { .. }));
    }

    #[test]
    fn test_unfitted_and_invalid_config() {
        let clf = LogisticRegression::new(config()).unwrap();
        assert!(clf.predict_proba(&array![[0.0]]).is_err());

        let mut bad = config();
        bad.learning_rate = 0.0;
        assert!(LogisticRegression::new(bad).is_err());
    }

    #[test]
    fn test_feature_names_recorded_after_fit() {
        let mut clf = LogisticRegression::new(config()).unwrap();
        assert!(clf.set_feature_names(vec!["distance".to_string()]).is_err());

        clf.fit(&array![[0.0], [5.0]], &array![true, false]).unwrap();
        assert_eq!(clf.feature_names(), None);
        assert!(clf.set_feature_names(vec!["a".to_string(), "b".to_string()]).is_err());
        clf.set_feature_names(vec!["distance".to_string()]).unwrap();
        assert_eq!(clf.feature_names(), Some(&["distance".to_string()][..]));
    }

    #[test]
    fn test_fitted_model_round_trips_through_json() {
        let mut clf = LogisticRegression::new(config()).unwrap();
        clf.fit(&array![[0.0, 1.0], [5.0, 2.0]], &array![true, false]).unwrap();
        clf.set_feature_names(vec!["distance".to_string(), "frame_gap".to_string()])
            .unwrap();
        let json = serde_json::to_string(&clf).unwrap();
        let back: LogisticRegression = serde_json::from_str(&json).unwrap();
        assert_eq!(back, clf);
    }

    #[test]
    fn test_inconsistent_stored_model_rejected() {
        let json = r#"{
            "config": {"learning_rate": 0.5, "max_iter": 10, "l2": 0.0, "tolerance": 0.0, "balanced": true},
            "model": {
                "mean": {"v": 1, "dim": [1], "data": [0.0]},
                "scale": {"v": 1, "dim": [1], "data": [1.0]},
                "weights": {"v": 1, "dim": [2], "data": [1.0, -1.0]},
                "intercept": 0.0,
                "iterations": 3
            }
        }"#;
        assert!(serde_json::from_str::<LogisticRegression>(json).is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let json = serde_json::to_string(&config()).unwrap();
        let back: LogisticRegressionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config());
    }
}
