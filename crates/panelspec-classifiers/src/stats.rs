//! ROC/AUC computation, curve resampling and small summary statistics.
//!
//! Curves are built from binary labels (0 = reference, 1 = case) and
//! positive-class scores. Per-fold curves are resampled onto a shared
//! false-positive-rate grid so they can be averaged point-wise.
use itertools_num::linspace;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};

use crate::error::{EvalError, Result};

/// Default number of points on the false-positive-rate grid.
pub const DEFAULT_GRID_POINTS: usize = 100;

/// One operating point of a ROC curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    /// Scores `>= threshold` are called positive. `+inf` for the origin.
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
}

/// ROC curve ordered by non-decreasing false-positive rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
}

impl RocCurve {
    pub fn fpr(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.fpr).collect()
    }

    pub fn tpr(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.tpr).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Trapezoidal area under the curve.
    pub fn auc(&self) -> f64 {
        trapezoid(&self.fpr(), &self.tpr())
    }
}

/// Check that every label is 0 or 1 and count (negatives, positives).
pub(crate) fn count_classes(y_true: &[i32]) -> Result<(usize, usize)> {
    let mut negatives = 0;
    let mut positives = 0;
    for &label in y_true {
        match label {
            0 => negatives += 1,
            1 => positives += 1,
            other => return Err(EvalError::InvalidLabel(other)),
        }
    }
    Ok((negatives, positives))
}

/// Compute the ROC curve and its AUC.
///
/// Samples are ranked by descending score; samples sharing a score form a
/// single threshold, so ties produce a diagonal segment rather than an
/// arbitrary ordering. The curve starts at (0, 0) and ends at (1, 1).
///
/// Only the ordering of the scores matters, so they need not be
/// probabilities.
///
/// # Arguments
///
/// * `y_true` - Binary labels, 1 for the positive (case) class.
/// * `y_score` - Positive-class scores, same length as `y_true`.
///
/// # Returns
///
/// The curve and its trapezoidal AUC.
///
/// # Errors
///
/// `DegenerateLabels` unless both classes are present, `LengthMismatch`,
/// `InvalidLabel` and `NonFiniteScores` for malformed input.
pub fn compute_roc(y_true: &[i32], y_score: &[f64]) -> Result<(RocCurve, f64)> {
    if y_true.len() != y_score.len() {
        return Err(EvalError::LengthMismatch {
            what: "labels and scores",
            left: y_true.len(),
            right: y_score.len(),
        });
    }
    let non_finite = y_score.iter().filter(|s| !s.is_finite()).count();
    if non_finite > 0 {
        return Err(EvalError::NonFiniteScores(non_finite));
    }
    let (negatives, positives) = count_classes(y_true)?;
    if negatives == 0 || positives == 0 {
        return Err(EvalError::DegenerateLabels {
            positives,
            negatives,
        });
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[b].total_cmp(&y_score[a]));

    let n_pos = positives as f64;
    let n_neg = negatives as f64;

    let mut points = Vec::with_capacity(order.len() + 1);
    points.push(RocPoint {
        threshold: f64::INFINITY,
        fpr: 0.0,
        tpr: 0.0,
    });

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut i = 0;
    while i < order.len() {
        let threshold = y_score[order[i]];
        while i < order.len() && y_score[order[i]] == threshold {
            if y_true[order[i]] == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            threshold,
            fpr: fp as f64 / n_neg,
            tpr: tp as f64 / n_pos,
        });
    }

    let curve = RocCurve { points };
    let auc = curve.auc();
    Ok((curve, auc))
}

/// Evenly spaced false-positive-rate grid over [0, 1].
pub fn fpr_grid(points: usize) -> Result<Vec<f64>> {
    if points < 2 {
        return Err(EvalError::invalid_config(format!(
            "FPR grid needs at least 2 points, got {}",
            points
        )));
    }
    let mut grid: Vec<f64> = linspace(0.0, 1.0, points).collect();
    grid[points - 1] = 1.0;
    Ok(grid)
}

/// Linearly interpolate a curve's TPR at each grid FPR.
///
/// For every grid point the bracketing pair is the last curve point with
/// `fpr <= x` and the one after it; an exact hit on a vertical segment
/// therefore takes the highest TPR at that FPR. Past the last curve point
/// the final TPR is held. The first grid value is pinned to 0.0.
pub fn resample_curve(curve: &RocCurve, grid: &[f64]) -> Vec<f64> {
    let fpr = curve.fpr();
    let tpr = curve.tpr();

    let mut resampled: Vec<f64> = grid
        .iter()
        .map(|&x| {
            if fpr.is_empty() {
                return 0.0;
            }
            let upper = fpr.partition_point(|&f| f <= x);
            if upper == 0 {
                return tpr[0];
            }
            let j = upper - 1;
            if j + 1 == fpr.len() {
                return tpr[j];
            }
            let slope = (tpr[j + 1] - tpr[j]) / (fpr[j + 1] - fpr[j]);
            tpr[j] + slope * (x - fpr[j])
        })
        .collect();

    if let Some(first) = resampled.first_mut() {
        *first = 0.0;
    }
    resampled
}

/// Average resampled curves and integrate the result.
///
/// # Arguments
///
/// * `curves` - Per-fold TPR vectors, each aligned to `grid`.
/// * `grid` - The FPR grid the curves were resampled on.
///
/// # Returns
///
/// The point-wise mean TPR (last point pinned to 1.0) and its AUC.
pub fn mean_curve(curves: &[Vec<f64>], grid: &[f64]) -> Result<(Vec<f64>, f64)> {
    if curves.is_empty() {
        return Err(EvalError::invalid_config("cannot average zero curves"));
    }
    if let Some(bad) = curves.iter().find(|c| c.len() != grid.len()) {
        return Err(EvalError::LengthMismatch {
            what: "resampled curve and FPR grid",
            left: bad.len(),
            right: grid.len(),
        });
    }

    let n = curves.len() as f64;
    let mut mean: Vec<f64> = (0..grid.len())
        .map(|i| curves.iter().map(|c| c[i]).sum::<f64>() / n)
        .collect();
    if let Some(last) = mean.last_mut() {
        *last = 1.0;
    }
    let auc = trapezoid(grid, &mean);
    Ok((mean, auc))
}

/// Trapezoidal integral of `y` over monotonic `x`.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[1] + ys[0]) / 2.0)
        .sum()
}

/// Confusion-matrix derived metrics for hard 0/1 predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub accuracy: f64,
    /// Recall of the case class.
    pub sensitivity: f64,
    /// Recall of the reference class.
    pub specificity: f64,
    pub precision: f64,
    pub f1: f64,
}

impl BinaryMetrics {
    /// Ratios with an empty denominator are reported as 0.0.
    pub fn from_predictions(y_true: &[i32], y_pred: &[i32]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(EvalError::LengthMismatch {
                what: "labels and predictions",
                left: y_true.len(),
                right: y_pred.len(),
            });
        }
        let (mut tp, mut tn, mut fp, mut fneg) = (0usize, 0usize, 0usize, 0usize);
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (1, 1) => tp += 1,
                (0, 0) => tn += 1,
                (0, 1) => fp += 1,
                (1, 0) => fneg += 1,
                (0 | 1, other) | (other, _) => return Err(EvalError::InvalidLabel(other)),
            }
        }
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let sensitivity = ratio(tp, tp + fneg);
        let precision = ratio(tp, tp + fp);
        let f1 = if precision + sensitivity == 0.0 {
            0.0
        } else {
            2.0 * precision * sensitivity / (precision + sensitivity)
        };
        Ok(BinaryMetrics {
            accuracy: ratio(tp + tn, y_true.len()),
            sensitivity,
            specificity: ratio(tn, tn + fp),
            precision,
            f1,
        })
    }
}

/// Distribution summary of a set of AUC values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl Summary {
    /// `None` for an empty input.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let std_dev = if values.len() < 2 {
            0.0
        } else {
            Statistics::std_dev(values)
        };
        let mut data = Data::new(values.to_vec());
        Some(Summary {
            n: values.len(),
            mean: Statistics::mean(values),
            std_dev,
            min: Statistics::min(values),
            q1: data.quantile(0.25),
            median: data.quantile(0.5),
            q3: data.quantile(0.75),
            max: Statistics::max(values),
        })
    }
}
