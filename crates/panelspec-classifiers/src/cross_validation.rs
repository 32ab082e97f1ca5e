//! Stratified k-fold evaluation of a classifier prototype.
//!
//! Every fold trains a fresh copy obtained from
//! [`ClassifierModel::unfitted`], scores the held-out rows and contributes
//! one ROC curve. Fold curves are resampled onto a shared FPR grid and
//! averaged into the mean curve whose AUC summarizes the run.
use std::fmt;

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::error::{EvalError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::stats::{
    compute_roc, count_classes, fpr_grid, mean_curve, resample_curve, BinaryMetrics, RocCurve,
    DEFAULT_GRID_POINTS,
};

/// Split sample indices into `k` stratified folds.
///
/// Each class's indices are shuffled with a `StdRng` seeded from `seed`,
/// concatenated class by class and dealt round-robin, so every fold holds
/// `floor(n_c / k)` or `ceil(n_c / k)` samples of class `c`. Indices inside
/// a fold are sorted.
///
/// # Errors
///
/// `InsufficientSamples` when a class is absent or a fold would miss a
/// class, `FoldCount` when `k < 2` or `k` exceeds the smaller class count.
pub fn stratified_folds(y: &[i32], k: usize, seed: u64) -> Result<Vec<Vec<usize>>> {
    let (negatives, positives) = count_classes(y)?;
    if negatives == 0 || positives == 0 {
        return Err(EvalError::InsufficientSamples(format!(
            "both classes are required ({} reference, {} case samples)",
            negatives, positives
        )));
    }
    if k < 2 {
        return Err(EvalError::FoldCount {
            n_folds: k,
            reason: "at least 2 folds are required".to_string(),
        });
    }
    let smallest = negatives.min(positives);
    if k > smallest {
        return Err(EvalError::FoldCount {
            n_folds: k,
            reason: format!("the smaller class has only {} samples", smallest),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut order = Vec::with_capacity(y.len());
    for class in [0, 1] {
        let mut members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        members.shuffle(&mut rng);
        order.extend(members);
    }

    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];
    for (i, idx) in order.into_iter().enumerate() {
        folds[i % k].push(idx);
    }
    for (f, fold) in folds.iter_mut().enumerate() {
        fold.sort_unstable();
        let cases = fold.iter().filter(|&&i| y[i] == 1).count();
        if cases == 0 || cases == fold.len() {
            return Err(EvalError::InsufficientSamples(format!(
                "fold {} lacks one of the classes",
                f
            )));
        }
    }
    log::trace!(
        "Stratified folds (seed {}): {:?}",
        seed,
        folds.iter().map(Vec::len).collect::<Vec<_>>()
    );
    Ok(folds)
}

/// Outcome of one held-out fold.
#[derive(Debug, Clone, Serialize)]
pub struct FoldResult {
    pub fold: usize,
    pub auc: f64,
    pub roc: RocCurve,
    /// TPR resampled onto the evaluator's grid.
    pub tpr: Vec<f64>,
    pub n_test: usize,
    pub metrics: BinaryMetrics,
}

/// Result of one cross-validated evaluation.
pub struct EvaluationResult {
    /// The model fitted on the last fold.
    pub classifier: Box<dyn ClassifierModel>,
    pub folds: Vec<FoldResult>,
    pub fold_aucs: Vec<f64>,
    pub grid: Vec<f64>,
    pub mean_tpr: Vec<f64>,
    pub mean_auc: f64,
}

impl fmt::Debug for EvaluationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationResult")
            .field("classifier", &self.classifier.name())
            .field("fold_aucs", &self.fold_aucs)
            .field("mean_auc", &self.mean_auc)
            .finish()
    }
}

/// Stratified k-fold evaluator with a fixed FPR grid.
#[derive(Debug, Clone)]
pub struct CrossValidator {
    pub n_folds: usize,
    grid: Vec<f64>,
}

impl CrossValidator {
    pub fn new(n_folds: usize, grid_points: usize) -> Result<Self> {
        Ok(CrossValidator {
            n_folds,
            grid: fpr_grid(grid_points)?,
        })
    }

    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    /// Cross-validate `prototype` on `x` / `y` with folds drawn from `seed`.
    pub fn evaluate(
        &self,
        x: &Array2<f64>,
        y: &[i32],
        prototype: &dyn ClassifierModel,
        seed: u64,
    ) -> Result<EvaluationResult> {
        if x.nrows() != y.len() {
            return Err(EvalError::LengthMismatch {
                what: "feature rows and labels",
                left: x.nrows(),
                right: y.len(),
            });
        }
        let folds = stratified_folds(y, self.n_folds, seed)?;

        let mut results = Vec::with_capacity(folds.len());
        let mut last_model = None;
        for (fold, test_idx) in folds.iter().enumerate() {
            let mut in_test = vec![false; y.len()];
            for &i in test_idx {
                in_test[i] = true;
            }
            let train_idx: Vec<usize> = (0..y.len()).filter(|&i| !in_test[i]).collect();

            let x_train = x.select(Axis(0), &train_idx);
            let y_train: Vec<i32> = train_idx.iter().map(|&i| y[i]).collect();
            let x_test = x.select(Axis(0), test_idx);
            let y_test: Vec<i32> = test_idx.iter().map(|&i| y[i]).collect();

            let mut model = prototype.unfitted();
            model.fit(&x_train, &y_train)?;
            let scores = model.predict_proba(&x_test)?;
            let predictions = model.predict(&x_test)?;

            let (roc, auc) = compute_roc(&y_test, &scores)?;
            let metrics = BinaryMetrics::from_predictions(&y_test, &predictions)?;
            log::debug!(
                "Fold {}: {} train / {} test samples, AUC {:.4}",
                fold,
                train_idx.len(),
                test_idx.len(),
                auc
            );

            results.push(FoldResult {
                fold,
                auc,
                tpr: resample_curve(&roc, &self.grid),
                roc,
                n_test: test_idx.len(),
                metrics,
            });
            last_model = Some(model);
        }

        let curves: Vec<Vec<f64>> = results.iter().map(|r| r.tpr.clone()).collect();
        let (mean_tpr, mean_auc) = mean_curve(&curves, &self.grid)?;
        let classifier =
            last_model.ok_or_else(|| EvalError::InsufficientSamples("no folds were evaluated".to_string()))?;

        Ok(EvaluationResult {
            classifier,
            fold_aucs: results.iter().map(|r| r.auc).collect(),
            folds: results,
            grid: self.grid.clone(),
            mean_tpr,
            mean_auc,
        })
    }
}

/// Cross-validate `classifier` with `k` folds on the default grid.
pub fn evaluate(
    x: &Array2<f64>,
    y: &[i32],
    classifier: &dyn ClassifierModel,
    seed: u64,
    k: usize,
) -> Result<EvaluationResult> {
    CrossValidator::new(k, DEFAULT_GRID_POINTS)?.evaluate(x, y, classifier, seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Scores every row with its first feature.
    struct Identity;

    impl ClassifierModel for Identity {
        fn fit(&mut self, _x: &Array2<f64>, _y: &[i32]) -> Result<()> {
            Ok(())
        }

        fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
            Ok(x.column(0).to_vec())
        }

        fn unfitted(&self) -> Box<dyn ClassifierModel> {
            Box::new(Identity)
        }

        fn name(&self) -> &str {
            "identity"
        }
    }

    fn column(scores: &[f64]) -> Array2<f64> {
        Array2::from_shape_vec((scores.len(), 1), scores.to_vec()).unwrap()
    }

    const Y: [i32; 10] = [0, 0, 0, 0, 0, 1, 1, 1, 1, 1];

    #[test]
    fn perfect_separation() {
        let x = column(&[0.1, 0.2, 0.1, 0.3, 0.2, 0.9, 0.8, 0.95, 0.85, 0.9]);
        for seed in [1, 2, 42] {
            let result = evaluate(&x, &Y, &Identity, seed, 5).unwrap();
            assert_eq!(result.folds.len(), 5);
            assert!(result.fold_aucs.iter().all(|&a| a == 1.0));
            let tolerance = 1.0 / (DEFAULT_GRID_POINTS as f64 - 1.0);
            assert!((result.mean_auc - 1.0).abs() <= tolerance, "{}", result.mean_auc);
            assert_eq!(result.classifier.name(), "identity");
        }
    }

    #[test]
    fn identical_scores_give_chance_auc() {
        let x = column(&[0.5; 10]);
        let result = evaluate(&x, &Y, &Identity, 1, 5).unwrap();
        assert!(result.fold_aucs.iter().all(|&a| a == 0.5));
        assert!((0.0..=1.0).contains(&result.mean_auc));
    }

    #[test]
    fn folds_partition_every_index_once() {
        let y = [0, 1, 0, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1];
        for k in 2..=5 {
            let folds = stratified_folds(&y, k, 7).unwrap();
            let mut all: Vec<usize> = folds.iter().flatten().copied().collect();
            all.sort_unstable();
            assert_eq!(all, (0..y.len()).collect::<Vec<_>>());
            let sizes: Vec<usize> = folds.iter().map(Vec::len).collect();
            let spread = sizes.iter().max().unwrap() - sizes.iter().min().unwrap();
            assert!(spread <= 1, "{:?}", sizes);
        }
    }

    #[test]
    fn folds_keep_class_proportions() {
        let mut y = vec![0; 39];
        for i in [3, 9, 14, 20, 27, 31, 38, 44] {
            y.insert(i, 1);
        }
        assert_eq!(y.len(), 47);
        for seed in 1..=10 {
            for k in 2..=8 {
                let folds = stratified_folds(&y, k, seed).unwrap();
                assert_eq!(folds.len(), k);
                for class in [0, 1] {
                    let total = y.iter().filter(|&&l| l == class).count();
                    let (low, high) = (total / k, (total + k - 1) / k);
                    for fold in &folds {
                        let n = fold.iter().filter(|&&i| y[i] == class).count();
                        assert!(
                            n == low || n == high,
                            "seed {} k {} class {}: {} not in [{}, {}]",
                            seed, k, class, n, low, high
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn same_seed_same_result() {
        let x = column(&[0.3, 0.2, 0.6, 0.1, 0.4, 0.5, 0.8, 0.35, 0.9, 0.7]);
        let a = evaluate(&x, &Y, &Identity, 5, 5).unwrap();
        let b = evaluate(&x, &Y, &Identity, 5, 5).unwrap();
        assert_eq!(a.fold_aucs, b.fold_aucs);
        assert_eq!(a.mean_auc, b.mean_auc);
        assert_eq!(stratified_folds(&Y, 5, 5).unwrap(), stratified_folds(&Y, 5, 5).unwrap());
    }

    #[test]
    fn single_class_is_insufficient() {
        let x = column(&[0.1; 6]);
        assert!(matches!(
            evaluate(&x, &[1; 6], &Identity, 1, 2),
            Err(EvalError::InsufficientSamples(_))
        ));
    }

    #[test]
    fn fold_count_bounds() {
        assert!(matches!(
            stratified_folds(&Y, 6, 1),
            Err(EvalError::FoldCount { n_folds: 6, .. })
        ));
        assert!(matches!(
            stratified_folds(&Y, 1, 1),
            Err(EvalError::FoldCount { n_folds: 1, .. })
        ));
    }

    #[test]
    fn shape_and_label_errors() {
        let x = column(&[0.1; 4]);
        assert!(matches!(
            evaluate(&x, &[0, 1, 0], &Identity, 1, 2),
            Err(EvalError::LengthMismatch { .. })
        ));
        assert!(matches!(
            evaluate(&x, &[0, 1, 2, 1], &Identity, 1, 2),
            Err(EvalError::InvalidLabel(2))
        ));
    }
}
