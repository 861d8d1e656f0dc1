//! Stratified k-fold cross-validation
//!
//! Each outcome class is shuffled with a seeded generator and dealt
//! round-robin to the folds, so every fold keeps the class ratio. A fold is
//! scored the way caret's `twoClassSummary` does: ROC AUC plus sensitivity
//! and specificity at the classification threshold.

use crate::data::split::shuffled_groups;
use crate::data::{Frame, FrameError, SplitError};
use crate::metrics::{ClassificationMetrics, RocCurve};
use crate::models::{FitError, FittedModel, Formula, GlmControl};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised during cross-validation
#[derive(Error, Debug, PartialEq)]
pub enum CrossValidationError {
    #[error("Need at least 2 folds, got {0}")]
    TooFewFolds(usize),

    #[error("{folds} folds exceed the {count} rows of outcome level '{level}'")]
    TooManyFolds {
        folds: usize,
        level: String,
        count: usize,
    },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error("Fold {fold}: {source}")]
    Fit { fold: usize, source: FitError },
}

/// Cross-validation split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Summary statistics for cross-validation scores
#[derive(Debug, Clone, Serialize)]
pub struct CVScores {
    pub scores: Vec<f64>,
    pub mean: f64,
    /// Sample standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl CVScores {
    /// Calculate summary statistics from scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let std = if scores.len() > 1 {
            (scores.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Self {
            scores,
            mean,
            std,
            min,
            max,
        }
    }

    /// Print a summary of the scores
    pub fn summary(&self) -> String {
        format!(
            "mean={:.4} (sd {:.4}), min={:.4}, max={:.4}",
            self.mean, self.std, self.min, self.max
        )
    }
}

/// Scores of one held-out fold
#[derive(Debug, Clone, Serialize)]
pub struct FoldScore {
    pub fold: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub roc: f64,
    pub sensitivity: f64,
    pub specificity: f64,
}

/// Result of cross-validating one formula
#[derive(Debug, Clone, Serialize)]
pub struct CVReport {
    pub folds: Vec<FoldScore>,
    pub roc: CVScores,
    pub sensitivity: CVScores,
    pub specificity: CVScores,
}

impl CVReport {
    /// Text table of the per-fold and aggregate scores
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!(
            "{}-fold cross-validation\n",
            self.folds.len()
        ));
        s.push_str(&format!(
            "  {:>4} {:>7} {:>6} {:>8} {:>8} {:>8}\n",
            "fold", "train", "test", "ROC", "Sens", "Spec"
        ));
        for f in &self.folds {
            s.push_str(&format!(
                "  {:>4} {:>7} {:>6} {:>8.4} {:>8.4} {:>8.4}\n",
                f.fold, f.n_train, f.n_test, f.roc, f.sensitivity, f.specificity
            ));
        }
        s.push_str(&format!("  ROC:  {}\n", self.roc.summary()));
        s.push_str(&format!("  Sens: {}\n", self.sensitivity.summary()));
        s.push_str(&format!("  Spec: {}\n", self.specificity.summary()));
        s
    }
}

/// Stratified k-fold cross-validator
#[derive(Debug, Clone)]
pub struct CrossValidator {
    folds: usize,
    seed: u64,
    threshold: f64,
    control: GlmControl,
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self::new(10, 42)
    }
}

impl CrossValidator {
    /// # Arguments
    /// * `folds` - Number of folds
    /// * `seed` - Seed of the fold assignment
    pub fn new(folds: usize, seed: u64) -> Self {
        Self {
            folds,
            seed,
            threshold: 0.5,
            control: GlmControl::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_control(mut self, control: GlmControl) -> Self {
        self.control = control;
        self
    }

    /// Stratified fold assignment on a categorical `outcome` column
    pub fn stratified_k_fold(
        &self,
        frame: &Frame,
        outcome: &str,
    ) -> Result<Vec<CVSplit>, CrossValidationError> {
        if self.folds < 2 {
            return Err(CrossValidationError::TooFewFolds(self.folds));
        }

        let column = frame.column(outcome)?;
        let levels = column
            .levels()
            .ok_or_else(|| FrameError::NotCategorical(outcome.to_string()))?;
        let codes = column
            .codes()
            .ok_or_else(|| FrameError::NotCategorical(outcome.to_string()))?;

        let groups = shuffled_groups(codes, levels.len(), self.seed)?;
        for (level, group) in levels.iter().zip(&groups) {
            if !group.is_empty() && group.len() < self.folds {
                return Err(CrossValidationError::TooManyFolds {
                    folds: self.folds,
                    level: level.clone(),
                    count: group.len(),
                });
            }
        }

        // Deal rows round-robin, continuing across classes to even out fold sizes
        let mut assignment = vec![0usize; frame.n_rows()];
        let mut next = 0;
        for group in &groups {
            for &row in group {
                assignment[row] = next % self.folds;
                next += 1;
            }
        }

        Ok((0..self.folds)
            .map(|fold| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..frame.n_rows()).partition(|&row| assignment[row] == fold);
                CVSplit {
                    train_indices,
                    test_indices,
                }
            })
            .collect())
    }

    /// Cross-validate `formula`, refitting the design on each fold's training rows
    pub fn evaluate(
        &self,
        frame: &Frame,
        formula: &Formula,
        positive_class: &str,
    ) -> Result<CVReport, CrossValidationError> {
        let splits = self.stratified_k_fold(frame, &formula.response)?;

        let mut folds = Vec::with_capacity(splits.len());
        for (i, split) in splits.iter().enumerate() {
            let fold = i + 1;
            let train = frame.select_rows(&split.train_indices);
            let test = frame.select_rows(&split.test_indices);

            let scored = FittedModel::fit(formula, &train, positive_class, self.control)
                .and_then(|fitted| {
                    let proba = fitted.predict_proba(&test)?;
                    let y = fitted.response(&test)?;
                    Ok((y, proba))
                })
                .map_err(|source| CrossValidationError::Fit { fold, source })?;
            let (y, proba) = scored;

            let roc = RocCurve::new(&y, &proba).auc;
            let metrics = ClassificationMetrics::from_probabilities(&y, &proba, self.threshold);
            let score = FoldScore {
                fold,
                n_train: train.n_rows(),
                n_test: test.n_rows(),
                roc,
                sensitivity: metrics.sensitivity,
                specificity: metrics.specificity,
            };
            debug!(
                "Fold {}/{}: ROC {:.4}, Sens {:.4}, Spec {:.4}",
                fold, self.folds, score.roc, score.sensitivity, score.specificity
            );
            folds.push(score);
        }

        let report = CVReport {
            roc: CVScores::from_scores(folds.iter().map(|f| f.roc).collect()),
            sensitivity: CVScores::from_scores(folds.iter().map(|f| f.sensitivity).collect()),
            specificity: CVScores::from_scores(folds.iter().map(|f| f.specificity).collect()),
            folds,
        };
        info!(
            "Cross-validated '{}': ROC {:.4} (sd {:.4})",
            formula, report.roc.mean, report.roc.std
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Column;

    fn frame(n_pos: usize, n_neg: usize) -> Frame {
        let n = n_pos + n_neg;
        let labels: Vec<Option<&str>> = (0..n)
            .map(|i| Some(if i < n_pos { "hi" } else { "lo" }))
            .collect();
        // Informative but overlapping predictor
        let x: Vec<Option<f64>> = (0..n)
            .map(|i| {
                let noise = ((i * 37) % 11) as f64;
                Some(if i < n_pos { 6.0 + noise } else { noise })
            })
            .collect();
        Frame::new(vec![Column::numeric("x", x), Column::from_labels("y", &labels)]).unwrap()
    }

    #[test]
    fn test_folds_are_stratified_and_cover() {
        let frame = frame(30, 70);
        let cv = CrossValidator::new(5, 3);
        let splits = cv.stratified_k_fold(&frame, "y").unwrap();

        assert_eq!(splits.len(), 5);
        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
            let pos = split.test_indices.iter().filter(|&&i| i < 30).count();
            assert_eq!(pos, 6);
        }
    }

    #[test]
    fn test_fold_errors() {
        let frame = frame(3, 20);
        assert_eq!(
            CrossValidator::new(1, 0)
                .stratified_k_fold(&frame, "y")
                .unwrap_err(),
            CrossValidationError::TooFewFolds(1)
        );
        assert!(matches!(
            CrossValidator::new(5, 0)
                .stratified_k_fold(&frame, "y")
                .unwrap_err(),
            CrossValidationError::TooManyFolds { count: 3, .. }
        ));
    }

    #[test]
    fn test_evaluate_scores_each_fold() {
        let frame = frame(40, 60);
        let formula = Formula::parse("y ~ x").unwrap();
        let report = CrossValidator::new(4, 11)
            .evaluate(&frame, &formula, "hi")
            .unwrap();

        assert_eq!(report.folds.len(), 4);
        assert_eq!(report.roc.scores.len(), 4);
        assert!(report.roc.mean > 0.7);
        assert!(report.roc.min <= report.roc.mean && report.roc.mean <= report.roc.max);
        assert!(report.summary().contains("4-fold"));
    }

    #[test]
    fn test_cv_scores() {
        let scores = CVScores::from_scores(vec![0.8, 0.9, 1.0]);
        assert!((scores.mean - 0.9).abs() < 1e-12);
        assert!((scores.std - 0.1).abs() < 1e-12);
        assert_eq!(scores.min, 0.8);
        assert_eq!(scores.max, 1.0);
    }
}
