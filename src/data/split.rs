//! Stratified train/test partitioning
//!
//! Rows are grouped by outcome level and each group is shuffled with a
//! seeded `ChaCha8Rng`, so the class proportion survives the split and the
//! same seed always yields the same partitions.

use super::frame::{Frame, FrameError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Errors raised while splitting
#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Train fraction must lie in (0, 1), got {0}")]
    InvalidFraction(f64),

    #[error("Outcome level '{level}' has {count} rows, need at least 2")]
    TooFewRows { level: String, count: usize },

    #[error("Outcome has missing entries")]
    MissingOutcome,
}

/// Row indices of a train/test partition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StratifiedSplit {
    /// Sorted training row indices
    pub train_indices: Vec<usize>,
    /// Sorted test row indices
    pub test_indices: Vec<usize>,
}

/// Shuffle each class's row indices with a seeded generator
pub(crate) fn shuffled_groups(
    codes: &[Option<usize>],
    n_levels: usize,
    seed: u64,
) -> Result<Vec<Vec<usize>>, SplitError> {
    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); n_levels];
    for (row, code) in codes.iter().enumerate() {
        let code = code.ok_or(SplitError::MissingOutcome)?;
        groups[code].push(row);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for group in &mut groups {
        group.shuffle(&mut rng);
    }
    Ok(groups)
}

impl StratifiedSplit {
    /// Split `frame` on its categorical `outcome` column
    ///
    /// # Arguments
    /// * `train_fraction` - Share of each class placed in the training set
    /// * `seed` - Seed of the shuffling generator
    pub fn new(
        frame: &Frame,
        outcome: &str,
        train_fraction: f64,
        seed: u64,
    ) -> Result<Self, SplitError> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(SplitError::InvalidFraction(train_fraction));
        }

        let column = frame.column(outcome)?;
        let levels = column
            .levels()
            .ok_or_else(|| FrameError::NotCategorical(outcome.to_string()))?;
        let codes = column
            .codes()
            .ok_or_else(|| FrameError::NotCategorical(outcome.to_string()))?;

        let groups = shuffled_groups(codes, levels.len(), seed)?;

        let mut train_indices = Vec::with_capacity(frame.n_rows());
        let mut test_indices = Vec::new();

        for (level, group) in levels.iter().zip(&groups) {
            if group.is_empty() {
                continue;
            }
            if group.len() < 2 {
                return Err(SplitError::TooFewRows {
                    level: level.clone(),
                    count: group.len(),
                });
            }

            let n_train = (train_fraction * group.len() as f64).ceil() as usize;
            let (train, test) = group.split_at(n_train.min(group.len()));
            train_indices.extend_from_slice(train);
            test_indices.extend_from_slice(test);
        }

        train_indices.sort_unstable();
        test_indices.sort_unstable();

        info!(
            "Stratified split: {} train / {} test rows (seed {})",
            train_indices.len(),
            test_indices.len(),
            seed
        );

        Ok(Self {
            train_indices,
            test_indices,
        })
    }

    /// Materialize the training and test frames
    pub fn apply(&self, frame: &Frame) -> (Frame, Frame) {
        (
            frame.select_rows(&self.train_indices),
            frame.select_rows(&self.test_indices),
        )
    }

    pub fn n_train(&self) -> usize {
        self.train_indices.len()
    }

    pub fn n_test(&self) -> usize {
        self.test_indices.len()
    }
}

/// Share of each outcome level in `frame`
pub fn class_proportions(frame: &Frame, outcome: &str) -> Result<Vec<(String, f64)>, FrameError> {
    let column = frame.column(outcome)?;
    if !column.is_categorical() {
        return Err(FrameError::NotCategorical(outcome.to_string()));
    }
    let total = column.len().max(1) as f64;
    Ok(column
        .level_counts()
        .into_iter()
        .map(|(level, count)| (level, count as f64 / total))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::Column;

    fn frame(n_pos: usize, n_neg: usize) -> Frame {
        let labels: Vec<Option<&str>> = (0..n_pos + n_neg)
            .map(|i| Some(if i < n_pos { "pos" } else { "neg" }))
            .collect();
        let x: Vec<Option<f64>> = (0..n_pos + n_neg).map(|i| Some(i as f64)).collect();
        Frame::new(vec![
            Column::numeric("x", x),
            Column::from_labels("y", &labels),
        ])
        .unwrap()
    }

    #[test]
    fn test_split_sizes_and_coverage() {
        let frame = frame(25, 75);
        let split = StratifiedSplit::new(&frame, "y", 0.8, 42).unwrap();

        assert_eq!(split.n_train(), 80);
        assert_eq!(split.n_test(), 20);

        let mut all: Vec<usize> = split
            .train_indices
            .iter()
            .chain(split.test_indices.iter())
            .cloned()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_preserves_proportions() {
        let frame = frame(30, 70);
        let split = StratifiedSplit::new(&frame, "y", 0.8, 7).unwrap();
        let (train, test) = split.apply(&frame);

        let p_train = class_proportions(&train, "y").unwrap();
        let p_test = class_proportions(&test, "y").unwrap();
        assert!((p_train[0].1 - 0.3).abs() < 0.02);
        assert!((p_test[0].1 - 0.3).abs() < 0.02);
    }

    #[test]
    fn test_same_seed_same_split() {
        let frame = frame(40, 60);
        let a = StratifiedSplit::new(&frame, "y", 0.8, 123).unwrap();
        let b = StratifiedSplit::new(&frame, "y", 0.8, 123).unwrap();
        let c = StratifiedSplit::new(&frame, "y", 0.8, 124).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_fraction() {
        let frame = frame(5, 5);
        assert_eq!(
            StratifiedSplit::new(&frame, "y", 1.0, 1).unwrap_err(),
            SplitError::InvalidFraction(1.0)
        );
    }

    #[test]
    fn test_too_few_rows() {
        let frame = frame(1, 9);
        assert!(matches!(
            StratifiedSplit::new(&frame, "y", 0.8, 1).unwrap_err(),
            SplitError::TooFewRows { count: 1, .. }
        ));
    }
}
