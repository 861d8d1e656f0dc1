//! Cleaning the raw census frame before modeling
//!
//! Steps run in a fixed order: identifier normalization, listwise deletion
//! of missing values, removal of the capital-gain sentinel, column drops,
//! unused-level removal and a final check of the outcome column.

use super::frame::{ColumnData, Frame, FrameError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while cleaning
#[derive(Error, Debug, PartialEq)]
pub enum CleaningError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Column '{column}': levels '{first}' and '{second}' both normalize to '{normalized}'")]
    LevelCollision {
        column: String,
        first: String,
        second: String,
        normalized: String,
    },

    #[error("Outcome '{column}' must have exactly two levels, found {found}")]
    OutcomeLevels { column: String, found: usize },

    #[error("Outcome '{column}' has {missing} missing entries")]
    OutcomeMissing { column: String, missing: usize },
}

/// Row and column bookkeeping of a cleaning run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningReport {
    pub rows_loaded: usize,
    pub rows_with_missing: usize,
    pub rows_over_sentinel: usize,
    pub rows_remaining: usize,
    pub dropped_columns: Vec<String>,
    pub dropped_levels: Vec<(String, Vec<String>)>,
    pub outcome_levels: Vec<String>,
}

impl CleaningReport {
    /// Human readable summary
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str("Data Cleaning\n");
        s.push_str("=============\n");
        s.push_str(&format!("  Rows loaded:               {:>8}\n", self.rows_loaded));
        s.push_str(&format!(
            "  Removed (missing values):  {:>8}\n",
            self.rows_with_missing
        ));
        s.push_str(&format!(
            "  Removed (gain sentinel):   {:>8}\n",
            self.rows_over_sentinel
        ));
        s.push_str(&format!("  Rows remaining:            {:>8}\n", self.rows_remaining));
        s.push_str(&format!(
            "  Dropped columns: {}\n",
            self.dropped_columns.join(", ")
        ));
        s.push_str(&format!(
            "  Outcome levels:  {}\n",
            self.outcome_levels.join(", ")
        ));
        s
    }
}

/// Convert a name into an identifier: non-alphanumeric characters become `_`
/// and a leading non-letter gets an `X` prefix.
pub fn to_identifier(name: &str) -> String {
    let mut out: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if !out.starts_with(|c: char| c.is_ascii_alphabetic()) {
        out.insert(0, 'X');
    }
    out
}

/// Cleaning rules for the census frame
#[derive(Debug, Clone)]
pub struct Cleaner {
    /// Outcome column name, after normalization
    pub outcome: String,
    /// Column holding capital gains, after normalization
    pub capital_gain_column: String,
    /// Rows with capital gain at or above this value are removed
    pub capital_gain_sentinel: f64,
    /// Columns removed before modeling (raw or normalized names)
    pub drop_columns: Vec<String>,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self {
            outcome: "income".to_string(),
            capital_gain_column: "capital_gain".to_string(),
            capital_gain_sentinel: 99999.0,
            drop_columns: vec![
                "fnlwgt".to_string(),
                "education".to_string(),
                "relationship".to_string(),
                "capital_loss".to_string(),
                "native_country".to_string(),
            ],
        }
    }
}

impl Cleaner {
    /// Run every cleaning step on `frame` in place
    pub fn clean(&self, frame: &mut Frame) -> Result<CleaningReport, CleaningError> {
        let mut report = CleaningReport {
            rows_loaded: frame.n_rows(),
            ..Default::default()
        };

        // Identifiers first so configured names match either spelling
        Self::normalize_identifiers(frame)?;

        let complete = frame.complete_rows();
        report.rows_with_missing = complete.iter().filter(|&&k| !k).count();
        frame.retain_rows(&complete);
        debug!("Removed {} rows with missing values", report.rows_with_missing);

        let gain_column = to_identifier(&self.capital_gain_column);
        if frame.contains(&gain_column) {
            let keep: Vec<bool> = frame
                .column(&gain_column)?
                .values()
                .ok_or_else(|| FrameError::NotNumeric(gain_column.clone()))?
                .iter()
                .map(|v| v.map_or(true, |g| g < self.capital_gain_sentinel))
                .collect();
            report.rows_over_sentinel = keep.iter().filter(|&&k| !k).count();
            frame.retain_rows(&keep);
            debug!(
                "Removed {} rows with capital gain >= {}",
                report.rows_over_sentinel, self.capital_gain_sentinel
            );
        }

        for name in &self.drop_columns {
            let name = to_identifier(name);
            if frame.contains(&name) {
                frame.drop_column(&name)?;
                report.dropped_columns.push(name);
            }
        }

        report.dropped_levels = frame.drop_unused_levels();
        report.outcome_levels = Self::check_outcome(frame, &to_identifier(&self.outcome))?;
        report.rows_remaining = frame.n_rows();

        info!(
            "Cleaning kept {} of {} rows, {} columns",
            report.rows_remaining,
            report.rows_loaded,
            frame.n_cols()
        );
        Ok(report)
    }

    /// Normalize column names and categorical levels to identifiers
    pub fn normalize_identifiers(frame: &mut Frame) -> Result<(), CleaningError> {
        for name in frame.column_names() {
            frame.rename_column(&name, &to_identifier(&name))?;
        }

        for column in frame.columns_mut() {
            if let ColumnData::Categorical { levels, .. } = &mut column.data {
                let normalized: Vec<String> = levels.iter().map(|l| to_identifier(l)).collect();
                for (i, n) in normalized.iter().enumerate() {
                    if let Some(j) = normalized[..i].iter().position(|m| m == n) {
                        return Err(CleaningError::LevelCollision {
                            column: column.name.clone(),
                            first: levels[j].clone(),
                            second: levels[i].clone(),
                            normalized: n.clone(),
                        });
                    }
                }
                *levels = normalized;
            }
        }
        Ok(())
    }

    /// Verify the outcome has two levels and no missing entries
    pub fn check_outcome(frame: &Frame, outcome: &str) -> Result<Vec<String>, CleaningError> {
        let column = frame.column(outcome)?;
        let levels = column
            .levels()
            .ok_or_else(|| FrameError::NotCategorical(outcome.to_string()))?;

        let missing = column.n_missing();
        if missing > 0 {
            return Err(CleaningError::OutcomeMissing {
                column: outcome.to_string(),
                missing,
            });
        }
        if levels.len() != 2 {
            return Err(CleaningError::OutcomeLevels {
                column: outcome.to_string(),
                found: levels.len(),
            });
        }
        Ok(levels.to_vec())
    }
}
