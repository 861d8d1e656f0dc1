//! Exploratory summaries of the cleaned data
//!
//! Tabular stand-ins for the usual plots: class balance, numeric columns
//! summarized per outcome class, and categorical columns cross-tabulated
//! against the outcome.

use super::frame::{ColumnData, Frame, FrameError};
use serde::Serialize;

/// Five-number summary plus mean and standard deviation of one class
#[derive(Debug, Clone, Serialize)]
pub struct ClassStats {
    pub level: String,
    pub n: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// A numeric column summarized per outcome class
#[derive(Debug, Clone, Serialize)]
pub struct NumericBreakdown {
    pub column: String,
    pub per_class: Vec<ClassStats>,
}

/// One level of a categorical column against the outcome
#[derive(Debug, Clone, Serialize)]
pub struct LevelRow {
    pub level: String,
    /// Row counts per outcome level
    pub counts: Vec<usize>,
    /// Share of rows in the positive class
    pub positive_rate: f64,
}

/// A categorical column cross-tabulated against the outcome
#[derive(Debug, Clone, Serialize)]
pub struct LevelBreakdown {
    pub column: String,
    pub rows: Vec<LevelRow>,
}

/// All exploratory summaries of a frame
#[derive(Debug, Clone, Serialize)]
pub struct Exploration {
    pub outcome: String,
    pub outcome_levels: Vec<String>,
    pub positive_class: String,
    /// (level, count, proportion)
    pub class_balance: Vec<(String, usize, f64)>,
    pub numeric: Vec<NumericBreakdown>,
    pub categorical: Vec<LevelBreakdown>,
}

/// Quantile with linear interpolation between order statistics
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

fn class_stats(level: &str, mut values: Vec<f64>) -> ClassStats {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    let mean = if n > 0 {
        values.iter().sum::<f64>() / n as f64
    } else {
        f64::NAN
    };
    // Sample standard deviation
    let std = if n > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
    } else {
        0.0
    };

    ClassStats {
        level: level.to_string(),
        n,
        mean,
        std,
        min: values.first().copied().unwrap_or(f64::NAN),
        q1: quantile(&values, 0.25),
        median: quantile(&values, 0.5),
        q3: quantile(&values, 0.75),
        max: values.last().copied().unwrap_or(f64::NAN),
    }
}

impl Exploration {
    /// Summarize every column of `frame` against `outcome`
    pub fn from_frame(frame: &Frame, outcome: &str, positive_class: &str) -> Result<Self, FrameError> {
        let target = frame.column(outcome)?;
        let outcome_levels = target
            .levels()
            .ok_or_else(|| FrameError::NotCategorical(outcome.to_string()))?
            .to_vec();
        let codes = target
            .codes()
            .ok_or_else(|| FrameError::NotCategorical(outcome.to_string()))?;
        let positive = outcome_levels.iter().position(|l| l == positive_class);

        let total = frame.n_rows().max(1) as f64;
        let class_balance = target
            .level_counts()
            .into_iter()
            .map(|(level, count)| (level, count, count as f64 / total))
            .collect();

        let mut numeric = Vec::new();
        let mut categorical = Vec::new();

        for column in frame.columns() {
            if column.name == outcome {
                continue;
            }
            match &column.data {
                ColumnData::Numeric(values) => {
                    let per_class = outcome_levels
                        .iter()
                        .enumerate()
                        .map(|(k, level)| {
                            let vals: Vec<f64> = values
                                .iter()
                                .zip(codes)
                                .filter(|(_, c)| **c == Some(k))
                                .filter_map(|(v, _)| *v)
                                .collect();
                            class_stats(level, vals)
                        })
                        .collect();
                    numeric.push(NumericBreakdown {
                        column: column.name.clone(),
                        per_class,
                    });
                }
                ColumnData::Categorical {
                    levels,
                    codes: level_codes,
                } => {
                    let mut table = vec![vec![0usize; outcome_levels.len()]; levels.len()];
                    for (lc, oc) in level_codes.iter().zip(codes) {
                        if let (Some(l), Some(o)) = (lc, oc) {
                            table[*l][*o] += 1;
                        }
                    }
                    let rows = levels
                        .iter()
                        .zip(table)
                        .map(|(level, counts)| {
                            let n: usize = counts.iter().sum();
                            let positive_rate = match positive {
                                Some(p) if n > 0 => counts[p] as f64 / n as f64,
                                _ => 0.0,
                            };
                            LevelRow {
                                level: level.clone(),
                                counts,
                                positive_rate,
                            }
                        })
                        .collect();
                    categorical.push(LevelBreakdown {
                        column: column.name.clone(),
                        rows,
                    });
                }
            }
        }

        Ok(Self {
            outcome: outcome.to_string(),
            outcome_levels,
            positive_class: positive_class.to_string(),
            class_balance,
            numeric,
            categorical,
        })
    }

    /// Render all tables as text
    pub fn report(&self) -> String {
        let mut s = String::new();
        s.push_str("Exploration\n");
        s.push_str("===========\n\n");

        s.push_str(&format!("Outcome '{}':\n", self.outcome));
        for (level, count, share) in &self.class_balance {
            s.push_str(&format!("  {:12} {:>8} ({:>5.1}%)\n", level, count, share * 100.0));
        }

        for breakdown in &self.numeric {
            s.push_str(&format!("\n{} by {}:\n", breakdown.column, self.outcome));
            s.push_str(&format!(
                "  {:12} {:>7} {:>10} {:>10} {:>9} {:>9} {:>9} {:>9} {:>9}\n",
                "class", "n", "mean", "sd", "min", "q1", "median", "q3", "max"
            ));
            for c in &breakdown.per_class {
                s.push_str(&format!(
                    "  {:12} {:>7} {:>10.2} {:>10.2} {:>9.1} {:>9.1} {:>9.1} {:>9.1} {:>9.1}\n",
                    c.level, c.n, c.mean, c.std, c.min, c.q1, c.median, c.q3, c.max
                ));
            }
        }

        for breakdown in &self.categorical {
            s.push_str(&format!("\n{} x {}:\n", breakdown.column, self.outcome));
            s.push_str(&format!("  {:24}", "level"));
            for level in &self.outcome_levels {
                s.push_str(&format!(" {:>10}", level));
            }
            s.push_str(&format!(" {:>10}\n", format!("%{}", self.positive_class)));
            for row in &breakdown.rows {
                s.push_str(&format!("  {:24}", row.level));
                for count in &row.counts {
                    s.push_str(&format!(" {:>10}", count));
                }
                s.push_str(&format!(" {:>9.1}%\n", row.positive_rate * 100.0));
            }
        }

        s
    }
}
