//! ROC curve, AUC and Youden's threshold

use anyhow::{Context, Result};
use ndarray::Array1;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// One operating point: predicting positive when `p >= threshold`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    pub threshold: f64,
}

/// Receiver operating characteristic of a scored sample
#[derive(Debug, Clone, Serialize)]
pub struct RocCurve {
    /// From (0, 0) at threshold `+inf` to (1, 1)
    pub points: Vec<RocPoint>,
    pub auc: f64,
    pub n_pos: usize,
    pub n_neg: usize,
}

impl RocCurve {
    /// Build the curve from 0/1 labels and positive-class probabilities
    pub fn new(y_true: &Array1<f64>, y_proba: &Array1<f64>) -> Self {
        let mut pairs: Vec<(f64, bool)> = y_proba
            .iter()
            .zip(y_true.iter())
            .map(|(&p, &t)| (p, t >= 0.5))
            .collect();

        // Sort by prediction descending
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

        let n_pos = pairs.iter().filter(|(_, t)| *t).count();
        let n_neg = pairs.len() - n_pos;
        let rate = |count: f64, total: usize| {
            if total == 0 {
                0.0
            } else {
                count / total as f64
            }
        };

        let mut points = vec![RocPoint {
            fpr: 0.0,
            tpr: 0.0,
            threshold: f64::INFINITY,
        }];
        let mut tp = 0.0;
        let mut fp = 0.0;

        let mut i = 0;
        while i < pairs.len() {
            // Tied scores form one point
            let score = pairs[i].0;
            while i < pairs.len() && pairs[i].0.total_cmp(&score).is_eq() {
                if pairs[i].1 {
                    tp += 1.0;
                } else {
                    fp += 1.0;
                }
                i += 1;
            }
            points.push(RocPoint {
                fpr: rate(fp, n_neg),
                tpr: rate(tp, n_pos),
                threshold: score,
            });
        }

        let auc = if n_pos == 0 || n_neg == 0 {
            0.5
        } else {
            points
                .windows(2)
                .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
                .sum()
        };

        Self {
            points,
            auc,
            n_pos,
            n_neg,
        }
    }

    /// Point maximizing `tpr - fpr`, the highest threshold winning ties
    pub fn youden(&self) -> Option<RocPoint> {
        self.points
            .iter()
            .filter(|p| p.threshold.is_finite())
            .fold(None, |best: Option<RocPoint>, p| match best {
                Some(b) if b.tpr - b.fpr >= p.tpr - p.fpr => Some(b),
                _ => Some(*p),
            })
    }

    /// Write `threshold,fpr,tpr` rows
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["threshold", "fpr", "tpr"])?;
        for p in &self.points {
            wtr.write_record(&[
                p.threshold.to_string(),
                p.fpr.to_string(),
                p.tpr.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Save the curve for plotting
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_csv(file)
    }
}

/// Area under the ROC curve
pub fn auc_roc(y_true: &Array1<f64>, y_proba: &Array1<f64>) -> f64 {
    RocCurve::new(y_true, y_proba).auc
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_auc_perfect() {
        let y_true = array![0.0, 0.0, 1.0, 1.0];
        let y_proba = array![0.1, 0.2, 0.8, 0.9];
        assert_relative_eq!(auc_roc(&y_true, &y_proba), 1.0);
    }

    #[test]
    fn test_auc_matches_pair_counting() {
        let y_true = array![1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let y_proba = array![0.9, 0.8, 0.7, 0.7, 0.3, 0.1];

        // Positive/negative pairs ordered correctly, ties counted one half
        let mut wins = 0.0;
        for (i, &ti) in y_true.iter().enumerate() {
            for (j, &tj) in y_true.iter().enumerate() {
                if ti == 1.0 && tj == 0.0 {
                    wins += if y_proba[i] > y_proba[j] {
                        1.0
                    } else if y_proba[i] == y_proba[j] {
                        0.5
                    } else {
                        0.0
                    };
                }
            }
        }
        assert_relative_eq!(auc_roc(&y_true, &y_proba), wins / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ties_form_one_point() {
        let y_true = array![1.0, 0.0, 1.0];
        let y_proba = array![0.5, 0.5, 0.5];
        let roc = RocCurve::new(&y_true, &y_proba);

        assert_eq!(roc.points.len(), 2);
        assert_eq!(roc.points[1].fpr, 1.0);
        assert_eq!(roc.points[1].tpr, 1.0);
        assert_relative_eq!(roc.auc, 0.5);
    }

    #[test]
    fn test_single_class_auc() {
        let roc = RocCurve::new(&array![1.0, 1.0], &array![0.2, 0.7]);
        assert_eq!(roc.auc, 0.5);
        assert_eq!(roc.n_neg, 0);
    }

    #[test]
    fn test_youden_threshold() {
        let y_true = array![0.0, 1.0, 0.0, 0.0, 1.0, 1.0];
        let y_proba = array![0.1, 0.3, 0.4, 0.6, 0.8, 0.9];
        let best = RocCurve::new(&y_true, &y_proba).youden().unwrap();

        assert_eq!(best.threshold, 0.8);
        assert_relative_eq!(best.tpr, 2.0 / 3.0, epsilon = 1e-12);
        assert_eq!(best.fpr, 0.0);
    }

    #[test]
    fn test_nan_score_terminates() {
        let roc = RocCurve::new(&array![1.0, 0.0, 1.0], &array![0.9, f64::NAN, 0.2]);
        assert_eq!(roc.points.len(), 4);
        let last = roc.points.last().unwrap();
        assert_eq!((last.fpr, last.tpr), (1.0, 1.0));
        assert!(roc.auc.is_finite());
    }

    #[test]
    fn test_csv_export() {
        let roc = RocCurve::new(&array![0.0, 1.0], &array![0.3, 0.6]);
        let mut buf = Vec::new();
        roc.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("threshold,fpr,tpr\n"));
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("inf,0,0"));
    }
}
