//! Classification metrics for evaluating binary classifiers
//!
//! The statistics follow the layout of caret's `confusionMatrix`: accuracy
//! with an exact binomial interval, a test against the no-information rate,
//! Cohen's kappa, McNemar's test and the per-class rates.

use ndarray::Array1;
use serde::Serialize;
use statrs::distribution::{Beta, ChiSquared, ContinuousCDF};

/// Confusion matrix for binary classification
#[derive(Debug, Clone, Serialize)]
pub struct ConfusionMatrix {
    /// True positives
    pub tp: usize,
    /// True negatives
    pub tn: usize,
    /// False positives
    pub fp: usize,
    /// False negatives
    pub fn_: usize,
    /// Label of the class encoded 1
    pub positive: String,
    /// Label of the class encoded 0
    pub negative: String,
}

impl ConfusionMatrix {
    /// Calculate confusion matrix from 0/1 predictions
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut tp = 0;
        let mut tn = 0;
        let mut fp = 0;
        let mut fn_ = 0;

        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            match (t >= 0.5, p >= 0.5) {
                (true, true) => tp += 1,
                (false, false) => tn += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
            }
        }

        Self {
            tp,
            tn,
            fp,
            fn_,
            positive: "1".to_string(),
            negative: "0".to_string(),
        }
    }

    /// Confusion matrix of probabilities cut at `threshold`
    pub fn at_threshold(y_true: &Array1<f64>, y_proba: &Array1<f64>, threshold: f64) -> Self {
        let y_pred = y_proba.mapv(|p| if p >= threshold { 1.0 } else { 0.0 });
        Self::from_predictions(y_true, &y_pred)
    }

    /// Name the two classes
    pub fn with_labels(mut self, positive: impl Into<String>, negative: impl Into<String>) -> Self {
        self.positive = positive.into();
        self.negative = negative.into();
        self
    }

    /// Total samples
    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Print formatted confusion matrix
    pub fn display(&self) -> String {
        let width = self.positive.len().max(self.negative.len()).max(8);
        format!(
            "Confusion Matrix:\n\
             \n\
             {:>w$}  {:>w$} {:>w$}\n\
             {:>w$}  {:>w$} {:>w$}\n\
             {:>w$}  {:>w$} {:>w$}\n\
             (rows: prediction, columns: reference)\n",
            "",
            self.negative,
            self.positive,
            self.negative,
            self.tn,
            self.fn_,
            self.positive,
            self.fp,
            self.tp,
            w = width
        )
    }
}

/// Collection of classification metrics
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationMetrics {
    /// Confusion matrix
    pub confusion_matrix: ConfusionMatrix,
    /// Probability cut-off for the positive class
    pub threshold: f64,
    pub accuracy: f64,
    /// Exact 95% interval for the accuracy
    pub accuracy_ci: (f64, f64),
    /// Share of the larger reference class
    pub no_information_rate: f64,
    /// One-sided binomial p-value of accuracy > NIR
    pub accuracy_p_value: f64,
    /// Cohen's kappa
    pub kappa: f64,
    /// McNemar's test p-value; `None` without off-diagonal counts
    pub mcnemar_p_value: Option<f64>,
    /// Sensitivity (recall)
    pub sensitivity: f64,
    pub specificity: f64,
    /// Positive predictive value (precision)
    pub pos_pred_value: f64,
    pub neg_pred_value: f64,
    pub prevalence: f64,
    pub detection_rate: f64,
    pub detection_prevalence: f64,
    pub balanced_accuracy: f64,
    /// F1 score
    pub f1: f64,
    /// Matthews Correlation Coefficient
    pub mcc: f64,
    /// AUC-ROC (if probabilities provided)
    pub auc_roc: Option<f64>,
    /// Log loss (if probabilities provided)
    pub log_loss: Option<f64>,
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

/// Clopper-Pearson interval for `x` successes in `n` trials
pub fn binomial_ci(x: usize, n: usize, level: f64) -> (f64, f64) {
    if n == 0 {
        return (0.0, 1.0);
    }
    let alpha = 1.0 - level;
    let lower = if x == 0 {
        0.0
    } else {
        Beta::new(x as f64, (n - x + 1) as f64)
            .map(|b| b.inverse_cdf(alpha / 2.0))
            .unwrap_or(0.0)
    };
    let upper = if x == n {
        1.0
    } else {
        Beta::new((x + 1) as f64, (n - x) as f64)
            .map(|b| b.inverse_cdf(1.0 - alpha / 2.0))
            .unwrap_or(1.0)
    };
    (lower, upper)
}

/// P(X >= x) for X ~ Binomial(n, p)
pub fn binomial_upper_tail(x: usize, n: usize, p: f64) -> f64 {
    if x == 0 {
        return 1.0;
    }
    if x > n {
        return 0.0;
    }
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }
    // Regularized incomplete beta identity
    Beta::new(x as f64, (n - x + 1) as f64)
        .map(|b| b.cdf(p))
        .unwrap_or(f64::NAN)
}

/// McNemar's chi-squared test with continuity correction
pub fn mcnemar_p_value(b: usize, c: usize) -> Option<f64> {
    if b + c == 0 {
        return None;
    }
    let diff = (b as f64 - c as f64).abs() - 1.0;
    let stat = diff * diff / (b + c) as f64;
    ChiSquared::new(1.0).ok().map(|chi2| 1.0 - chi2.cdf(stat))
}

impl ClassificationMetrics {
    /// Calculate all metrics from binary predictions
    pub fn calculate(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred);
        Self::from_confusion(cm, 0.5, None, None)
    }

    /// Calculate metrics from probabilities cut at `threshold`, with AUC and log loss
    pub fn from_probabilities(y_true: &Array1<f64>, y_proba: &Array1<f64>, threshold: f64) -> Self {
        let cm = ConfusionMatrix::at_threshold(y_true, y_proba, threshold);
        let auc = super::roc::auc_roc(y_true, y_proba);
        let ll = Self::log_loss(y_true, y_proba);
        Self::from_confusion(cm, threshold, Some(auc), Some(ll))
    }

    /// Name the classes of the underlying confusion matrix
    pub fn with_labels(mut self, positive: impl Into<String>, negative: impl Into<String>) -> Self {
        self.confusion_matrix = self.confusion_matrix.with_labels(positive, negative);
        self
    }

    fn from_confusion(
        cm: ConfusionMatrix,
        threshold: f64,
        auc_roc: Option<f64>,
        log_loss: Option<f64>,
    ) -> Self {
        let n = cm.total();
        let correct = cm.tp + cm.tn;
        let accuracy = ratio(correct, n);

        let n_pos = cm.tp + cm.fn_;
        let n_neg = cm.tn + cm.fp;
        let no_information_rate = ratio(n_pos.max(n_neg), n);

        let sensitivity = ratio(cm.tp, n_pos);
        let specificity = ratio(cm.tn, n_neg);
        let pos_pred_value = ratio(cm.tp, cm.tp + cm.fp);
        let neg_pred_value = ratio(cm.tn, cm.tn + cm.fn_);

        let f1 = if pos_pred_value + sensitivity > 0.0 {
            2.0 * pos_pred_value * sensitivity / (pos_pred_value + sensitivity)
        } else {
            0.0
        };

        Self {
            threshold,
            accuracy,
            accuracy_ci: binomial_ci(correct, n, 0.95),
            no_information_rate,
            accuracy_p_value: binomial_upper_tail(correct, n, no_information_rate),
            kappa: Self::kappa_from_cm(&cm),
            mcnemar_p_value: mcnemar_p_value(cm.fp, cm.fn_),
            sensitivity,
            specificity,
            pos_pred_value,
            neg_pred_value,
            prevalence: ratio(n_pos, n),
            detection_rate: ratio(cm.tp, n),
            detection_prevalence: ratio(cm.tp + cm.fp, n),
            balanced_accuracy: (sensitivity + specificity) / 2.0,
            f1,
            mcc: Self::mcc_from_cm(&cm),
            auc_roc,
            log_loss,
            confusion_matrix: cm,
        }
    }

    /// Cohen's kappa: agreement beyond chance
    fn kappa_from_cm(cm: &ConfusionMatrix) -> f64 {
        let n = cm.total() as f64;
        if n == 0.0 {
            return 0.0;
        }
        let observed = (cm.tp + cm.tn) as f64 / n;
        let expected = ((cm.tp + cm.fp) as f64 * (cm.tp + cm.fn_) as f64
            + (cm.tn + cm.fn_) as f64 * (cm.tn + cm.fp) as f64)
            / (n * n);
        if (1.0 - expected).abs() < 1e-12 {
            return 0.0;
        }
        (observed - expected) / (1.0 - expected)
    }

    /// Matthews Correlation Coefficient
    fn mcc_from_cm(cm: &ConfusionMatrix) -> f64 {
        let tp = cm.tp as f64;
        let tn = cm.tn as f64;
        let fp = cm.fp as f64;
        let fn_ = cm.fn_ as f64;

        let denom = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        if denom < 1e-10 {
            return 0.0;
        }
        (tp * tn - fp * fn_) / denom
    }

    /// Log Loss (Binary Cross-Entropy)
    fn log_loss(y_true: &Array1<f64>, y_proba: &Array1<f64>) -> f64 {
        let eps = 1e-15;
        let n = y_true.len().max(1) as f64;

        -y_true
            .iter()
            .zip(y_proba.iter())
            .map(|(&t, &p)| {
                let p_clipped = p.clamp(eps, 1.0 - eps);
                t * p_clipped.ln() + (1.0 - t) * (1.0 - p_clipped).ln()
            })
            .sum::<f64>()
            / n
    }

    /// Print a summary report
    pub fn report(&self) -> String {
        let mut s = String::new();
        s.push_str(&self.confusion_matrix.display());
        s.push('\n');
        s.push_str(&format!(
            "               Accuracy : {:.4}\n",
            self.accuracy
        ));
        s.push_str(&format!(
            "                 95% CI : ({:.4}, {:.4})\n",
            self.accuracy_ci.0, self.accuracy_ci.1
        ));
        s.push_str(&format!(
            "    No Information Rate : {:.4}\n",
            self.no_information_rate
        ));
        s.push_str(&format!(
            "    P-Value [Acc > NIR] : {:.4e}\n\n",
            self.accuracy_p_value
        ));
        s.push_str(&format!("                  Kappa : {:.4}\n\n", self.kappa));
        match self.mcnemar_p_value {
            Some(p) => s.push_str(&format!(" Mcnemar's Test P-Value : {:.4e}\n\n", p)),
            None => s.push_str(" Mcnemar's Test P-Value : NA\n\n"),
        }
        s.push_str(&format!("            Sensitivity : {:.4}\n", self.sensitivity));
        s.push_str(&format!("            Specificity : {:.4}\n", self.specificity));
        s.push_str(&format!("         Pos Pred Value : {:.4}\n", self.pos_pred_value));
        s.push_str(&format!("         Neg Pred Value : {:.4}\n", self.neg_pred_value));
        s.push_str(&format!("             Prevalence : {:.4}\n", self.prevalence));
        s.push_str(&format!("         Detection Rate : {:.4}\n", self.detection_rate));
        s.push_str(&format!(
            "   Detection Prevalence : {:.4}\n",
            self.detection_prevalence
        ));
        s.push_str(&format!(
            "      Balanced Accuracy : {:.4}\n",
            self.balanced_accuracy
        ));
        s.push_str(&format!("                     F1 : {:.4}\n", self.f1));
        s.push_str(&format!("                    MCC : {:.4}\n", self.mcc));
        if let Some(auc) = self.auc_roc {
            s.push_str(&format!("                AUC-ROC : {:.4}\n", auc));
        }
        if let Some(ll) = self.log_loss {
            s.push_str(&format!("               Log Loss : {:.4}\n", ll));
        }
        s.push_str(&format!(
            "\n       'Positive' Class : {}\n",
            self.confusion_matrix.positive
        ));

        s
    }
}
