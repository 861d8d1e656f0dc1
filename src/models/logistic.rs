//! Logistic regression for binary classification
//!
//! A binomial GLM with logit link fitted by iteratively reweighted least
//! squares. Coefficient standard errors come from the inverse of the Fisher
//! information at the final weights, and Wald p-values from the standard
//! normal distribution.

use super::linalg::Cholesky;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors for logistic regression
#[derive(Error, Debug, PartialEq)]
pub enum LogisticRegressionError {
    #[error("Model has not been fitted yet")]
    NotFitted,

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("No observations to fit")]
    EmptyData,

    #[error("Response must be 0 or 1, found {0}")]
    InvalidResponse(f64),

    #[error("Invalid control parameter: {0}")]
    InvalidParameter(String),

    #[error("Every coefficient is aliased")]
    Singular,
}

/// IRLS settings, mirroring R's `glm.control`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlmControl {
    /// Relative deviance change that counts as converged
    pub epsilon: f64,
    /// Maximum IRLS iterations
    pub max_iter: usize,
}

impl Default for GlmControl {
    fn default() -> Self {
        Self {
            epsilon: 1e-8,
            max_iter: 25,
        }
    }
}

/// One row of the coefficient table; `None` marks an aliased coefficient
#[derive(Debug, Clone, Serialize)]
pub struct CoefficientRow {
    pub name: String,
    pub estimate: Option<f64>,
    pub std_error: Option<f64>,
    pub z_value: Option<f64>,
    pub p_value: Option<f64>,
}

/// Everything R's `summary.glm` reports
#[derive(Debug, Clone, Serialize)]
pub struct GlmSummary {
    pub coefficients: Vec<CoefficientRow>,
    pub null_deviance: f64,
    pub df_null: usize,
    pub deviance: f64,
    pub df_residual: usize,
    pub aic: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Logistic regression classifier
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    /// Fitted coefficients, zero where aliased
    pub coefficients: Option<Array1<f64>>,
    /// Aliased flag per coefficient
    pub aliased: Vec<bool>,
    /// Standard errors, zero where aliased
    pub std_errors: Option<Array1<f64>>,
    /// Residual deviance after each iteration
    pub deviance_history: Vec<f64>,
    pub null_deviance: f64,
    pub converged: bool,
    n_obs: usize,
    control: GlmControl,
    /// Whether the design carries an intercept column
    intercept: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new(GlmControl::default(), true)
    }
}

/// Probabilities are kept this far from 0 and 1
const MU_EPS: f64 = f64::EPSILON;

impl LogisticRegression {
    /// Create a new model
    ///
    /// # Arguments
    /// * `control` - IRLS settings
    /// * `intercept` - Whether the design matrix includes an intercept column
    pub fn new(control: GlmControl, intercept: bool) -> Self {
        Self {
            coefficients: None,
            aliased: Vec::new(),
            std_errors: None,
            deviance_history: Vec::new(),
            null_deviance: f64::NAN,
            converged: false,
            n_obs: 0,
            control,
            intercept,
        }
    }

    /// Sigmoid activation function
    fn sigmoid(z: f64) -> f64 {
        if z >= 0.0 {
            1.0 / (1.0 + (-z).exp())
        } else {
            let exp_z = z.exp();
            exp_z / (1.0 + exp_z)
        }
    }

    /// Binomial deviance of 0/1 responses
    fn deviance(y: &Array1<f64>, mu: &Array1<f64>) -> f64 {
        -2.0 * y
            .iter()
            .zip(mu.iter())
            .map(|(&y, &p)| {
                let p = p.clamp(MU_EPS, 1.0 - MU_EPS);
                y * p.ln() + (1.0 - y) * (1.0 - p).ln()
            })
            .sum::<f64>()
    }

    /// Fit by iteratively reweighted least squares
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), LogisticRegressionError> {
        let (n, p) = x.dim();
        if n == 0 {
            return Err(LogisticRegressionError::EmptyData);
        }
        if y.len() != n {
            return Err(LogisticRegressionError::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }
        if let Some(&bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(LogisticRegressionError::InvalidResponse(bad));
        }
        if !(self.control.epsilon > 0.0) || self.control.max_iter == 0 {
            return Err(LogisticRegressionError::InvalidParameter(format!(
                "epsilon {} and max_iter {} must be positive",
                self.control.epsilon, self.control.max_iter
            )));
        }

        // Start from mu = (y + 0.5) / 2, as R's binomial family does
        let mut mu = y.mapv(|v| (v + 0.5) / 2.0);
        let mut eta = mu.mapv(|m| (m / (1.0 - m)).ln());
        let mut dev_old = Self::deviance(y, &mu);
        let mut beta = Array1::<f64>::zeros(p);

        self.deviance_history.clear();
        self.converged = false;

        for iter in 1..=self.control.max_iter {
            let w = mu.mapv(|m| (m * (1.0 - m)).max(MU_EPS));
            let z = &eta + &((y - &mu) / &w);

            let xw = x * &w.view().insert_axis(Axis(1));
            let xtwx = xw.t().dot(x);
            let xtwz = xw.t().dot(&z);

            let factor = Cholesky::new(&xtwx);
            if factor.rank() == 0 {
                return Err(LogisticRegressionError::Singular);
            }
            beta = factor.solve(&xtwz);

            eta = x.dot(&beta);
            mu = eta.mapv(Self::sigmoid);
            let dev = Self::deviance(y, &mu);
            self.deviance_history.push(dev);
            debug!("IRLS iteration {}: deviance {:.6}", iter, dev);

            if (dev - dev_old).abs() / (dev.abs() + 0.1) < self.control.epsilon {
                self.converged = true;
                break;
            }
            dev_old = dev;
        }

        if !self.converged {
            warn!(
                "Logistic regression did not converge in {} iterations",
                self.control.max_iter
            );
        }
        if mu.iter().any(|&m| m <= 10.0 * MU_EPS || m >= 1.0 - 10.0 * MU_EPS) {
            warn!("Fitted probabilities numerically 0 or 1 occurred");
        }

        // Fisher information at the final estimate
        let w = mu.mapv(|m| (m * (1.0 - m)).max(MU_EPS));
        let xw = x * &w.view().insert_axis(Axis(1));
        let info = Cholesky::new(&xw.t().dot(x));
        if info.rank() == 0 {
            return Err(LogisticRegressionError::Singular);
        }
        let cov = info.inverse();

        self.aliased = info.aliased().to_vec();
        for (b, aliased) in beta.iter_mut().zip(&self.aliased) {
            if *aliased {
                *b = 0.0;
            }
        }
        self.std_errors = Some(cov.diag().mapv(|v| v.max(0.0).sqrt()));
        self.coefficients = Some(beta);
        self.n_obs = n;

        let mu_null = if self.intercept {
            y.mean().unwrap_or(0.5)
        } else {
            0.5
        };
        self.null_deviance = Self::deviance(y, &Array1::from_elem(n, mu_null));

        Ok(())
    }

    fn weights(&self, n_features: usize) -> Result<&Array1<f64>, LogisticRegressionError> {
        let weights = self
            .coefficients
            .as_ref()
            .ok_or(LogisticRegressionError::NotFitted)?;
        if weights.len() != n_features {
            return Err(LogisticRegressionError::DimensionMismatch {
                expected: weights.len(),
                got: n_features,
            });
        }
        Ok(weights)
    }

    /// Get decision function values (log-odds)
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, LogisticRegressionError> {
        let weights = self.weights(x.ncols())?;
        Ok(x.dot(weights))
    }

    /// Predict probabilities of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, LogisticRegressionError> {
        Ok(self.decision_function(x)?.mapv(Self::sigmoid))
    }

    /// Predict class labels (0 or 1)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, LogisticRegressionError> {
        self.predict_with_threshold(x, 0.5)
    }

    /// Predict with custom threshold
    pub fn predict_with_threshold(
        &self,
        x: &Array2<f64>,
        threshold: f64,
    ) -> Result<Array1<f64>, LogisticRegressionError> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= threshold { 1.0 } else { 0.0 }))
    }

    /// Number of estimable coefficients
    pub fn rank(&self) -> usize {
        self.aliased.iter().filter(|a| !**a).count()
    }

    pub fn deviance_value(&self) -> Option<f64> {
        self.deviance_history.last().copied()
    }

    /// Coefficient table and fit statistics
    pub fn glm_summary(
        &self,
        feature_names: Option<&[String]>,
    ) -> Result<GlmSummary, LogisticRegressionError> {
        let coef = self
            .coefficients
            .as_ref()
            .ok_or(LogisticRegressionError::NotFitted)?;
        let se = self
            .std_errors
            .as_ref()
            .ok_or(LogisticRegressionError::NotFitted)?;
        let deviance = self.deviance_value().ok_or(LogisticRegressionError::NotFitted)?;
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| LogisticRegressionError::InvalidParameter(e.to_string()))?;

        let coefficients = coef
            .iter()
            .zip(se.iter())
            .zip(&self.aliased)
            .enumerate()
            .map(|(i, ((&b, &s), &aliased))| {
                let name = feature_names
                    .and_then(|names| names.get(i).cloned())
                    .unwrap_or_else(|| format!("x{}", i + 1));
                if aliased {
                    return CoefficientRow {
                        name,
                        estimate: None,
                        std_error: None,
                        z_value: None,
                        p_value: None,
                    };
                }
                let z = b / s;
                CoefficientRow {
                    name,
                    estimate: Some(b),
                    std_error: Some(s),
                    z_value: Some(z),
                    p_value: Some(wald_p_value(&normal, z)),
                }
            })
            .collect();

        let rank = self.rank();
        Ok(GlmSummary {
            coefficients,
            null_deviance: self.null_deviance,
            df_null: self.n_obs - usize::from(self.intercept),
            deviance,
            df_residual: self.n_obs.saturating_sub(rank),
            aic: deviance + 2.0 * rank as f64,
            iterations: self.deviance_history.len(),
            converged: self.converged,
        })
    }

    /// Get model summary
    pub fn summary(&self, feature_names: Option<&[String]>) -> String {
        let mut s = String::new();
        s.push_str("Logistic Regression Summary\n");
        s.push_str("===========================\n\n");

        let Ok(glm) = self.glm_summary(feature_names) else {
            s.push_str("Model not fitted yet.\n");
            return s;
        };

        let width = glm
            .coefficients
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max(12);

        s.push_str(&format!(
            "{:width$} {:>12} {:>12} {:>9} {:>11}\n",
            "",
            "Estimate",
            "Std. Error",
            "z value",
            "Pr(>|z|)",
            width = width
        ));
        for row in &glm.coefficients {
            match (row.estimate, row.std_error, row.z_value, row.p_value) {
                (Some(b), Some(se), Some(z), Some(p)) => s.push_str(&format!(
                    "{:width$} {:>12.6} {:>12.6} {:>9.3} {:>11.4e} {}\n",
                    row.name,
                    b,
                    se,
                    z,
                    p,
                    significance_stars(p),
                    width = width
                )),
                _ => s.push_str(&format!(
                    "{:width$} {:>12} {:>12} {:>9} {:>11}\n",
                    row.name,
                    "NA",
                    "NA",
                    "NA",
                    "NA",
                    width = width
                )),
            }
        }
        s.push_str("---\nSignif. codes:  0 '***' 0.001 '**' 0.01 '*' 0.05 '.' 0.1 ' ' 1\n\n");

        let n_aliased = self.aliased.iter().filter(|a| **a).count();
        if n_aliased > 0 {
            s.push_str(&format!(
                "Coefficients: ({} not defined because of singularities)\n",
                n_aliased
            ));
        }
        s.push_str(&format!(
            "    Null deviance: {:.2}  on {} degrees of freedom\n",
            glm.null_deviance, glm.df_null
        ));
        s.push_str(&format!(
            "Residual deviance: {:.2}  on {} degrees of freedom\n",
            glm.deviance, glm.df_residual
        ));
        s.push_str(&format!("AIC: {:.2}\n\n", glm.aic));
        s.push_str(&format!(
            "Number of Fisher Scoring iterations: {}{}\n",
            glm.iterations,
            if glm.converged { "" } else { " (not converged)" }
        ));

        s
    }
}

/// Two-sided Wald p-value from the lower tail
fn wald_p_value(normal: &Normal, z: f64) -> f64 {
    2.0 * normal.cdf(-z.abs())
}

/// R's significance codes
pub fn significance_stars(p: f64) -> &'static str {
    match p {
        p if p < 0.001 => "***",
        p if p < 0.01 => "**",
        p if p < 0.05 => "*",
        p if p < 0.1 => ".",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Intercept plus a binary predictor: 1/4 positives at x = 0, 3/4 at x = 1
    fn grouped() -> (Array2<f64>, Array1<f64>) {
        let xs = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let ys = [1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0];
        let x = Array2::from_shape_fn((8, 2), |(i, j)| if j == 0 { 1.0 } else { xs[i] });
        (x, Array1::from_vec(ys.to_vec()))
    }

    #[test]
    fn test_sigmoid() {
        assert!((LogisticRegression::sigmoid(0.0) - 0.5).abs() < 1e-10);
        assert!(LogisticRegression::sigmoid(100.0) > 0.99);
        assert!(LogisticRegression::sigmoid(-100.0) < 0.01);
    }

    #[test]
    fn test_closed_form_estimates() {
        let (x, y) = grouped();
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        assert!(model.converged);

        let coef = model.coefficients.as_ref().unwrap();
        let ln3 = 3.0_f64.ln();
        assert_relative_eq!(coef[0], -ln3, epsilon = 1e-5);
        assert_relative_eq!(coef[1], 2.0 * ln3, epsilon = 1e-5);

        let se = model.std_errors.as_ref().unwrap();
        assert_relative_eq!(se[0], (4.0_f64 / 3.0).sqrt(), epsilon = 1e-4);
        assert_relative_eq!(se[1], (8.0_f64 / 3.0).sqrt(), epsilon = 1e-4);

        let summary = model.glm_summary(None).unwrap();
        let deviance = -4.0 * (0.25_f64.ln() + 3.0 * 0.75_f64.ln());
        assert_relative_eq!(summary.deviance, deviance, epsilon = 1e-6);
        assert_relative_eq!(summary.null_deviance, 16.0 * 2.0_f64.ln(), epsilon = 1e-9);
        assert_relative_eq!(summary.aic, deviance + 4.0, epsilon = 1e-6);
        assert_eq!(summary.df_null, 7);
        assert_eq!(summary.df_residual, 6);
    }

    #[test]
    fn test_aliased_column() {
        let (x, y) = grouped();
        let x3 = Array2::from_shape_fn((8, 4), |(i, j)| match j {
            0 | 1 => x[[i, j]],
            2 => x[[i, 1]],
            _ => 0.0,
        });

        let mut model = LogisticRegression::default();
        model.fit(&x3, &y).unwrap();

        assert_eq!(model.aliased, vec![false, false, true, true]);
        assert_eq!(model.rank(), 2);

        let names: Vec<String> = ["(Intercept)", "x", "x_copy", "zero"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let summary = model.glm_summary(Some(&names)).unwrap();
        assert!(summary.coefficients[2].estimate.is_none());
        assert_relative_eq!(
            summary.coefficients[1].estimate.unwrap(),
            2.0 * 3.0_f64.ln(),
            epsilon = 1e-5
        );
        assert!(model.summary(Some(&names)).contains("2 not defined because of singularities"));

        let proba = model.predict_proba(&x3).unwrap();
        assert_relative_eq!(proba[0], 0.25, epsilon = 1e-6);
        assert_relative_eq!(proba[7], 0.75, epsilon = 1e-6);
    }

    #[test]
    fn test_separable_data_still_fits() {
        let x = Array2::from_shape_vec(
            (6, 2),
            vec![1.0, 0.0, 1.0, 0.5, 1.0, 1.0, 1.0, 5.0, 1.0, 5.5, 1.0, 6.0],
        )
        .unwrap();
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);

        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();

        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_errors() {
        let model = LogisticRegression::default();
        let x = Array2::<f64>::zeros((2, 2));
        assert_eq!(
            model.predict_proba(&x).unwrap_err(),
            LogisticRegressionError::NotFitted
        );

        let mut model = LogisticRegression::default();
        assert_eq!(
            model.fit(&x, &Array1::from_vec(vec![0.0])).unwrap_err(),
            LogisticRegressionError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
        assert_eq!(
            model.fit(&x, &Array1::from_vec(vec![0.0, 2.0])).unwrap_err(),
            LogisticRegressionError::InvalidResponse(2.0)
        );
        assert_eq!(
            model
                .fit(&Array2::zeros((0, 2)), &Array1::zeros(0))
                .unwrap_err(),
            LogisticRegressionError::EmptyData
        );

        let (x, y) = grouped();
        model.fit(&x, &y).unwrap();
        assert!(matches!(
            model.predict_proba(&Array2::zeros((1, 3))).unwrap_err(),
            LogisticRegressionError::DimensionMismatch { .. }
        ));
    }

    #[test]
    fn test_wald_p_value_large_z() {
        let normal = Normal::new(0.0, 1.0).unwrap();
        assert_relative_eq!(wald_p_value(&normal, 1.959964), 0.05, epsilon = 1e-6);
        assert_relative_eq!(wald_p_value(&normal, -10.0), 1.523971e-23, max_relative = 1e-5);
        assert!(wald_p_value(&normal, 24.8) > 0.0);
    }

    #[test]
    fn test_significance_stars() {
        assert_eq!(significance_stars(0.0001), "***");
        assert_eq!(significance_stars(0.03), "*");
        assert_eq!(significance_stars(0.5), "");
    }
}
