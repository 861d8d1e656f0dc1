//! A logistic regression bound to the design it was fitted on

use super::design::{DesignError, DesignSpec};
use super::formula::Formula;
use super::logistic::{GlmControl, GlmSummary, LogisticRegression, LogisticRegressionError};
use crate::data::Frame;
use ndarray::Array1;
use thiserror::Error;
use tracing::debug;

/// Errors raised while fitting or applying a formula model
#[derive(Error, Debug, PartialEq)]
pub enum FitError {
    #[error(transparent)]
    Design(#[from] DesignError),

    #[error(transparent)]
    Model(#[from] LogisticRegressionError),
}

/// Design and coefficients of one fitted formula
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub formula: Formula,
    pub design: DesignSpec,
    pub model: LogisticRegression,
}

impl FittedModel {
    /// Encode `frame` with `formula` and fit by IRLS
    pub fn fit(
        formula: &Formula,
        frame: &Frame,
        positive_class: &str,
        control: GlmControl,
    ) -> Result<Self, FitError> {
        let design = DesignSpec::new(formula, frame, positive_class)?;
        let x = design.matrix(frame)?;
        let y = design.response(frame)?;

        let mut model = LogisticRegression::new(control, design.intercept);
        model.fit(&x, &y)?;
        debug!(
            "Fitted '{}' on {} rows, {} columns, rank {}",
            formula,
            x.nrows(),
            x.ncols(),
            model.rank()
        );

        Ok(Self {
            formula: formula.clone(),
            design,
            model,
        })
    }

    /// Positive-class probabilities for the rows of `frame`
    pub fn predict_proba(&self, frame: &Frame) -> Result<Array1<f64>, FitError> {
        let x = self.design.matrix(frame)?;
        Ok(self.model.predict_proba(&x)?)
    }

    /// 0/1 response of `frame`
    pub fn response(&self, frame: &Frame) -> Result<Array1<f64>, FitError> {
        Ok(self.design.response(frame)?)
    }

    pub fn glm_summary(&self) -> Result<GlmSummary, FitError> {
        Ok(self.model.glm_summary(Some(self.design.column_names()))?)
    }

    /// R-like coefficient table
    pub fn summary(&self) -> String {
        format!(
            "Formula: {}\n\n{}",
            self.formula,
            self.model.summary(Some(self.design.column_names()))
        )
    }
}
