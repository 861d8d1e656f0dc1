//! Model formulas, design matrices and logistic regression

pub mod design;
pub mod fitted;
pub mod formula;
pub mod linalg;
pub mod logistic;

pub use design::{DesignError, DesignSpec};
pub use fitted::{FitError, FittedModel};
pub use formula::{Factor, Formula, FormulaError, Term};
pub use logistic::{
    CoefficientRow, GlmControl, GlmSummary, LogisticRegression, LogisticRegressionError,
};
