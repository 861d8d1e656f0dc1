//! # Census Income Logit
//!
//! A walkthrough of binary classification on the UCI Census Income ("Adult")
//! dataset: load, clean, split, explore, fit two logistic regressions,
//! cross-validate them and score them on a held-out test set.
//!
//! ## Modules
//!
//! - `data` - Metadata parsing, loading, cleaning, stratified splitting, exploration
//! - `models` - Formula parsing, design matrices, logistic regression (IRLS)
//! - `metrics` - ROC/AUC and confusion matrix statistics
//! - `validation` - Stratified k-fold cross-validation
//! - `pipeline` - The end-to-end walkthrough
//! - `utils` - Configuration and logging

pub mod data;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod utils;
pub mod validation;

pub use data::{Cleaner, DataLoader, Frame, NamesFile, StratifiedSplit};
pub use metrics::{ClassificationMetrics, ConfusionMatrix, RocCurve};
pub use models::{DesignSpec, Formula, LogisticRegression};
pub use pipeline::{Pipeline, PipelineReport};
pub use utils::Config;
pub use validation::CrossValidator;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{
        Cleaner, CleaningReport, Column, ColumnData, DataLoader, Frame, NamesFile, StratifiedSplit,
    };
    pub use crate::metrics::{ClassificationMetrics, ConfusionMatrix, RocCurve};
    pub use crate::models::{DesignSpec, Formula, GlmControl, LogisticRegression};
    pub use crate::pipeline::{ModelReport, Pipeline, PipelineReport};
    pub use crate::utils::Config;
    pub use crate::validation::{CVScores, CrossValidator};
}
