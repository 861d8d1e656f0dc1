//! Model validation

pub mod cross_validation;

pub use cross_validation::{CVReport, CVScores, CVSplit, CrossValidationError, CrossValidator, FoldScore};
