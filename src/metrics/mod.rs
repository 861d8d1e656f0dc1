//! Evaluation metrics for the binary income classifier

pub mod classification;
pub mod roc;

pub use classification::{ClassificationMetrics, ConfusionMatrix};
pub use roc::{auc_roc, RocCurve, RocPoint};
