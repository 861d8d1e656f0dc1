//! Utility module
//!
//! This module provides:
//! - Configuration management
//! - Logging setup

mod config;
mod logging;

pub use config::{
    Config, CvConfig, DataConfig, LoggingConfig, ModelConfig, ReportConfig, SplitConfig,
    TrainingConfig,
};
pub use logging::{level_for_verbosity, setup_logging};
