//! Configuration management
//!
//! This module handles loading and managing configuration.

use crate::models::GlmControl;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Input files and cleaning rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_path: PathBuf,
    pub names_path: PathBuf,
    pub outcome_name: String,
    pub missing_token: String,
    pub capital_gain_column: String,
    pub capital_gain_sentinel: f64,
    pub drop_columns: Vec<String>,
    /// Outcome level modelled as 1, in identifier form
    pub positive_class: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/adult.data"),
            names_path: PathBuf::from("data/adult.names"),
            outcome_name: "income".to_string(),
            missing_token: "?".to_string(),
            capital_gain_column: "capital_gain".to_string(),
            capital_gain_sentinel: 99999.0,
            drop_columns: vec![
                "fnlwgt".to_string(),
                "education".to_string(),
                "relationship".to_string(),
                "capital_loss".to_string(),
                "native_country".to_string(),
            ],
            positive_class: "X_50K".to_string(),
        }
    }
}

/// Train/test partition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub train_fraction: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            seed: 42,
        }
    }
}

/// Cross-validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CvConfig {
    pub folds: usize,
    pub seed: u64,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self { folds: 10, seed: 42 }
    }
}

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub max_iter: usize,
    pub tolerance: f64,
    /// Probability cut-off for the positive class
    pub threshold: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_iter: 25,
            tolerance: 1e-8,
            threshold: 0.5,
        }
    }
}

impl TrainingConfig {
    pub fn glm_control(&self) -> GlmControl {
        GlmControl {
            epsilon: self.tolerance,
            max_iter: self.max_iter,
        }
    }
}

/// A named model formula
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    pub formula: String,
}

fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            name: "small".to_string(),
            formula: "income ~ age + education_num + sex + hours_per_week + capital_gain"
                .to_string(),
        },
        ModelConfig {
            name: "interactions".to_string(),
            formula: "income ~ age + I(age^2) + education_num + sex*hours_per_week \
                      + marital_status + occupation + workclass + race + capital_gain"
                .to_string(),
        },
    ]
}

/// Report output
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory receiving one `roc_<model>.csv` per model
    pub roc_csv_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub split: SplitConfig,
    pub cv: CvConfig,
    pub training: TrainingConfig,
    pub models: Vec<ModelConfig>,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            split: SplitConfig::default(),
            cv: CvConfig::default(),
            training: TrainingConfig::default(),
            models: default_models(),
            report: ReportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Values are not validated here; call [`Config::validate`] once command-line
    /// overrides have been applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from file, or the defaults when no path is given
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create default configuration file
    pub fn create_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        config.save(path)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let f = self.split.train_fraction;
        if !(f > 0.0 && f < 1.0) {
            bail!("split.train_fraction must lie in (0, 1), got {}", f);
        }
        if self.cv.folds < 2 {
            bail!("cv.folds must be at least 2, got {}", self.cv.folds);
        }
        if self.training.max_iter == 0 {
            bail!("training.max_iter must be positive");
        }
        if !(self.training.tolerance > 0.0) {
            bail!("training.tolerance must be positive, got {}", self.training.tolerance);
        }
        let t = self.training.threshold;
        if !(t > 0.0 && t < 1.0) {
            bail!("training.threshold must lie in (0, 1), got {}", t);
        }
        if self.models.is_empty() {
            bail!("at least one [[models]] entry is required");
        }
        for (i, model) in self.models.iter().enumerate() {
            if self.models[..i].iter().any(|m| m.name == model.name) {
                bail!("duplicate model name '{}'", model.name);
            }
        }
        if self.data.missing_token.is_empty() {
            bail!("data.missing_token must not be empty");
        }
        Ok(())
    }
}
