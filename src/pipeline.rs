//! The end-to-end walkthrough
//!
//! load -> clean -> split -> explore -> train -> cross-validate -> predict -> evaluate

use crate::data::{
    class_proportions, to_identifier, Cleaner, CleaningReport, DataLoader, Exploration, Frame,
    NamesFile, StratifiedSplit,
};
use crate::metrics::{ClassificationMetrics, RocCurve};
use crate::models::{FittedModel, Formula, GlmSummary};
use crate::utils::{Config, ModelConfig};
use crate::validation::{CVReport, CrossValidator};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::info;

/// Cleaned data and its train/test partition
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub frame: Frame,
    pub cleaning: CleaningReport,
    pub split: StratifiedSplit,
    pub train: Frame,
    pub test: Frame,
    pub positive_class: String,
    pub negative_class: String,
}

/// Partition sizes and class shares
#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub seed: u64,
    pub train_fraction: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub overall_proportions: Vec<(String, f64)>,
    pub train_proportions: Vec<(String, f64)>,
    pub test_proportions: Vec<(String, f64)>,
}

impl SplitSummary {
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str("Train/Test Split\n");
        s.push_str("================\n");
        s.push_str(&format!(
            "  Seed {}, train fraction {:.2}: {} train / {} test rows\n",
            self.seed, self.train_fraction, self.n_train, self.n_test
        ));
        s.push_str(&format!("  {:12} {:>8} {:>8} {:>8}\n", "class", "all", "train", "test"));
        for (i, (level, p)) in self.overall_proportions.iter().enumerate() {
            let train = self.train_proportions.get(i).map_or(0.0, |x| x.1);
            let test = self.test_proportions.get(i).map_or(0.0, |x| x.1);
            s.push_str(&format!(
                "  {:12} {:>8.4} {:>8.4} {:>8.4}\n",
                level, p, train, test
            ));
        }
        s
    }
}

/// Everything reported for one model
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub name: String,
    pub formula: String,
    pub fit: GlmSummary,
    #[serde(skip)]
    pub fit_text: String,
    pub cv: CVReport,
    pub test_roc: RocCurve,
    /// Threshold maximizing Youden's J on the test set
    pub youden_threshold: Option<f64>,
    pub test_metrics: ClassificationMetrics,
}

impl ModelReport {
    pub fn summary(&self) -> String {
        let mut s = String::new();
        let title = format!("Model '{}'", self.name);
        s.push_str(&format!("{}\n{}\n\n", title, "=".repeat(title.len())));
        s.push_str(&self.fit_text);
        s.push('\n');
        s.push_str(&self.cv.summary());
        s.push_str(&format!("\nTest set ROC AUC: {:.4}", self.test_roc.auc));
        if let Some(t) = self.youden_threshold {
            s.push_str(&format!(" (Youden threshold {:.4})", t));
        }
        s.push_str("\n\n");
        s.push_str(&self.test_metrics.report());
        s
    }
}

/// Result of a full pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub cleaning: CleaningReport,
    pub split: SplitSummary,
    pub exploration: Exploration,
    pub models: Vec<ModelReport>,
}

impl PipelineReport {
    /// Side-by-side comparison of the models
    pub fn comparison(&self) -> String {
        let mut s = String::new();
        s.push_str("Model Comparison\n");
        s.push_str("================\n");
        s.push_str(&format!(
            "  {:14} {:>6} {:>10} {:>10} {:>9} {:>9} {:>9} {:>9}\n",
            "model", "coefs", "AIC", "CV ROC", "CV sd", "test AUC", "accuracy", "kappa"
        ));
        for m in &self.models {
            s.push_str(&format!(
                "  {:14} {:>6} {:>10.2} {:>10.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4}\n",
                m.name,
                m.fit.coefficients.len(),
                m.fit.aic,
                m.cv.roc.mean,
                m.cv.roc.std,
                m.test_roc.auc,
                m.test_metrics.accuracy,
                m.test_metrics.kappa
            ));
        }
        s
    }

    /// Full text report
    pub fn render(&self) -> String {
        let mut s = String::new();
        s.push_str(&self.cleaning.summary());
        s.push('\n');
        s.push_str(&self.split.summary());
        s.push('\n');
        s.push_str(&self.exploration.report());
        for model in &self.models {
            s.push('\n');
            s.push_str(&model.summary());
        }
        s.push('\n');
        s.push_str(&self.comparison());
        s
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs the walkthrough with one configuration
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load both input files
    pub fn load(&self) -> Result<Frame> {
        let data = &self.config.data;
        let names = NamesFile::load(&data.names_path)?;
        DataLoader::new(&data.missing_token, &data.outcome_name).load(&data.data_path, &names)
    }

    /// Clean and split an already loaded frame
    pub fn prepare(&self, mut frame: Frame) -> Result<PreparedData> {
        let data = &self.config.data;
        let cleaner = Cleaner {
            outcome: data.outcome_name.clone(),
            capital_gain_column: data.capital_gain_column.clone(),
            capital_gain_sentinel: data.capital_gain_sentinel,
            drop_columns: data.drop_columns.clone(),
        };
        let cleaning = cleaner.clean(&mut frame).context("Cleaning failed")?;

        let outcome = to_identifier(&data.outcome_name);
        let positive_class = to_identifier(&data.positive_class);
        let negative_class = cleaning
            .outcome_levels
            .iter()
            .find(|l| **l != positive_class)
            .cloned()
            .ok_or_else(|| anyhow!("Outcome has no level besides '{}'", positive_class))?;
        if !cleaning.outcome_levels.contains(&positive_class) {
            return Err(anyhow!(
                "Positive class '{}' is not an outcome level ({})",
                positive_class,
                cleaning.outcome_levels.join(", ")
            ));
        }

        let split = StratifiedSplit::new(
            &frame,
            &outcome,
            self.config.split.train_fraction,
            self.config.split.seed,
        )?;
        let (train, test) = split.apply(&frame);

        Ok(PreparedData {
            frame,
            cleaning,
            split,
            train,
            test,
            positive_class,
            negative_class,
        })
    }

    fn split_summary(&self, prepared: &PreparedData) -> Result<SplitSummary> {
        let outcome = to_identifier(&self.config.data.outcome_name);
        Ok(SplitSummary {
            seed: self.config.split.seed,
            train_fraction: self.config.split.train_fraction,
            n_train: prepared.split.n_train(),
            n_test: prepared.split.n_test(),
            overall_proportions: class_proportions(&prepared.frame, &outcome)?,
            train_proportions: class_proportions(&prepared.train, &outcome)?,
            test_proportions: class_proportions(&prepared.test, &outcome)?,
        })
    }

    /// Exploratory tables of the training partition
    pub fn explore(&self, prepared: &PreparedData) -> Result<Exploration> {
        let outcome = to_identifier(&self.config.data.outcome_name);
        Ok(Exploration::from_frame(
            &prepared.train,
            &outcome,
            &prepared.positive_class,
        )?)
    }

    /// Cross-validate, refit on the full training partition and score on test
    pub fn evaluate_model(&self, spec: &ModelConfig, prepared: &PreparedData) -> Result<ModelReport> {
        let formula = Formula::parse(&spec.formula)
            .with_context(|| format!("Invalid formula for model '{}'", spec.name))?;
        let control = self.config.training.glm_control();
        let threshold = self.config.training.threshold;

        info!("Cross-validating model '{}'", spec.name);
        let cv = CrossValidator::new(self.config.cv.folds, self.config.cv.seed)
            .with_threshold(threshold)
            .with_control(control)
            .evaluate(&prepared.train, &formula, &prepared.positive_class)
            .with_context(|| format!("Cross-validation of model '{}' failed", spec.name))?;

        info!("Fitting model '{}' on the training partition", spec.name);
        let fitted = FittedModel::fit(&formula, &prepared.train, &prepared.positive_class, control)
            .with_context(|| format!("Fitting model '{}' failed", spec.name))?;

        let proba = fitted.predict_proba(&prepared.test)?;
        let y = fitted.response(&prepared.test)?;
        let test_roc = RocCurve::new(&y, &proba);
        let test_metrics = ClassificationMetrics::from_probabilities(&y, &proba, threshold)
            .with_labels(prepared.positive_class.clone(), prepared.negative_class.clone());
        info!(
            "Model '{}': test AUC {:.4}, accuracy {:.4}",
            spec.name, test_roc.auc, test_metrics.accuracy
        );

        if let Some(dir) = &self.config.report.roc_csv_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let path = dir.join(format!("roc_{}.csv", to_identifier(&spec.name)));
            test_roc.save_csv(&path)?;
            info!("Saved ROC points to {}", path.display());
        }

        Ok(ModelReport {
            name: spec.name.clone(),
            formula: formula.to_string(),
            fit: fitted.glm_summary()?,
            fit_text: fitted.summary(),
            cv,
            youden_threshold: test_roc.youden().map(|p| p.threshold),
            test_roc,
            test_metrics,
        })
    }

    /// Run every step on an already loaded frame
    pub fn run_frame(&self, frame: Frame) -> Result<PipelineReport> {
        info!("Cleaning {} rows", frame.n_rows());
        let prepared = self.prepare(frame)?;
        let split = self.split_summary(&prepared)?;

        info!("Exploring the training partition");
        let exploration = self.explore(&prepared)?;

        let models = self
            .config
            .models
            .iter()
            .map(|spec| self.evaluate_model(spec, &prepared))
            .collect::<Result<Vec<_>>>()?;

        Ok(PipelineReport {
            cleaning: prepared.cleaning,
            split,
            exploration,
            models,
        })
    }

    /// Run the full walkthrough from the configured files
    pub fn run(&self) -> Result<PipelineReport> {
        let frame = self.load()?;
        self.run_frame(frame)
    }
}
