//! Command-line entry point for the census income walkthrough
//!
//! - `run`: the full pipeline
//! - `explore`: load, clean, split and print the exploration tables
//! - `init-config`: write the default configuration

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use census_logit::{
    utils::{level_for_verbosity, setup_logging, Config},
    Pipeline,
};

#[derive(Parser)]
#[command(name = "census_logit")]
#[command(version)]
#[command(about = "Logistic regression walkthrough on the UCI Census Income data", long_about = None)]
struct Cli {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides of the configured inputs
#[derive(Args)]
struct DataArgs {
    /// Path to the data file
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Path to the metadata (.names) file
    #[arg(short, long)]
    names: Option<PathBuf>,

    /// Seed of the train/test split
    #[arg(short, long)]
    seed: Option<u64>,
}

impl DataArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(data) = &self.data {
            config.data.data_path = data.clone();
        }
        if let Some(names) = &self.names {
            config.data.names_path = names.clone();
        }
        if let Some(seed) = self.seed {
            config.split.seed = seed;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Number of cross-validation folds
        #[arg(short, long)]
        folds: Option<usize>,

        /// Directory for ROC point CSV files
        #[arg(long)]
        roc_dir: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print exploration tables of the training partition
    Explore {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Write the default configuration
    InitConfig {
        /// Output path
        #[arg(default_value = "config/default.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_ref())?;
    setup_logging(level_for_verbosity(&config.logging.level, cli.verbose))?;
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path.display());
    }

    match cli.command {
        Commands::Run {
            data,
            folds,
            roc_dir,
            json,
        } => {
            data.apply(&mut config);
            if let Some(folds) = folds {
                config.cv.folds = folds;
            }
            if roc_dir.is_some() {
                config.report.roc_csv_dir = roc_dir;
            }
            config.validate()?;

            let report = Pipeline::new(config).run()?;
            if json {
                println!("{}", report.to_json()?);
            } else {
                println!("{}", report.render());
            }
        }

        Commands::Explore { data } => {
            data.apply(&mut config);
            config.validate()?;

            let pipeline = Pipeline::new(config);
            let prepared = pipeline.prepare(pipeline.load()?)?;
            println!("{}", prepared.cleaning.summary());
            println!("{}", pipeline.explore(&prepared)?.report());
        }

        Commands::InitConfig { output } => {
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Config::create_default(&output)?;
            info!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}
