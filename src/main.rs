// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Repeated-holdout evaluation CLI
//!
//! Usage:
//!   holdout-eval ./datasets 10 false
//!   holdout-eval ./datasets 30 true --methods Majority,GaussianNaiveBayes --model-dir models

use anyhow::Result;
use clap::Parser;
use holdout_eval::{select_classifiers, EvaluationHarness, FsDatasetSource, HarnessConfig, ModelStore};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "holdout-eval")]
#[command(about = "Evaluate classifiers with repeated holdout")]
#[command(version)]
struct Args {
    /// Folder holding one sub-folder per data set (named by its feature count)
    data_set_folder: PathBuf,

    /// Trials per (method, data set) pair
    number_of_repetitions: String,

    /// Append empty instances to every testing set (true or false)
    test_empty_instances: String,

    /// Fraction of each data set used for training
    #[arg(long, default_value_t = 0.7)]
    ratio: f64,

    /// Floor of the prime seed sequence
    #[arg(long, default_value_t = 2)]
    first_seed: u64,

    /// Prefix of saved model identifiers
    #[arg(long, default_value = "AntiSpamClassifier")]
    namespace: String,

    /// Directory for saved models (persistence disabled when absent)
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Methods to evaluate (comma-separated, empty = all)
    #[arg(short, long)]
    methods: Option<String>,

    /// What to do when a data set cannot be loaded (skip, abort)
    #[arg(long, default_value = "skip")]
    on_load_error: String,
}

fn build_config(args: &Args) -> Result<HarnessConfig, holdout_eval::ConfigError> {
    let mut config = HarnessConfig::from_args(
        &args.data_set_folder,
        &args.number_of_repetitions,
        &args.test_empty_instances,
    )?;
    config.split_ratio = args.ratio;
    config.first_seed = args.first_seed;
    config.namespace = args.namespace.clone();
    config.model_dir = args.model_dir.clone();
    config.methods = args
        .methods
        .as_deref()
        .map(|m| m.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    config.on_load_error = args.on_load_error.parse()?;
    config.validate()?;
    Ok(config)
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    // Initialize logging; stdout is reserved for the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Repeated-holdout evaluation");
    tracing::info!("Data sets: {}", config.base_folder.display());
    tracing::info!("Repetitions: {}", config.repetitions);
    tracing::info!("Empty instances: {}", config.include_empty_instances);
    tracing::debug!("Configuration: {}", serde_json::to_string(&config)?);

    let store = config.model_dir.clone().map(ModelStore::new);
    let mut classifiers = select_classifiers(store, &config.methods)?;
    let source = FsDatasetSource::new(&config.base_folder);

    let stdout = std::io::stdout();
    let mut harness = EvaluationHarness::new(config, stdout.lock());
    let summary = harness.run(&mut classifiers, &source)?;

    tracing::info!(
        "Evaluation complete: {} rows, {} failures",
        summary.rows.len(),
        summary.failures.len()
    );
    for failure in &summary.failures {
        tracing::error!("{}", failure);
    }

    Ok(if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
