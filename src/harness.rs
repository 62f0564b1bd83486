// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Repeated-holdout evaluation loop
//!
//! Orchestrates, for every (method, data set) pair:
//! - a fresh prime seed per trial
//! - seeded partitioning, optionally extended with empty instances
//! - timed fit and predict through the [`Classifier`] capability set
//! - metric extraction folded into a per-pair [`RunningStatsRegistry`]
//! - one report row once all trials of the pair succeed

use crate::classifiers::Classifier;
use crate::config::{HarnessConfig, LoadFailurePolicy};
use crate::datasets::{AugmentationSet, Dataset, DatasetRef, DatasetSource};
use crate::error::{HarnessError, TrialStage};
use crate::metrics::extract;
use crate::partition::{augment, split, Split};
use crate::primes::PrimeSequencer;
use crate::report::{ReportRenderer, ReportRow};
use crate::stats::RunningStatsRegistry;
use std::io::Write;
use std::time::{Duration, Instant};

/// Outcome of a run: reported rows plus every pair-scoped failure
#[derive(Debug, Default)]
pub struct RunSummary {
    pub rows: Vec<ReportRow>,
    pub failures: Vec<HarnessError>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Active (method, data set, trial), attached to every trial failure
struct TrialContext<'a> {
    method: &'a str,
    dataset: &'a str,
    trial: usize,
}

impl TrialContext<'_> {
    fn fail(&self, stage: TrialStage, source: impl Into<anyhow::Error>) -> HarnessError {
        HarnessError::Trial {
            method: self.method.to_string(),
            dataset: self.dataset.to_string(),
            trial: self.trial,
            stage,
            source: source.into(),
        }
    }
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

pub struct EvaluationHarness<W: Write> {
    config: HarnessConfig,
    primes: PrimeSequencer,
    renderer: ReportRenderer<W>,
}

impl<W: Write> EvaluationHarness<W> {
    pub fn new(config: HarnessConfig, out: W) -> Self {
        let primes = PrimeSequencer::starting_at(config.first_seed).with_limit(config.seed_limit);
        Self {
            config,
            primes,
            renderer: ReportRenderer::new(out),
        }
    }

    /// Evaluate every method on every discovered data set, methods outermost.
    ///
    /// Trial and load failures (under [`LoadFailurePolicy::Skip`]) are
    /// collected in the summary; seed exhaustion, discovery and report
    /// write failures end the run. Each method is deleted once its data set
    /// loop ends, including when the run is cut short.
    pub fn run(
        &mut self,
        classifiers: &mut [Box<dyn Classifier>],
        source: &dyn DatasetSource,
    ) -> Result<RunSummary, HarnessError> {
        let datasets = source.discover().map_err(HarnessError::Discovery)?;
        if datasets.is_empty() {
            tracing::warn!("No data sets found under {}", self.config.base_folder.display());
        }

        let mut summary = RunSummary::default();

        for classifier in classifiers.iter_mut() {
            let method = classifier.name().to_string();
            tracing::info!("Evaluating method: {}", method);

            let outcome = self.evaluate_method(classifier.as_mut(), &datasets, source, &mut summary);
            let cleanup = classifier.delete();

            match (outcome, cleanup) {
                (Ok(()), Ok(())) => {}
                (Ok(()), Err(e)) => {
                    let err = HarnessError::Cleanup { method, source: e };
                    tracing::warn!("{}", err);
                    summary.failures.push(err);
                }
                (Err(err), cleanup) => {
                    if let Err(e) = cleanup {
                        tracing::warn!("method {}: cleanup after fatal error failed: {:#}", method, e);
                    }
                    return Err(err);
                }
            }
        }

        Ok(summary)
    }

    /// One method across every data set. Returns only on a run-ending error.
    fn evaluate_method(
        &mut self,
        classifier: &mut dyn Classifier,
        datasets: &[DatasetRef],
        source: &dyn DatasetSource,
        summary: &mut RunSummary,
    ) -> Result<(), HarnessError> {
        for dataset_ref in datasets {
            let dataset = match source.load(dataset_ref) {
                Ok(dataset) => dataset,
                Err(e) => {
                    let err = HarnessError::DataLoad {
                        dataset: dataset_ref.label.clone(),
                        source: e,
                    };
                    match self.config.on_load_error {
                        LoadFailurePolicy::Abort => return Err(err),
                        LoadFailurePolicy::Skip => {
                            tracing::warn!("Skipping data set for {}: {}", classifier.name(), err);
                            summary.failures.push(err);
                            continue;
                        }
                    }
                }
            };

            match self.evaluate_pair(classifier, &dataset_ref.label, &dataset) {
                Ok(row) => {
                    self.renderer.render(&row)?;
                    summary.rows.push(row);
                }
                Err(err) if err.is_pair_scoped() => {
                    tracing::error!("{}; partial statistics discarded", err);
                    summary.failures.push(err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Run every trial of one (method, data set) pair and aggregate them.
    /// Any trial failure discards the statistics gathered so far.
    pub fn evaluate_pair(
        &mut self,
        classifier: &mut dyn Classifier,
        dataset_label: &str,
        dataset: &Dataset,
    ) -> Result<ReportRow, HarnessError> {
        let method = classifier.name().to_string();
        let augmentation = if self.config.include_empty_instances {
            AugmentationSet::empty_instances(dataset.num_features())
        } else {
            AugmentationSet::default()
        };

        tracing::info!(
            "{} on {}: {} records, {} trials",
            method,
            dataset_label,
            dataset.len(),
            self.config.repetitions
        );

        let mut registry = RunningStatsRegistry::new();
        for trial in 1..=self.config.repetitions {
            let ctx = TrialContext {
                method: &method,
                dataset: dataset_label,
                trial,
            };
            self.run_trial(classifier, dataset, &augmentation, &ctx, &mut registry)?;
        }

        Ok(ReportRow {
            dataset: dataset_label.to_string(),
            method,
            metrics: registry.snapshot(),
        })
    }

    fn run_trial(
        &mut self,
        classifier: &mut dyn Classifier,
        dataset: &Dataset,
        augmentation: &AugmentationSet,
        ctx: &TrialContext<'_>,
        registry: &mut RunningStatsRegistry,
    ) -> Result<(), HarnessError> {
        let seed = self.primes.next().map_err(|source| HarnessError::SequenceExhausted {
            method: ctx.method.to_string(),
            dataset: ctx.dataset.to_string(),
            trial: ctx.trial,
            source,
        })?;

        // The split lives until the end of this scope, whichever way it exits.
        let Split { training, testing } = split(dataset, self.config.split_ratio, seed)
            .map_err(|e| ctx.fail(TrialStage::Partition, e))?;
        let testing = augment(testing, augmentation);

        let start = Instant::now();
        classifier
            .fit(&training, seed)
            .map_err(|e| ctx.fail(TrialStage::Fit, e))?;
        let training_time = millis(start.elapsed());

        classifier
            .save(&self.config.model_identifier(ctx.method))
            .map_err(|e| ctx.fail(TrialStage::Save, e))?;

        let start = Instant::now();
        let predictions = classifier
            .predict(&testing)
            .map_err(|e| ctx.fail(TrialStage::Predict, e))?;
        let testing_time = millis(start.elapsed());

        // Quality metrics register ahead of the timings so they lead the report
        let metrics = extract(&testing, &predictions).map_err(|e| ctx.fail(TrialStage::Score, e))?;
        for (name, value) in metrics.samples() {
            registry.record(&name, value);
        }
        registry.record("training_time", training_time);
        registry.record("testing_time", testing_time);

        tracing::debug!(
            "{} on {} trial {} (seed {}): train={} test={} accuracy={:.2}",
            ctx.method,
            ctx.dataset,
            ctx.trial,
            seed,
            training.len(),
            testing.len(),
            metrics.accuracy
        );
        Ok(())
    }

    pub fn into_output(self) -> W {
        self.renderer.into_inner()
    }
}
