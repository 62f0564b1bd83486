// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Repeated-holdout evaluation harness for binary spam classifiers
//!
//! This crate provides:
//! - A deterministic prime seed sequence, one seed per trial
//! - Seeded training/testing partitioning with optional empty-instance augmentation
//! - Accuracy and per-class precision/recall extraction
//! - Streaming (Welford) statistics keyed by run-time metric names
//! - A tab-separated `mean ± stddev` report, one row per (data set, method)
//! - Built-in methods (Majority, Stratified, Nearest centroid, Gaussian naive Bayes)

pub mod classifiers;
pub mod config;
pub mod datasets;
pub mod error;
pub mod harness;
pub mod metrics;
pub mod partition;
pub mod primes;
pub mod report;
pub mod stats;

pub use classifiers::{all_classifiers, select_classifiers, Classifier, ModelStore};
pub use config::{HarnessConfig, LoadFailurePolicy};
pub use datasets::{AugmentationSet, Dataset, DatasetRef, DatasetSource, FsDatasetSource, Label, Record};
pub use error::{ConfigError, DataLoadError, HarnessError, SequenceExhausted, TrialStage};
pub use harness::{EvaluationHarness, RunSummary};
pub use metrics::{extract, ConfusionMatrix, TrialMetrics};
pub use partition::{augment, split, Split};
pub use primes::PrimeSequencer;
pub use report::{ReportRenderer, ReportRow};
pub use stats::{MetricSummary, RunningStats, RunningStatsRegistry};
