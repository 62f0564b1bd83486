// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Error taxonomy for the evaluation harness

use std::path::PathBuf;

use thiserror::Error;

/// Invalid command-line or file configuration. Always fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("The specified number of repetitions is invalid: '{0}' (expected a positive integer)")]
    InvalidRepetitions(String),

    #[error("The specified value for {name} is invalid: '{value}' (expected true or false)")]
    InvalidFlag { name: &'static str, value: String },

    #[error("The specified data set folder is invalid: {}", .0.display())]
    InvalidDatasetRoot(PathBuf),

    #[error("The split ratio must lie strictly between 0 and 1, got {0}")]
    InvalidRatio(f64),

    #[error("Unknown load failure policy '{0}' (expected skip or abort)")]
    InvalidLoadPolicy(String),
}

/// A single dataset could not be read or converted.
#[derive(Error, Debug)]
pub enum DataLoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("malformed CSV in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}:{line}: expected {expected} features, found {found}", .path.display())]
    Dimension {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("{}:{line}: '{value}' is not a number", .path.display())]
    InvalidFeature { path: PathBuf, line: u64, value: String },

    #[error("record {id} has {found} features, dataset expects {expected}")]
    RecordDimension { id: usize, expected: usize, found: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PartitionError {
    #[error("split ratio must lie strictly between 0 and 1, got {0}")]
    InvalidRatio(f64),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsError {
    #[error("model returned {predictions} predictions for {records} testing records")]
    LengthMismatch { records: usize, predictions: usize },
}

/// The prime seed sequence ran past its configured limit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("seed sequence exhausted after {last} (limit {limit})")]
pub struct SequenceExhausted {
    pub last: u64,
    pub limit: u64,
}

/// Step of a trial that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialStage {
    Partition,
    Fit,
    Save,
    Predict,
    Score,
}

impl std::fmt::Display for TrialStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            TrialStage::Partition => "partition",
            TrialStage::Fit => "fit",
            TrialStage::Save => "save",
            TrialStage::Predict => "predict",
            TrialStage::Score => "score",
        };
        f.write_str(stage)
    }
}

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("data set {dataset}: {source}")]
    DataLoad {
        dataset: String,
        #[source]
        source: DataLoadError,
    },

    #[error("method {method} on data set {dataset}, trial {trial}: {stage} failed: {source:#}")]
    Trial {
        method: String,
        dataset: String,
        trial: usize,
        stage: TrialStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("method {method} on data set {dataset}, trial {trial}: {source}")]
    SequenceExhausted {
        method: String,
        dataset: String,
        trial: usize,
        #[source]
        source: SequenceExhausted,
    },

    #[error("method {method}: cleanup failed: {source:#}")]
    Cleanup {
        method: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to discover data sets: {0}")]
    Discovery(#[source] DataLoadError),

    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

impl HarnessError {
    /// Errors scoped to one (method, dataset) pair; the run may continue past them.
    pub fn is_pair_scoped(&self) -> bool {
        matches!(
            self,
            HarnessError::Trial { .. } | HarnessError::DataLoad { .. } | HarnessError::Cleanup { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_error_names_context() {
        let err = HarnessError::Trial {
            method: "Majority".to_string(),
            dataset: "spam/8".to_string(),
            trial: 3,
            stage: TrialStage::Fit,
            source: anyhow::anyhow!("out of memory"),
        };
        let msg = err.to_string();

        assert!(msg.contains("Majority"));
        assert!(msg.contains("spam/8"));
        assert!(msg.contains("trial 3"));
        assert!(msg.contains("fit failed"));
        assert!(msg.contains("out of memory"));
        assert!(err.is_pair_scoped());
    }

    #[test]
    fn test_config_error_messages_are_specific() {
        let reps = ConfigError::InvalidRepetitions("ten".to_string()).to_string();
        let flag = ConfigError::InvalidFlag {
            name: "TEST_EMPTY_INSTANCES",
            value: "maybe".to_string(),
        }
        .to_string();

        assert!(reps.contains("repetitions"));
        assert!(flag.contains("TEST_EMPTY_INSTANCES"));
        assert_ne!(reps, flag);
    }
}
