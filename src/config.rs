// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Run configuration and its validation

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What to do when a data set cannot be loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadFailurePolicy {
    /// Log the failure and continue with the next data set
    #[default]
    Skip,
    /// Stop the whole run
    Abort,
}

impl FromStr for LoadFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(LoadFailurePolicy::Skip),
            "abort" => Ok(LoadFailurePolicy::Abort),
            _ => Err(ConfigError::InvalidLoadPolicy(s.to_string())),
        }
    }
}

/// Configuration for one evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Folder holding the data set folders
    pub base_folder: PathBuf,
    /// Trials per (method, data set) pair
    pub repetitions: usize,
    /// Append the empty-instance set to every testing partition
    pub include_empty_instances: bool,
    /// Fraction of each data set used for training
    pub split_ratio: f64,
    /// Floor of the prime seed sequence
    pub first_seed: u64,
    /// Largest seed the sequence may hand out
    pub seed_limit: u64,
    /// Prefix of saved model identifiers (`<namespace>@<method>`)
    pub namespace: String,
    /// Where trained models are saved; `None` disables persistence
    pub model_dir: Option<PathBuf>,
    /// Methods to evaluate (empty = all)
    pub methods: Vec<String>,
    pub on_load_error: LoadFailurePolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_folder: PathBuf::from("."),
            repetitions: 10,
            include_empty_instances: false,
            split_ratio: 0.7,
            first_seed: 2,
            seed_limit: u64::MAX,
            namespace: "AntiSpamClassifier".to_string(),
            model_dir: None,
            methods: vec![],
            on_load_error: LoadFailurePolicy::Skip,
        }
    }
}

impl HarnessConfig {
    /// Build from the three positional command-line arguments, reporting a
    /// specific error per malformed value.
    pub fn from_args(base_folder: &Path, repetitions: &str, include_empty_instances: &str) -> Result<Self, ConfigError> {
        let config = Self {
            base_folder: base_folder.to_path_buf(),
            repetitions: parse_repetitions(repetitions)?,
            include_empty_instances: parse_flag("TEST_EMPTY_INSTANCES", include_empty_instances)?,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_folder.is_dir() {
            return Err(ConfigError::InvalidDatasetRoot(self.base_folder.clone()));
        }
        if self.repetitions == 0 {
            return Err(ConfigError::InvalidRepetitions(self.repetitions.to_string()));
        }
        if !(self.split_ratio > 0.0 && self.split_ratio < 1.0) {
            return Err(ConfigError::InvalidRatio(self.split_ratio));
        }
        Ok(())
    }

    /// Identifier a method's trained state is saved under
    pub fn model_identifier(&self, method: &str) -> String {
        format!("{}@{}", self.namespace, method)
    }
}

pub fn parse_repetitions(value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidRepetitions(value.to_string())),
    }
}

pub fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HarnessConfig::from_args(tmp.path(), "10", "TRUE").unwrap();

        assert_eq!(config.repetitions, 10);
        assert!(config.include_empty_instances);
        assert_eq!(config.on_load_error, LoadFailurePolicy::Skip);
        assert_eq!(config.model_identifier("Majority"), "AntiSpamClassifier@Majority");
    }

    #[test]
    fn test_bad_repetitions() {
        let tmp = tempfile::tempdir().unwrap();
        for bad in ["ten", "-3", "0", "", "2.5"] {
            let err = HarnessConfig::from_args(tmp.path(), bad, "false").unwrap_err();
            assert!(matches!(err, ConfigError::InvalidRepetitions(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn test_bad_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let err = HarnessConfig::from_args(tmp.path(), "3", "yes").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFlag { name: "TEST_EMPTY_INSTANCES", .. }));
    }

    #[test]
    fn test_bad_root() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing");
        let err = HarnessConfig::from_args(&missing, "3", "false").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDatasetRoot(_)));
    }

    #[test]
    fn test_bad_ratio() {
        let tmp = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            base_folder: tmp.path().to_path_buf(),
            split_ratio: 1.0,
            ..HarnessConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRatio(_))));
    }

    #[test]
    fn test_load_policy_parse() {
        assert_eq!("Abort".parse::<LoadFailurePolicy>().unwrap(), LoadFailurePolicy::Abort);
        assert_eq!("skip".parse::<LoadFailurePolicy>().unwrap(), LoadFailurePolicy::Skip);
        assert!("retry".parse::<LoadFailurePolicy>().is_err());
    }
}
