// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Labeled feature tables: data model, discovery and loading
//!
//! A data set folder is any directory whose name is an integer (its feature
//! count) holding two header-less CSV feature tables named `ham` and `spam`.

use crate::error::DataLoadError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Binary label for spam filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Ham,
    Spam,
}

impl Label {
    /// Every label, in metric-name order.
    pub const ALL: [Label; 2] = [Label::Ham, Label::Spam];

    /// Name used to build metric keys such as `ham_precision`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Ham => "ham",
            Label::Spam => "spam",
        }
    }

    /// Position in [`Label::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Label::Ham => 0,
            Label::Spam => 1,
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single labeled feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identity within the source data set
    pub id: usize,
    pub features: Vec<f64>,
    pub label: Label,
}

/// An ordered collection of records sharing one dimensionality
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    num_features: usize,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(num_features: usize, records: Vec<Record>) -> Result<Self, DataLoadError> {
        if let Some(bad) = records.iter().find(|r| r.features.len() != num_features) {
            return Err(DataLoadError::RecordDimension {
                id: bad.id,
                expected: num_features,
                found: bad.features.len(),
            });
        }
        Ok(Self {
            num_features,
            records,
        })
    }

    /// Builds a data set from records already known to share `num_features`.
    pub(crate) fn from_parts(num_features: usize, records: Vec<Record>) -> Self {
        debug_assert!(records.iter().all(|r| r.features.len() == num_features));
        Self {
            num_features,
            records,
        }
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.records.iter().map(|r| r.label)
    }

    /// Get label distribution for a slice of records
    pub fn label_distribution(records: &[Record]) -> HashMap<Label, usize> {
        let mut dist = HashMap::new();
        for record in records {
            *dist.entry(record.label).or_insert(0) += 1;
        }
        dist
    }
}

/// Records appended to every testing partition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AugmentationSet {
    records: Vec<Record>,
}

impl AugmentationSet {
    /// First id handed to augmentation records; source records never reach it.
    pub const ID_BASE: usize = usize::MAX / 2;

    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// One all-zero feature vector per label.
    pub fn empty_instances(num_features: usize) -> Self {
        let records = Label::ALL
            .iter()
            .enumerate()
            .map(|(i, label)| Record {
                id: Self::ID_BASE + i,
                features: vec![0.0; num_features],
                label: *label,
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A discovered, not yet loaded, data set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    /// Folder path relative to the base folder, used in the report
    pub label: String,
    pub path: PathBuf,
    pub num_features: usize,
}

/// Where data sets come from
pub trait DatasetSource {
    /// Data sets to evaluate, in evaluation order
    fn discover(&self) -> Result<Vec<DatasetRef>, DataLoadError>;

    /// Load one discovered data set into memory
    fn load(&self, dataset: &DatasetRef) -> Result<Dataset, DataLoadError>;
}

/// Data set folders below a base directory
#[derive(Debug, Clone)]
pub struct FsDatasetSource {
    base: PathBuf,
}

impl FsDatasetSource {
    pub const HAM_FILE: &'static str = "ham";
    pub const SPAM_FILE: &'static str = "spam";

    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn feature_count(path: &Path) -> Option<usize> {
        path.file_name()?.to_str()?.parse().ok()
    }

    fn relative_label(&self, path: &Path) -> String {
        path.strip_prefix(&self.base)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    fn load_table(
        path: &Path,
        label: Label,
        num_features: usize,
        records: &mut Vec<Record>,
    ) -> Result<(), DataLoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|source| DataLoadError::Csv {
                path: path.to_path_buf(),
                source,
            })?;

        for result in reader.records() {
            let row = result.map_err(|source| DataLoadError::Csv {
                path: path.to_path_buf(),
                source,
            })?;
            let line = row.position().map_or(0, |p| p.line());

            if row.len() != num_features {
                return Err(DataLoadError::Dimension {
                    path: path.to_path_buf(),
                    line,
                    expected: num_features,
                    found: row.len(),
                });
            }

            let features = row
                .iter()
                .map(|field| {
                    field.parse::<f64>().map_err(|_| DataLoadError::InvalidFeature {
                        path: path.to_path_buf(),
                        line,
                        value: field.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            records.push(Record {
                id: records.len(),
                features,
                label,
            });
        }
        Ok(())
    }
}

impl DatasetSource for FsDatasetSource {
    fn discover(&self) -> Result<Vec<DatasetRef>, DataLoadError> {
        let mut found = Vec::new();
        // Symlinks are not followed, so a link back into the tree cannot repeat a data set
        for entry in WalkDir::new(&self.base).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|source| DataLoadError::Walk {
                path: source.path().unwrap_or(&self.base).to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            let Some(num_features) = Self::feature_count(path) else {
                continue;
            };
            if path.join(Self::HAM_FILE).is_file() && path.join(Self::SPAM_FILE).is_file() {
                found.push(DatasetRef {
                    label: self.relative_label(path),
                    path: path.to_path_buf(),
                    num_features,
                });
            }
        }
        tracing::debug!("Discovered {} data set folders under {}", found.len(), self.base.display());
        Ok(found)
    }

    fn load(&self, dataset: &DatasetRef) -> Result<Dataset, DataLoadError> {
        let mut records = Vec::new();
        Self::load_table(
            &dataset.path.join(Self::HAM_FILE),
            Label::Ham,
            dataset.num_features,
            &mut records,
        )?;
        Self::load_table(
            &dataset.path.join(Self::SPAM_FILE),
            Label::Spam,
            dataset.num_features,
            &mut records,
        )?;

        tracing::debug!(
            "Loaded {}: {} records with {} features",
            dataset.label,
            records.len(),
            dataset.num_features
        );
        Ok(Dataset::from_parts(dataset.num_features, records))
    }
}

/// In-memory source, used for synthetic runs and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryDatasetSource {
    datasets: Vec<(DatasetRef, Option<Dataset>)>,
}

impl MemoryDatasetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, label: &str, dataset: Dataset) -> Self {
        self.datasets.push((
            DatasetRef {
                label: label.to_string(),
                path: PathBuf::from(label),
                num_features: dataset.num_features(),
            },
            Some(dataset),
        ));
        self
    }

    /// Registers a data set whose load always fails.
    pub fn with_unreadable(mut self, label: &str, num_features: usize) -> Self {
        self.datasets.push((
            DatasetRef {
                label: label.to_string(),
                path: PathBuf::from(label),
                num_features,
            },
            None,
        ));
        self
    }
}

impl DatasetSource for MemoryDatasetSource {
    fn discover(&self) -> Result<Vec<DatasetRef>, DataLoadError> {
        Ok(self.datasets.iter().map(|(r, _)| r.clone()).collect())
    }

    fn load(&self, dataset: &DatasetRef) -> Result<Dataset, DataLoadError> {
        self.datasets
            .iter()
            .find(|(r, _)| r == dataset)
            .and_then(|(_, d)| d.clone())
            .ok_or_else(|| DataLoadError::Io {
                path: dataset.path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "data set unavailable"),
            })
    }
}

/// Balanced synthetic data set: class means differ by `separation` per feature.
pub fn synthetic(size: usize, num_features: usize, separation: f64, seed: u64) -> Dataset {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let records = (0..size)
        .map(|id| {
            let label = if id % 2 == 0 { Label::Ham } else { Label::Spam };
            let offset = if label == Label::Spam { separation } else { 0.0 };
            let features = (0..num_features).map(|_| offset + rng.gen::<f64>()).collect();
            Record { id, features, label }
        })
        .collect();
    Dataset::from_parts(num_features, records)
}
