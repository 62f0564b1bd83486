// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Seeded training/testing partitioning

use crate::datasets::{AugmentationSet, Dataset, Record};
use crate::error::PartitionError;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Training and testing sets of one trial. Owns its records; dropping it
/// releases them.
#[derive(Debug, Clone)]
pub struct Split {
    pub training: Dataset,
    pub testing: Dataset,
}

/// Partition `dataset` so that `round(len * ratio)` shuffled records train
/// and the rest test. The shuffle is driven only by `seed`.
pub fn split(dataset: &Dataset, ratio: f64, seed: u64) -> Result<Split, PartitionError> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(PartitionError::InvalidRatio(ratio));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..dataset.len()).collect();
    order.shuffle(&mut rng);

    let n_train = (dataset.len() as f64 * ratio).round() as usize;
    let records = dataset.records();
    let pick = |indices: &[usize]| -> Vec<Record> {
        indices.iter().map(|&i| records[i].clone()).collect()
    };

    Ok(Split {
        training: Dataset::from_parts(dataset.num_features(), pick(&order[..n_train])),
        testing: Dataset::from_parts(dataset.num_features(), pick(&order[n_train..])),
    })
}

/// Testing set extended with every augmentation record, as a new data set.
pub fn augment(testing: Dataset, augmentation: &AugmentationSet) -> Dataset {
    if augmentation.is_empty() {
        return testing;
    }

    let num_features = testing.num_features();
    let mut records = testing.records().to_vec();
    records.extend_from_slice(augmentation.records());
    Dataset::from_parts(num_features, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{synthetic, Label};
    use std::collections::HashSet;

    fn ids(dataset: &Dataset) -> Vec<usize> {
        dataset.records().iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_partition_is_disjoint_and_covering() {
        let dataset = synthetic(101, 3, 1.0, 5);
        for (ratio, seed) in [(0.1, 2), (0.5, 3), (0.7, 7919), (0.95, 13)] {
            let split = split(&dataset, ratio, seed).unwrap();
            let train: HashSet<usize> = ids(&split.training).into_iter().collect();
            let test: HashSet<usize> = ids(&split.testing).into_iter().collect();

            assert!(train.is_disjoint(&test));
            assert_eq!(train.len() + test.len(), dataset.len());
            let all: HashSet<usize> = train.union(&test).copied().collect();
            let source: HashSet<usize> = ids(&dataset).into_iter().collect();
            assert_eq!(all, source);
        }
    }

    #[test]
    fn test_split_sizes() {
        let dataset = synthetic(100, 2, 1.0, 1);
        let split = split(&dataset, 0.7, 7919).unwrap();
        assert_eq!(split.training.len(), 70);
        assert_eq!(split.testing.len(), 30);
        assert_eq!(split.training.num_features(), 2);
    }

    #[test]
    fn test_same_seed_same_partition() {
        let dataset = synthetic(60, 2, 1.0, 1);
        let a = split(&dataset, 0.7, 31).unwrap();
        let b = split(&dataset, 0.7, 31).unwrap();
        assert_eq!(ids(&a.training), ids(&b.training));
        assert_eq!(ids(&a.testing), ids(&b.testing));
    }

    #[test]
    fn test_different_seeds_shuffle_differently() {
        let dataset = synthetic(60, 2, 1.0, 1);
        let a = split(&dataset, 0.5, 7919).unwrap();
        let b = split(&dataset, 0.5, 7927).unwrap();
        assert_ne!(ids(&a.training), ids(&b.training));
    }

    #[test]
    fn test_invalid_ratio() {
        let dataset = synthetic(10, 2, 1.0, 1);
        for ratio in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(split(&dataset, ratio, 2).is_err());
        }
    }

    #[test]
    fn test_augment_empty_is_noop() {
        let dataset = synthetic(20, 2, 1.0, 1);
        let split = split(&dataset, 0.5, 2).unwrap();
        let before = ids(&split.testing);
        let testing = augment(split.testing, &AugmentationSet::default());
        assert_eq!(ids(&testing), before);
    }

    #[test]
    fn test_augment_appends_without_touching_training() {
        let dataset = synthetic(20, 2, 1.0, 1);
        let split = split(&dataset, 0.5, 2).unwrap();
        let aug = AugmentationSet::empty_instances(2);

        let train_before = ids(&split.training);
        let test_len = split.testing.len();
        let testing = augment(split.testing, &aug);

        assert_eq!(testing.len(), test_len + aug.records().len());
        assert_eq!(ids(&split.training), train_before);
        let tail: Vec<Label> = testing.records()[test_len..].iter().map(|r| r.label).collect();
        assert_eq!(tail, Label::ALL.to_vec());
    }
}
