// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Classification methods evaluated by the harness
//!
//! Implements:
//! - Majority class (always predict the most common training label)
//! - Stratified (sample labels from the training prior, seeded per trial)
//! - Nearest centroid (Euclidean distance to per-class means)
//! - Gaussian naive Bayes
//!
//! Every method persists its trained state through a [`ModelStore`].

use crate::datasets::{Dataset, Label, Record};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Capability set the harness drives a classification method through
pub trait Classifier: Send {
    /// Method name used in the report and in saved model identifiers
    fn name(&self) -> &str;

    /// Train on `training`. Any randomness must derive from `seed`.
    fn fit(&mut self, training: &Dataset, seed: u64) -> Result<()>;

    /// One predicted label per testing record, in record order
    fn predict(&self, testing: &Dataset) -> Result<Vec<Label>>;

    /// Persist the trained state under `identifier` (last write wins)
    fn save(&mut self, identifier: &str) -> Result<()>;

    /// Remove everything this method persisted
    fn delete(&mut self) -> Result<()>;
}

/// On-disk envelope of a saved model
#[derive(Debug, Serialize, Deserialize)]
pub struct SavedModel<T> {
    pub identifier: String,
    pub method: String,
    pub saved_at: DateTime<Utc>,
    pub state: T,
}

/// Directory holding one JSON file per saved identifier
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.dir.join(format!("{}.json", identifier))
    }

    pub fn write<T: Serialize>(&self, identifier: &str, method: &str, state: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create model directory {}", self.dir.display()))?;

        let path = self.path_for(identifier);
        let saved = SavedModel {
            identifier: identifier.to_string(),
            method: method.to_string(),
            saved_at: Utc::now(),
            state,
        };
        let json = serde_json::to_string_pretty(&saved)?;
        fs::write(&path, json).with_context(|| format!("Failed to write model {}", path.display()))?;

        tracing::trace!("Model saved: {}", path.display());
        Ok(path)
    }

    pub fn read(&self, identifier: &str) -> Result<SavedModel<serde_json::Value>> {
        let path = self.path_for(identifier);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read model {}", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete model {}", path.display())),
        }
    }
}

/// Save/delete bookkeeping shared by the built-in methods
#[derive(Debug, Clone, Default)]
struct Persistence {
    store: Option<ModelStore>,
    saved: Vec<PathBuf>,
}

impl Persistence {
    fn new(store: Option<ModelStore>) -> Self {
        Self {
            store,
            saved: Vec::new(),
        }
    }

    fn save<T: Serialize>(&mut self, identifier: &str, method: &str, state: Option<&T>) -> Result<()> {
        let Some(state) = state else {
            bail!("{} cannot be saved before it is fitted", method);
        };
        if let Some(store) = &self.store {
            let path = store.write(identifier, method, state)?;
            if !self.saved.contains(&path) {
                self.saved.push(path);
            }
        }
        Ok(())
    }

    /// Removes every saved file. Paths that fail to delete stay tracked so a
    /// later call can retry them; the first failure is returned.
    fn delete(&mut self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let mut first_err = None;
        self.saved.retain(|path| match store.remove(path) {
            Ok(()) => false,
            Err(e) => {
                first_err.get_or_insert(e);
                true
            }
        });
        first_err.map_or(Ok(()), Err)
    }
}

fn require_training(training: &Dataset, method: &str) -> Result<()> {
    if training.is_empty() {
        bail!("{} cannot be fitted on an empty training set", method);
    }
    Ok(())
}

/// Majority class: always predicts the most common training label.
/// Ties go to the label listed first in [`Label::ALL`].
#[derive(Debug, Clone, Default)]
pub struct MajorityClassifier {
    majority: Option<Label>,
    persistence: Persistence,
}

impl MajorityClassifier {
    pub fn new(store: Option<ModelStore>) -> Self {
        Self {
            majority: None,
            persistence: Persistence::new(store),
        }
    }

    pub fn majority(&self) -> Option<Label> {
        self.majority
    }
}

impl Classifier for MajorityClassifier {
    fn name(&self) -> &str {
        "Majority"
    }

    fn fit(&mut self, training: &Dataset, _seed: u64) -> Result<()> {
        require_training(training, self.name())?;
        let dist = Dataset::label_distribution(training.records());

        let mut best = Label::ALL[0];
        for label in Label::ALL {
            if dist.get(&label).copied().unwrap_or(0) > dist.get(&best).copied().unwrap_or(0) {
                best = label;
            }
        }
        self.majority = Some(best);
        Ok(())
    }

    fn predict(&self, testing: &Dataset) -> Result<Vec<Label>> {
        let label = self.majority.context("Majority predicted before fit")?;
        Ok(vec![label; testing.len()])
    }

    fn save(&mut self, identifier: &str) -> Result<()> {
        self.persistence.save(identifier, "Majority", self.majority.as_ref())
    }

    fn delete(&mut self) -> Result<()> {
        self.persistence.delete()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StratifiedState {
    /// Training prior per label, in [`Label::ALL`] order
    priors: Vec<f64>,
    seed: u64,
}

/// Stratified: samples each prediction from the training label prior.
/// The sampler is reseeded from the fit seed, so predictions repeat for a
/// given trial.
#[derive(Debug, Clone, Default)]
pub struct StratifiedClassifier {
    state: Option<StratifiedState>,
    persistence: Persistence,
}

impl StratifiedClassifier {
    pub fn new(store: Option<ModelStore>) -> Self {
        Self {
            state: None,
            persistence: Persistence::new(store),
        }
    }
}

impl Classifier for StratifiedClassifier {
    fn name(&self) -> &str {
        "Stratified"
    }

    fn fit(&mut self, training: &Dataset, seed: u64) -> Result<()> {
        require_training(training, self.name())?;
        let dist = Dataset::label_distribution(training.records());
        let total = training.len() as f64;

        let priors = Label::ALL
            .iter()
            .map(|l| dist.get(l).copied().unwrap_or(0) as f64 / total)
            .collect();
        self.state = Some(StratifiedState { priors, seed });
        Ok(())
    }

    fn predict(&self, testing: &Dataset) -> Result<Vec<Label>> {
        let state = self.state.as_ref().context("Stratified predicted before fit")?;
        let mut rng = ChaCha8Rng::seed_from_u64(state.seed);

        let predictions = testing
            .records()
            .iter()
            .map(|_| {
                let draw: f64 = rng.gen();
                let mut cumulative = 0.0;
                for (label, prior) in Label::ALL.iter().zip(&state.priors) {
                    cumulative += prior;
                    if draw < cumulative {
                        return *label;
                    }
                }
                Label::ALL[Label::ALL.len() - 1]
            })
            .collect();
        Ok(predictions)
    }

    fn save(&mut self, identifier: &str) -> Result<()> {
        self.persistence.save(identifier, "Stratified", self.state.as_ref())
    }

    fn delete(&mut self) -> Result<()> {
        self.persistence.delete()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Centroid {
    label: Label,
    mean: Vec<f64>,
}

fn class_records(training: &Dataset, label: Label) -> Vec<&Record> {
    training.records().iter().filter(|r| r.label == label).collect()
}

fn feature_means(records: &[&Record], num_features: usize) -> Vec<f64> {
    let mut mean = vec![0.0; num_features];
    for record in records {
        for (m, x) in mean.iter_mut().zip(&record.features) {
            *m += x;
        }
    }
    let n = records.len() as f64;
    mean.iter_mut().for_each(|m| *m /= n);
    mean
}

/// Nearest centroid: assigns the label whose training mean is closest
#[derive(Debug, Clone, Default)]
pub struct NearestCentroidClassifier {
    centroids: Option<Vec<Centroid>>,
    persistence: Persistence,
}

impl NearestCentroidClassifier {
    pub fn new(store: Option<ModelStore>) -> Self {
        Self {
            centroids: None,
            persistence: Persistence::new(store),
        }
    }
}

impl Classifier for NearestCentroidClassifier {
    fn name(&self) -> &str {
        "NearestCentroid"
    }

    fn fit(&mut self, training: &Dataset, _seed: u64) -> Result<()> {
        require_training(training, self.name())?;

        let centroids = Label::ALL
            .iter()
            .filter_map(|label| {
                let records = class_records(training, *label);
                if records.is_empty() {
                    return None;
                }
                Some(Centroid {
                    label: *label,
                    mean: feature_means(&records, training.num_features()),
                })
            })
            .collect();
        self.centroids = Some(centroids);
        Ok(())
    }

    fn predict(&self, testing: &Dataset) -> Result<Vec<Label>> {
        let centroids = self.centroids.as_ref().context("NearestCentroid predicted before fit")?;

        let predictions = testing
            .records()
            .iter()
            .map(|record| {
                centroids
                    .iter()
                    .map(|c| {
                        let dist: f64 = c
                            .mean
                            .iter()
                            .zip(&record.features)
                            .map(|(m, x)| (m - x).powi(2))
                            .sum();
                        (c.label, dist)
                    })
                    .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(label, _)| label)
                    .unwrap_or(Label::ALL[0])
            })
            .collect();
        Ok(predictions)
    }

    fn save(&mut self, identifier: &str) -> Result<()> {
        self.persistence.save(identifier, "NearestCentroid", self.centroids.as_ref())
    }

    fn delete(&mut self) -> Result<()> {
        self.persistence.delete()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GaussianClass {
    label: Label,
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

impl GaussianClass {
    fn log_likelihood(&self, features: &[f64]) -> f64 {
        let mut ll = self.log_prior;
        for ((x, mean), var) in features.iter().zip(&self.means).zip(&self.variances) {
            ll -= 0.5 * ((2.0 * std::f64::consts::PI * var).ln() + (x - mean).powi(2) / var);
        }
        ll
    }
}

/// Gaussian naive Bayes with per-feature variance smoothing
#[derive(Debug, Clone, Default)]
pub struct GaussianNaiveBayes {
    classes: Option<Vec<GaussianClass>>,
    persistence: Persistence,
}

impl GaussianNaiveBayes {
    /// Added to every variance, relative to the largest feature variance.
    const VAR_SMOOTHING: f64 = 1e-9;

    pub fn new(store: Option<ModelStore>) -> Self {
        Self {
            classes: None,
            persistence: Persistence::new(store),
        }
    }
}

impl Classifier for GaussianNaiveBayes {
    fn name(&self) -> &str {
        "GaussianNaiveBayes"
    }

    fn fit(&mut self, training: &Dataset, _seed: u64) -> Result<()> {
        require_training(training, self.name())?;
        let dims = training.num_features();

        let all: Vec<&Record> = training.records().iter().collect();
        let global_means = feature_means(&all, dims);
        let max_var = (0..dims)
            .map(|j| {
                all.iter().map(|r| (r.features[j] - global_means[j]).powi(2)).sum::<f64>()
                    / all.len() as f64
            })
            .fold(0.0_f64, f64::max);
        let epsilon = Self::VAR_SMOOTHING * max_var.max(1.0);

        let total = training.len() as f64;
        let classes = Label::ALL
            .iter()
            .filter_map(|label| {
                let records = class_records(training, *label);
                if records.is_empty() {
                    return None;
                }
                let means = feature_means(&records, dims);
                let variances = (0..dims)
                    .map(|j| {
                        let ss: f64 = records.iter().map(|r| (r.features[j] - means[j]).powi(2)).sum();
                        ss / records.len() as f64 + epsilon
                    })
                    .collect();
                Some(GaussianClass {
                    label: *label,
                    log_prior: (records.len() as f64 / total).ln(),
                    means,
                    variances,
                })
            })
            .collect();
        self.classes = Some(classes);
        Ok(())
    }

    fn predict(&self, testing: &Dataset) -> Result<Vec<Label>> {
        let classes = self.classes.as_ref().context("GaussianNaiveBayes predicted before fit")?;

        let predictions = testing
            .records()
            .iter()
            .map(|record| {
                classes
                    .iter()
                    .map(|c| (c.label, c.log_likelihood(&record.features)))
                    .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(label, _)| label)
                    .unwrap_or(Label::ALL[0])
            })
            .collect();
        Ok(predictions)
    }

    fn save(&mut self, identifier: &str) -> Result<()> {
        self.persistence.save(identifier, "GaussianNaiveBayes", self.classes.as_ref())
    }

    fn delete(&mut self) -> Result<()> {
        self.persistence.delete()
    }
}

/// Factory function to create every built-in method, in evaluation order
pub fn all_classifiers(store: Option<ModelStore>) -> Vec<Box<dyn Classifier>> {
    vec![
        Box::new(MajorityClassifier::new(store.clone())),
        Box::new(StratifiedClassifier::new(store.clone())),
        Box::new(NearestCentroidClassifier::new(store.clone())),
        Box::new(GaussianNaiveBayes::new(store)),
    ]
}

/// Built-in methods whose names match `names` (case-insensitive); all of
/// them when `names` is empty. Unknown names are an error.
pub fn select_classifiers(store: Option<ModelStore>, names: &[String]) -> Result<Vec<Box<dyn Classifier>>> {
    let all = all_classifiers(store);
    if names.is_empty() {
        return Ok(all);
    }

    for name in names {
        if !all.iter().any(|c| c.name().eq_ignore_ascii_case(name)) {
            let known: Vec<&str> = all.iter().map(|c| c.name()).collect();
            bail!("Unknown method '{}' (available: {})", name, known.join(", "));
        }
    }
    Ok(all
        .into_iter()
        .filter(|c| names.iter().any(|n| c.name().eq_ignore_ascii_case(n)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::synthetic;
    use crate::metrics::extract;

    fn labeled(rows: &[(f64, Label)]) -> Dataset {
        let records = rows
            .iter()
            .enumerate()
            .map(|(id, (x, label))| Record {
                id,
                features: vec![*x],
                label: *label,
            })
            .collect();
        Dataset::new(1, records).unwrap()
    }

    #[test]
    fn test_majority_predicts_most_common_label() {
        let training = labeled(&[(0.0, Label::Spam), (0.0, Label::Spam), (0.0, Label::Ham)]);
        let mut model = MajorityClassifier::new(None);
        model.fit(&training, 2).unwrap();

        assert_eq!(model.majority(), Some(Label::Spam));
        let predictions = model.predict(&training).unwrap();
        assert_eq!(predictions, vec![Label::Spam; 3]);
    }

    #[test]
    fn test_majority_tie_goes_to_first_label() {
        let training = labeled(&[(0.0, Label::Spam), (0.0, Label::Ham)]);
        let mut model = MajorityClassifier::new(None);
        model.fit(&training, 2).unwrap();
        assert_eq!(model.majority(), Some(Label::Ham));
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let testing = labeled(&[(0.0, Label::Ham)]);
        for model in all_classifiers(None) {
            assert!(model.predict(&testing).is_err(), "{} predicted unfitted", model.name());
        }
    }

    #[test]
    fn test_empty_training_fails() {
        let empty = Dataset::new(1, vec![]).unwrap();
        for mut model in all_classifiers(None) {
            assert!(model.fit(&empty, 2).is_err());
        }
    }

    #[test]
    fn test_stratified_is_seed_deterministic() {
        let dataset = synthetic(50, 2, 1.0, 3);
        let mut a = StratifiedClassifier::new(None);
        let mut b = StratifiedClassifier::new(None);
        a.fit(&dataset, 7919).unwrap();
        b.fit(&dataset, 7919).unwrap();
        assert_eq!(a.predict(&dataset).unwrap(), b.predict(&dataset).unwrap());
    }

    #[test]
    fn test_separable_data_is_learned() {
        let dataset = synthetic(200, 4, 5.0, 11);
        for mut model in [
            Box::new(NearestCentroidClassifier::new(None)) as Box<dyn Classifier>,
            Box::new(GaussianNaiveBayes::new(None)),
        ] {
            model.fit(&dataset, 2).unwrap();
            let predictions = model.predict(&dataset).unwrap();
            let metrics = extract(&dataset, &predictions).unwrap();
            assert!(metrics.accuracy > 95.0, "{} scored {}", model.name(), metrics.accuracy);
        }
    }

    #[test]
    fn test_save_overwrites_and_delete_removes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ModelStore::new(tmp.path().join("models"));
        let dataset = synthetic(20, 2, 1.0, 3);

        let mut model = NearestCentroidClassifier::new(Some(store.clone()));
        assert!(model.save("Spam@NearestCentroid").is_err());

        model.fit(&dataset, 2).unwrap();
        model.save("Spam@NearestCentroid").unwrap();
        model.fit(&dataset, 3).unwrap();
        model.save("Spam@NearestCentroid").unwrap();

        let saved = store.read("Spam@NearestCentroid").unwrap();
        assert_eq!(saved.method, "NearestCentroid");
        assert_eq!(saved.identifier, "Spam@NearestCentroid");
        assert!(saved.state.is_array());
        let files = fs::read_dir(tmp.path().join("models")).unwrap().count();
        assert_eq!(files, 1);

        model.delete().unwrap();
        assert!(!store.path_for("Spam@NearestCentroid").exists());
    }

    #[test]
    fn test_failed_delete_keeps_path_for_retry() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ModelStore::new(tmp.path().join("models"));
        let mut persistence = Persistence::new(Some(store.clone()));
        persistence.save("Spam@A", "A", Some(&1u8)).unwrap();
        persistence.save("Spam@B", "B", Some(&2u8)).unwrap();

        // a non-empty directory where the first model file was cannot be unlinked
        let stuck = store.path_for("Spam@A");
        fs::remove_file(&stuck).unwrap();
        fs::create_dir(&stuck).unwrap();
        fs::write(stuck.join("lock"), "").unwrap();

        assert!(persistence.delete().is_err());
        assert_eq!(persistence.saved, vec![stuck.clone()]);
        assert!(!store.path_for("Spam@B").exists());

        fs::remove_dir_all(&stuck).unwrap();
        persistence.delete().unwrap();
        assert!(persistence.saved.is_empty());
    }

    #[test]
    fn test_select_classifiers() {
        let picked = select_classifiers(None, &["majority".to_string(), "GaussianNaiveBayes".to_string()]).unwrap();
        let names: Vec<&str> = picked.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Majority", "GaussianNaiveBayes"]);

        assert_eq!(select_classifiers(None, &[]).unwrap().len(), 4);
        assert!(select_classifiers(None, &["SVM".to_string()]).is_err());
    }
}
