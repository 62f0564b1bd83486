// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Per-trial classification metrics
//!
//! Accuracy plus per-class precision and recall, all scaled to percent.
//! A ratio with a zero denominator is reported as `NaN`, never as 0.

use crate::datasets::{Dataset, Label};
use crate::error::MetricsError;
use serde::{Deserialize, Serialize};

const N_LABELS: usize = Label::ALL.len();

/// Confusion matrix indexed by `[actual][predicted]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: [[usize; N_LABELS]; N_LABELS],
}

impl ConfusionMatrix {
    pub fn from_predictions(predictions: &[Label], ground_truth: &[Label]) -> Self {
        let mut matrix = Self::default();
        for (pred, truth) in predictions.iter().zip(ground_truth.iter()) {
            matrix.counts[truth.index()][pred.index()] += 1;
        }
        matrix
    }

    pub fn count(&self, actual: Label, predicted: Label) -> usize {
        self.counts[actual.index()][predicted.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        Label::ALL.iter().map(|l| self.count(*l, *l)).sum()
    }

    /// Records whose true label is `label`
    pub fn actual(&self, label: Label) -> usize {
        self.counts[label.index()].iter().sum()
    }

    /// Records predicted as `label`
    pub fn predicted(&self, label: Label) -> usize {
        self.counts.iter().map(|row| row[label.index()]).sum()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    pub fn precision(&self, label: Label) -> f64 {
        ratio(self.count(label, label), self.predicted(label))
    }

    pub fn recall(&self, label: Label) -> f64 {
        ratio(self.count(label, label), self.actual(label))
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        return f64::NAN;
    }
    num as f64 / denom as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub label: Label,
    /// Percent, `NaN` if the class was never predicted
    pub precision: f64,
    /// Percent, `NaN` if the class is absent from the testing set
    pub recall: f64,
}

/// Scores of one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialMetrics {
    /// Percent of correctly labeled records
    pub accuracy: f64,
    pub per_class: Vec<ClassScores>,
    pub confusion_matrix: ConfusionMatrix,
}

impl TrialMetrics {
    pub fn from_confusion_matrix(cm: ConfusionMatrix) -> Self {
        let per_class = Label::ALL
            .iter()
            .map(|label| ClassScores {
                label: *label,
                precision: 100.0 * cm.precision(*label),
                recall: 100.0 * cm.recall(*label),
            })
            .collect();
        Self {
            accuracy: 100.0 * cm.accuracy(),
            per_class,
            confusion_matrix: cm,
        }
    }

    /// Named samples: `accuracy`, every `<label>_precision`, every `<label>_recall`.
    pub fn samples(&self) -> Vec<(String, f64)> {
        let mut samples = Vec::with_capacity(1 + 2 * self.per_class.len());
        samples.push(("accuracy".to_string(), self.accuracy));
        for class in &self.per_class {
            samples.push((format!("{}_precision", class.label), class.precision));
        }
        for class in &self.per_class {
            samples.push((format!("{}_recall", class.label), class.recall));
        }
        samples
    }
}

/// Score `predictions` against the true labels of `testing`.
pub fn extract(testing: &Dataset, predictions: &[Label]) -> Result<TrialMetrics, MetricsError> {
    if predictions.len() != testing.len() {
        return Err(MetricsError::LengthMismatch {
            records: testing.len(),
            predictions: predictions.len(),
        });
    }

    let truth: Vec<Label> = testing.labels().collect();
    let cm = ConfusionMatrix::from_predictions(predictions, &truth);
    Ok(TrialMetrics::from_confusion_matrix(cm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Record;

    fn dataset(labels: &[Label]) -> Dataset {
        let records = labels
            .iter()
            .enumerate()
            .map(|(id, label)| Record {
                id,
                features: vec![0.0],
                label: *label,
            })
            .collect();
        Dataset::new(1, records).unwrap()
    }

    fn in_bounds(v: f64) -> bool {
        v.is_nan() || (0.0..=100.0).contains(&v)
    }

    #[test]
    fn test_perfect_predictions() {
        let truth = [Label::Ham, Label::Spam, Label::Spam, Label::Ham];
        let metrics = extract(&dataset(&truth), &truth).unwrap();

        assert!((metrics.accuracy - 100.0).abs() < 1e-9);
        for class in &metrics.per_class {
            assert!((class.precision - 100.0).abs() < 1e-9);
            assert!((class.recall - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mixed_predictions() {
        use Label::{Ham, Spam};
        let truth = [Ham, Ham, Ham, Spam, Spam];
        let preds = [Ham, Ham, Spam, Spam, Ham];
        let metrics = extract(&dataset(&truth), &preds).unwrap();

        assert!((metrics.accuracy - 60.0).abs() < 1e-9);
        let ham = metrics.per_class[0];
        let spam = metrics.per_class[1];
        // ham: tp=2, predicted=3, actual=3
        assert!((ham.precision - 200.0 / 3.0).abs() < 1e-9);
        assert!((ham.recall - 200.0 / 3.0).abs() < 1e-9);
        // spam: tp=1, predicted=2, actual=2
        assert!((spam.precision - 50.0).abs() < 1e-9);
        assert!((spam.recall - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_absent_class_is_nan_not_zero() {
        let truth = [Label::Ham, Label::Ham, Label::Ham];
        let preds = [Label::Ham, Label::Ham, Label::Ham];
        let metrics = extract(&dataset(&truth), &preds).unwrap();

        let spam = metrics.per_class[1];
        assert!(spam.recall.is_nan());
        assert!(spam.precision.is_nan());
        assert!((metrics.per_class[0].recall - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_stay_in_bounds() {
        use Label::{Ham, Spam};
        let truth = [Ham, Spam, Spam, Ham, Spam, Ham, Ham];
        let preds = [Spam, Spam, Ham, Ham, Spam, Spam, Spam];
        let metrics = extract(&dataset(&truth), &preds).unwrap();

        for (_, value) in metrics.samples() {
            assert!(in_bounds(value), "{value} out of bounds");
        }
    }

    #[test]
    fn test_empty_testing_set() {
        let metrics = extract(&dataset(&[]), &[]).unwrap();
        assert!(metrics.accuracy.is_nan());
        assert!(metrics.samples().iter().all(|(_, v)| v.is_nan()));
    }

    #[test]
    fn test_length_mismatch() {
        let err = extract(&dataset(&[Label::Ham, Label::Spam]), &[Label::Ham]).unwrap_err();
        assert_eq!(err, MetricsError::LengthMismatch { records: 2, predictions: 1 });
    }

    #[test]
    fn test_sample_names_and_order() {
        let truth = [Label::Ham, Label::Spam];
        let metrics = extract(&dataset(&truth), &truth).unwrap();
        let names: Vec<String> = metrics.samples().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["accuracy", "ham_precision", "spam_precision", "ham_recall", "spam_recall"]
        );
    }

    #[test]
    fn test_confusion_matrix_counts() {
        use Label::{Ham, Spam};
        let cm = ConfusionMatrix::from_predictions(&[Spam, Spam, Ham], &[Ham, Spam, Ham]);
        assert_eq!(cm.count(Ham, Spam), 1);
        assert_eq!(cm.count(Spam, Spam), 1);
        assert_eq!(cm.count(Ham, Ham), 1);
        assert_eq!(cm.total(), 3);
        assert_eq!(cm.predicted(Spam), 2);
        assert_eq!(cm.actual(Ham), 2);
    }
}
