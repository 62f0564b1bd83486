// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Streaming per-metric statistics
//!
//! [`RunningStats`] uses Welford's update so mean and sample variance are
//! exact without keeping individual samples. [`RunningStatsRegistry`] keys
//! accumulators by metric names discovered at run time and remembers the
//! order in which they first appeared.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from the current mean
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// `NaN` until the first sample
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.mean
    }

    /// Sample variance (n - 1). Zero for a single sample.
    pub fn variance(&self) -> f64 {
        match self.count {
            0 => f64::NAN,
            1 => 0.0,
            n => self.m2 / (n - 1) as f64,
        }
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Aggregated value of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub name: String,
    pub count: u64,
    pub mean: f64,
    pub stddev: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RunningStatsRegistry {
    stats: IndexMap<String, RunningStats>,
}

impl RunningStatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` on first use, then folds `value` in. `NaN` samples
    /// register the name but are not counted.
    pub fn record(&mut self, name: &str, value: f64) {
        let stats = self.stats.entry(name.to_string()).or_default();
        if value.is_nan() {
            tracing::trace!("Skipping undefined sample for {}", name);
            return;
        }
        stats.push(value);
    }

    pub fn get(&self, name: &str) -> Option<&RunningStats> {
        self.stats.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stats.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Mean and standard deviation of every metric, in registration order
    pub fn snapshot(&self) -> Vec<MetricSummary> {
        self.stats
            .iter()
            .map(|(name, stats)| MetricSummary {
                name: name.clone(),
                count: stats.count(),
                mean: stats.mean(),
                stddev: stats.stddev(),
            })
            .collect()
    }
}
