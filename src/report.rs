// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Tab-separated result table
//!
//! ```text
//! folder  method      accuracy       ham_precision  ...  training_time  testing_time
//! spam/8  Majority    50.00 ± 3.33   50.00 ± 3.33   ...  0.12 ± 0.01    0.02 ± 0.00
//! ```

use crate::stats::MetricSummary;
use std::io::{self, Write};

/// Aggregated results of one (data set, method) pair
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub dataset: String,
    pub method: String,
    pub metrics: Vec<MetricSummary>,
}

impl ReportRow {
    fn cell(&self, name: &str) -> String {
        match self.metrics.iter().find(|m| m.name == name) {
            Some(m) => format_cell(m.mean, m.stddev),
            None => format_cell(f64::NAN, f64::NAN),
        }
    }
}

pub fn format_cell(mean: f64, stddev: f64) -> String {
    format!("{:.2} ± {:.2}", mean, stddev)
}

/// Writes the header once, from the first row's metric order, then one line
/// per row aligned to that header.
pub struct ReportRenderer<W: Write> {
    out: W,
    header: Option<Vec<String>>,
}

impl<W: Write> ReportRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out, header: None }
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    pub fn render(&mut self, row: &ReportRow) -> io::Result<()> {
        if self.header.is_none() {
            let names: Vec<String> = row.metrics.iter().map(|m| m.name.clone()).collect();
            let mut line = String::from("folder\tmethod");
            for name in &names {
                line.push('\t');
                line.push_str(name);
            }
            writeln!(self.out, "{}", line)?;
            self.header = Some(names);
        }

        let header = self.header.as_deref().unwrap_or_default();
        for extra in row.metrics.iter().filter(|m| !header.contains(&m.name)) {
            tracing::warn!(
                "Metric {} of {} / {} is not in the report header; dropped",
                extra.name,
                row.dataset,
                row.method
            );
        }

        let mut line = format!("{}\t{}", row.dataset, row.method);
        for name in header {
            line.push('\t');
            line.push_str(&row.cell(name));
        }
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
