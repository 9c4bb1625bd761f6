use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{MonitorError, Result};

/// A coerced metric reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    /// The cycle ran but the session returned nothing usable for this metric
    Missing,
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            MetricValue::Integer(v) => Some(v as f64),
            MetricValue::Float(v) => Some(v),
            MetricValue::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, MetricValue::Missing)
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{:.2}", v),
            MetricValue::Missing => write!(f, "-"),
        }
    }
}

/// One reading of one metric in one poll cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub metric: String,
    pub index: usize,
    pub value: MetricValue,
}

/// Summary of a single series for terminal output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesStats {
    pub count: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub last: Option<MetricValue>,
}

/// Per-metric ordered samples for one run.
///
/// Append-only: samples are only added by the parser's single pass over a
/// capture record, and a fresh store is created for every run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesStore {
    series: BTreeMap<String, Vec<Sample>>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with an empty series for each name
    pub fn with_metrics<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut store = Self::new();
        for name in names {
            store.ensure(name);
        }
        store
    }

    /// Make sure a (possibly empty) series exists for `metric`
    pub fn ensure(&mut self, metric: &str) {
        self.series.entry(metric.to_string()).or_default();
    }

    /// Append `sample` to the series of `metric`.
    ///
    /// The sample must name `metric` and carry the next dense index, so a
    /// series always reads 0, 1, 2, ... in cycle order.
    pub fn record(&mut self, metric: &str, sample: Sample) -> Result<()> {
        if sample.metric != metric {
            return Err(MonitorError::invalid_sample(format!(
                "sample for {} recorded under {}",
                sample.metric, metric
            )));
        }

        let expected = self.series(metric).len();
        if sample.index != expected {
            return Err(MonitorError::invalid_sample(format!(
                "{} sample has index {}, expected {}",
                metric, sample.index, expected
            )));
        }

        self.series.entry(metric.to_string()).or_default().push(sample);
        Ok(())
    }

    /// Append `value` as the next sample of `metric`; returns its index
    pub fn push(&mut self, metric: &str, value: MetricValue) -> Result<usize> {
        let index = self.series(metric).len();
        self.record(
            metric,
            Sample {
                metric: metric.to_string(),
                index,
                value,
            },
        )?;
        Ok(index)
    }

    pub fn series(&self, metric: &str) -> &[Sample] {
        self.series.get(metric).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Length of the longest series
    pub fn cycles(&self) -> usize {
        self.series.values().map(Vec::len).max().unwrap_or(0)
    }

    /// True when every series has the same number of samples
    pub fn is_aligned(&self) -> bool {
        let mut lengths = self.series.values().map(Vec::len);
        match lengths.next() {
            Some(first) => lengths.all(|len| len == first),
            None => true,
        }
    }

    /// Hand-off structure for plotting/persistence collaborators
    pub fn to_numeric(&self) -> BTreeMap<String, Vec<Option<f64>>> {
        self.series
            .iter()
            .map(|(name, samples)| {
                (
                    name.clone(),
                    samples.iter().map(|s| s.value.as_f64()).collect(),
                )
            })
            .collect()
    }

    pub fn stats(&self, metric: &str) -> SeriesStats {
        let samples = self.series(metric);
        let mut stats = SeriesStats {
            count: samples.len(),
            last: samples.last().map(|s| s.value),
            ..Default::default()
        };

        for value in samples.iter().map(|s| s.value) {
            match value.as_f64() {
                Some(v) => {
                    stats.min = Some(stats.min.map_or(v, |m| m.min(v)));
                    stats.max = Some(stats.max.map_or(v, |m| m.max(v)));
                }
                None => stats.missing += 1,
            }
        }

        stats
    }

    /// Write the numeric hand-off structure as pretty JSON
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.to_numeric())?;
        fs::write(path, json)?;

        log::info!("Time series saved to {}", path.display());
        Ok(())
    }
}
