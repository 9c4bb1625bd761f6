//! Replays a capture record into per-metric time series.
//!
//! jmxterm answers `get -s -b <bean> <attr>` with a header naming the MBean
//! (`#mbean = ...,name=<Metric>:`) and the value on the following line.
//! Everything else in the capture (echoed commands, banners, connection
//! notices) is skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::error::{MonitorError, Result};

use super::capture::CaptureRecord;
use super::queries::{MetricDefinition, ValueKind};
use super::series::{MetricValue, TimeSeriesStore};

/// Marker that starts every reply header
pub const HEADER_MARKER: &str = "#mbean";

// greedy prefix so the last `name=` on the line wins
static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#mbean\b.*name=([^:,\s]*)").expect("header pattern is valid"));

/// Metric name embedded in a reply header, if `line` is one
pub fn header_metric(line: &str) -> Option<&str> {
    HEADER_RE
        .captures(line.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| !name.is_empty())
}

/// Coerce a value line to the declared kind
pub fn coerce_value(raw: &str, kind: ValueKind) -> Option<MetricValue> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match kind {
        ValueKind::Integer => raw.parse::<i64>().ok().map(MetricValue::Integer).or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && v.fract() == 0.0)
                // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
                .filter(|v| *v >= i64::MIN as f64 && *v < i64::MAX as f64)
                .map(|v| MetricValue::Integer(v as i64))
        }),
        ValueKind::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(MetricValue::Float),
    }
}

/// Parse a capture record against the metric definitions.
///
/// Every defined metric gets a series, possibly empty. Unknown headers are
/// ignored, unusable values become [`MetricValue::Missing`] and a header left
/// without its value line at the end of the record is dropped.
pub fn parse(capture: &CaptureRecord, definitions: &[MetricDefinition]) -> Result<TimeSeriesStore> {
    let kinds: HashMap<&str, ValueKind> = definitions
        .iter()
        .map(|d| (d.name.as_str(), d.kind))
        .collect();

    let mut store = TimeSeriesStore::with_metrics(definitions.iter().map(|d| d.name.as_str()));
    let lines = capture.lines();

    if let Some(pos) = lines.iter().position(|l| l.contains('\0')) {
        return Err(MonitorError::malformed(
            pos + 1,
            "embedded NUL byte, capture is binary or corrupt",
        ));
    }

    let mut i = 0;
    while i < lines.len() {
        let Some(metric) = header_metric(&lines[i]) else {
            i += 1;
            continue;
        };

        let Some(value_line) = lines.get(i + 1) else {
            log::warn!(
                "Capture ends after header for {} (line {}), sample dropped",
                metric,
                i + 1
            );
            break;
        };

        if header_metric(value_line).is_some() {
            // two headers in a row: the first one lost its value
            log::warn!(
                "Header for {} at line {} has no value line, sample dropped",
                metric,
                i + 1
            );
            i += 1;
            continue;
        }

        match kinds.get(metric) {
            Some(&kind) => {
                let value = coerce_value(value_line, kind).unwrap_or_else(|| {
                    if !value_line.trim().is_empty() {
                        log::warn!(
                            "Could not read '{}' as {:?} for {} (line {})",
                            value_line,
                            kind,
                            metric,
                            i + 2
                        );
                    }
                    MetricValue::Missing
                });
                store.push(metric, value)?;
            }
            None => log::debug!("Ignoring header for undefined metric {}", metric),
        }

        i += 2;
    }

    Ok(store)
}
