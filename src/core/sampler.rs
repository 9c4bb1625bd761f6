//! Fixed-interval polling loop driving the management session.
//!
//! The loop checks the workload's completion flag only at the top of a cycle,
//! so a cycle that has started always issues every query. Each metric
//! advances exactly once per cycle: a reply that carries no value is recorded
//! as a header with an empty value line, which the parser turns into a
//! missing sample.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::Result;

use super::capture::CaptureRecord;
use super::parser::header_metric;
use super::queries::{MetricQuery, MetricQuerySet};
use super::session::LineChannel;
use super::workload::CompletionFlag;

/// Sampler settings
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Sleep before every cycle
    pub interval: Duration,
    /// Longest wait for any single reply line
    pub reply_timeout: Duration,
    /// Stop after this many cycles even if the workload is still running
    pub max_cycles: Option<usize>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            reply_timeout: Duration::from_secs(5),
            max_cycles: None,
        }
    }
}

/// What a finished sampling loop did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplingReport {
    pub cycles: usize,
    pub missing_replies: usize,
    pub was_cancelled: bool,
}

/// Outcome of reading one query's reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyOutcome {
    Value,
    Missing,
}

pub struct Sampler {
    config: SamplerConfig,
    pub cancel_flag: Arc<AtomicBool>,
}

impl Sampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Request cancellation; takes effect at the next cycle boundary
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Poll `channel` until `workload` reports completion.
    ///
    /// Raw output is appended to `capture` as it arrives. A channel failure is
    /// returned as-is and leaves whatever was captured so far in `capture`.
    pub fn run<C: LineChannel>(
        &self,
        channel: &mut C,
        queries: &MetricQuerySet,
        workload: &CompletionFlag,
        capture: &mut CaptureRecord,
    ) -> Result<SamplingReport> {
        let mut report = SamplingReport::default();

        log::info!(
            "Sampling {} metrics every {:?}",
            queries.len(),
            self.config.interval
        );

        loop {
            if workload.is_finished() {
                log::info!("Workload finished after {} cycles", report.cycles);
                break;
            }
            if self.is_cancelled() {
                log::warn!("Sampling cancelled after {} cycles", report.cycles);
                report.was_cancelled = true;
                break;
            }
            if self.config.max_cycles.is_some_and(|max| report.cycles >= max) {
                log::info!("Reached cycle limit of {}", report.cycles);
                break;
            }

            thread::sleep(self.config.interval);

            for query in queries.queries() {
                if self.query_once(channel, query, capture)? == ReplyOutcome::Missing {
                    report.missing_replies += 1;
                }
            }

            report.cycles += 1;
            log::debug!("Cycle {} complete", report.cycles);
        }

        Ok(report)
    }

    /// Send one query and capture its reply
    fn query_once<C: LineChannel>(
        &self,
        channel: &mut C,
        query: &MetricQuery,
        capture: &mut CaptureRecord,
    ) -> Result<ReplyOutcome> {
        channel.send(&query.text)?;
        capture.append(query.text.as_str());

        let expected = query.metric.name.as_str();
        let timeout = self.config.reply_timeout;

        loop {
            let line = channel.receive_line(timeout)?;

            if header_metric(&line) == Some(expected) {
                capture.append(line);
                let value = channel.receive_line(timeout)?;
                capture.append(value);
                return Ok(ReplyOutcome::Value);
            }

            let failed = is_error_reply(&line);
            capture.append(line);

            if failed {
                log::warn!("No value for {} in this cycle", expected);
                capture.append(missing_header(query));
                capture.append(String::new());
                return Ok(ReplyOutcome::Missing);
            }
        }
    }
}

/// jmxterm reports failures as `#`-prefixed exception lines
fn is_error_reply(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with('#')
        && header_metric(line).is_none()
        && (line.contains("Exception") || line.contains("Error"))
}

/// Stand-in header recorded when a query produced no value
fn missing_header(query: &MetricQuery) -> String {
    let object_name = query
        .text
        .split_whitespace()
        .nth(3)
        .unwrap_or(query.metric.name.as_str());
    format!("#mbean = {}:", object_name)
}
