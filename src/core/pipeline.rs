//! One monitoring run: probe, session, workload, sampling, parsing.

use std::path::Path;
use std::process::ExitStatus;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{MonitorError, Result};

use super::capture::CaptureRecord;
use super::config::MonitorConfig;
use super::parser;
use super::probe;
use super::queries::MetricQuerySet;
use super::sampler::{Sampler, SamplingReport};
use super::series::TimeSeriesStore;
use super::session::{LineChannel, Session};
use super::workload::{stress_write_args, WorkloadHandle, WorkloadRunner};

/// Raw result of the sampling phase
#[derive(Debug)]
pub struct Acquisition {
    pub capture: CaptureRecord,
    pub report: SamplingReport,
    pub workload_status: Option<ExitStatus>,
}

/// A sampling phase that ended on a channel failure.
///
/// Carries the capture collected up to the failure; it has also been written
/// to the configured capture path.
#[derive(Debug)]
pub struct AcquisitionFailure {
    pub error: MonitorError,
    pub capture: CaptureRecord,
    pub workload_status: Option<ExitStatus>,
}

impl From<AcquisitionFailure> for MonitorError {
    fn from(failure: AcquisitionFailure) -> Self {
        failure.error
    }
}

/// Everything a completed run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub store: TimeSeriesStore,
    pub report: SamplingReport,
    pub workload_status: Option<ExitStatus>,
    pub capture_lines: usize,
}

pub struct MonitorRun {
    config: MonitorConfig,
    queries: MetricQuerySet,
    sampler: Sampler,
}

impl MonitorRun {
    /// Validate the configuration; nothing is spawned yet
    pub fn new(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let queries = config.query_set()?;
        let sampler = Sampler::new(config.sampler_config());

        Ok(Self {
            config,
            queries,
            sampler,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn queries(&self) -> &MetricQuerySet {
        &self.queries
    }

    /// Flag that stops sampling at the next cycle boundary when set
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.sampler.cancel_flag.clone()
    }

    /// Run against the configured node and stress tool
    pub fn execute(&self) -> Result<RunOutcome> {
        probe::check_reachable(
            &self.config.host,
            self.config.jmx_port,
            self.config.probe_timeout(),
        )?;

        let (program, args) = self.config.session_command();
        let mut session = Session::open(&program, &args)?;
        log::info!("Session {} running as pid {}", program, session.pid());

        let endpoint = self.config.jmx_endpoint();
        let reply_timeout = self.sampler.config().reply_timeout;
        if let Err(e) = connect(&mut session, &endpoint, reply_timeout) {
            session.close();
            return Err(e);
        }

        let stress = self.config.stress_executable();
        let workload = match WorkloadRunner::start(
            &stress.to_string_lossy(),
            &stress_write_args(self.config.stress_count, self.config.stress_threads),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                session.close();
                return Err(e);
            }
        };

        log::info!("Stress test STARTED (pid {})", workload.pid());
        let acquisition = self.acquire(&mut session, workload);
        session.close();
        log::info!("Stress test STOPPED");

        self.finish(acquisition?)
    }

    /// Sample over `channel` until `workload` finishes.
    ///
    /// On a channel failure the workload is killed and reaped, and the
    /// partial capture is written to the capture path and handed back with
    /// the error.
    pub fn acquire<C: LineChannel>(
        &self,
        channel: &mut C,
        workload: WorkloadHandle,
    ) -> std::result::Result<Acquisition, AcquisitionFailure> {
        let mut capture = CaptureRecord::new();
        let completion = workload.completion();

        match self
            .sampler
            .run(channel, &self.queries, &completion, &mut capture)
        {
            Ok(report) => {
                if !workload.is_finished() {
                    workload.kill();
                }
                let workload_status = workload.wait();
                Ok(Acquisition {
                    capture,
                    report,
                    workload_status,
                })
            }
            Err(error) => {
                log::error!("Sampling failed: {}", error);
                workload.kill();
                let workload_status = workload.wait();

                let path = Path::new(&self.config.capture_path);
                match capture.save(path) {
                    Ok(()) => log::info!("Partial capture kept at {}", path.display()),
                    Err(save_err) => log::warn!("Could not save partial capture: {}", save_err),
                }
                Err(AcquisitionFailure {
                    error,
                    capture,
                    workload_status,
                })
            }
        }
    }

    /// Persist the capture, parse it and write the time series
    pub fn finish(&self, acquisition: Acquisition) -> Result<RunOutcome> {
        let Acquisition {
            capture,
            report,
            workload_status,
        } = acquisition;

        capture.save(Path::new(&self.config.capture_path))?;

        let store = parser::parse(&capture, &self.queries.definitions())?;
        if report.was_cancelled || store.is_aligned() {
            log::info!("Parsed {} cycles for {} metrics", store.cycles(), store.len());
        } else {
            log::warn!("Series lengths differ after {} cycles", report.cycles);
        }

        store.save_json(Path::new(&self.config.output_path))?;

        Ok(RunOutcome {
            store,
            report,
            workload_status,
            capture_lines: capture.len(),
        })
    }
}

/// Open the JMX connection inside the session and wait for confirmation
pub fn connect<C: LineChannel>(channel: &mut C, endpoint: &str, timeout: Duration) -> Result<()> {
    channel.send(&format!("open {}", endpoint))?;

    loop {
        let line = channel.receive_line(timeout)?;
        if line.contains("is opened") {
            log::info!("JMX connection to {} opened", endpoint);
            return Ok(());
        }
        if line.trim_start().starts_with('#')
            && (line.contains("Exception") || line.contains("Error"))
        {
            return Err(MonitorError::unreachable(format!("{}: {}", endpoint, line)));
        }
    }
}

/// Re-parse a saved capture file
pub fn replay(capture_path: &Path, queries: &MetricQuerySet) -> Result<TimeSeriesStore> {
    let capture = CaptureRecord::load(capture_path)?;
    parser::parse(&capture, &queries.definitions())
}
