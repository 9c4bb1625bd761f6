//! Background stress workload and the completion signal the sampler watches.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{MonitorError, Result};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Monotonic "workload has stopped running" flag.
///
/// Written once by the runner, read by anyone holding a clone.
#[derive(Debug, Clone, Default)]
pub struct CompletionFlag(Arc<AtomicBool>);

impl CompletionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark the workload as finished. There is no way back to unfinished.
    pub fn mark_finished(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Arguments for `cassandra-stress write n=<count> -rate threads=<threads>`
pub fn stress_write_args(count: u64, threads: u32) -> Vec<String> {
    vec![
        "write".to_string(),
        format!("n={}", count),
        "-rate".to_string(),
        format!("threads={}", threads),
    ]
}

/// Handle on a running workload process
pub struct WorkloadHandle {
    completion: CompletionFlag,
    kill_requested: Arc<AtomicBool>,
    waiter: Option<JoinHandle<Option<ExitStatus>>>,
    pid: u32,
}

impl WorkloadHandle {
    /// True once the process has exited, whatever its exit status
    pub fn is_finished(&self) -> bool {
        self.completion.is_finished()
    }

    /// Clone of the completion flag for observers
    pub fn completion(&self) -> CompletionFlag {
        self.completion.clone()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Ask the runner to kill the process. Completion still flips only once
    /// the process has actually exited.
    pub fn kill(&self) {
        self.kill_requested.store(true, Ordering::Relaxed);
    }

    /// Block until the process exits and return its status, if it could be read
    pub fn wait(mut self) -> Option<ExitStatus> {
        self.waiter.take().and_then(|h| h.join().ok()).flatten()
    }
}

impl Drop for WorkloadHandle {
    fn drop(&mut self) {
        // never leave the workload running behind an abandoned handle
        if let Some(waiter) = self.waiter.take() {
            if !self.completion.is_finished() {
                self.kill();
            }
            let _ = waiter.join();
        }
    }
}

/// Launches the workload and watches it from a background thread
pub struct WorkloadRunner;

impl WorkloadRunner {
    pub fn start<S: AsRef<str>>(executable: &str, arguments: &[S]) -> Result<WorkloadHandle> {
        let args: Vec<&str> = arguments.iter().map(AsRef::as_ref).collect();
        log::info!("Starting workload: {} {}", executable, args.join(" "));

        let mut child = Command::new(executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MonitorError::launch(format!("{}: {}", executable, e)))?;

        if let Some(stdout) = child.stdout.take() {
            forward_output(stdout, false);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(stderr, true);
        }

        let pid = child.id();
        let completion = CompletionFlag::new();
        let kill_requested = Arc::new(AtomicBool::new(false));

        let flag = completion.clone();
        let kill = kill_requested.clone();
        let program = executable.to_string();

        let waiter = thread::spawn(move || {
            let mut kill_sent = false;
            let status = loop {
                match child.try_wait() {
                    Ok(Some(status)) => break Some(status),
                    Ok(None) => {}
                    Err(e) => {
                        log::error!("Error checking workload {}: {}", program, e);
                        break child.wait().ok();
                    }
                }

                if !kill_sent && kill.load(Ordering::Relaxed) {
                    log::warn!("Killing workload {}", program);
                    if let Err(e) = child.kill() {
                        log::warn!("Failed to kill workload {}: {}", program, e);
                    }
                    kill_sent = true;
                }

                thread::sleep(EXIT_POLL_INTERVAL);
            };

            match status {
                Some(status) if status.success() => {
                    log::info!("Workload {} finished", program)
                }
                Some(status) => log::warn!("Workload {} exited with {}", program, status),
                None => log::warn!("Workload {} stopped with unknown status", program),
            }

            flag.mark_finished();
            status
        });

        Ok(WorkloadHandle {
            completion,
            kill_requested,
            waiter: Some(waiter),
            pid,
        })
    }
}

fn forward_output<R: Read + Send + 'static>(stream: R, is_stderr: bool) {
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(std::result::Result::ok) {
            if is_stderr {
                log::warn!(target: "stress", "{}", line);
            } else {
                log::info!(target: "stress", "{}", line);
            }
        }
    });
}
