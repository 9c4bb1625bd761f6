//! Interactive management session over a child process's standard streams.
//!
//! Framing is purely line based: one command per written line, replies are
//! whatever lines the process prints. Standard output and standard error
//! share a single OS pipe, so the reply stream keeps the exact order in which
//! the process wrote to either of them. jmxterm prints the `#mbean` header on
//! stderr and the value on stdout.

#[doc(hidden)]
pub mod fake;

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{MonitorError, Result};

/// Command that asks jmxterm to exit
pub const TERMINATION_COMMAND: &str = "quit";

/// Interactive prompt jmxterm prints in front of replies
const PROMPT_PREFIX: &str = "$>";

const CLOSE_GRACE: Duration = Duration::from_secs(2);
const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Line-oriented request/response channel.
///
/// Implementations are strictly request-then-response: a caller must read the
/// reply to one command before sending the next.
pub trait LineChannel {
    /// Write one command line
    fn send(&mut self, line: &str) -> Result<()>;

    /// Read the next reply line, waiting at most `timeout`
    fn receive_line(&mut self, timeout: Duration) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// An interactive subprocess owned for the lifetime of one run.
///
/// Only `&mut self` methods touch the command stream, so a single owner is
/// the single writer. Share it behind a mutex if more writers are needed.
pub struct Session {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    replies: Receiver<String>,
    state: SessionState,
}

impl Session {
    /// Spawn `command` with `arguments` and start reading its output
    pub fn open<S: AsRef<str>>(command: &str, arguments: &[S]) -> Result<Self> {
        let resolved = resolve_executable(command)?;
        let args: Vec<&str> = arguments.iter().map(AsRef::as_ref).collect();

        log::info!("Opening session: {} {}", command, args.join(" "));

        let (reply_reader, reply_writer) = io::pipe()
            .map_err(|e| MonitorError::launch(format!("reply pipe for {}: {}", command, e)))?;
        let error_writer = reply_writer
            .try_clone()
            .map_err(|e| MonitorError::launch(format!("reply pipe for {}: {}", command, e)))?;

        // The Command owns both write ends and is dropped at the end of this
        // statement, so the reader sees EOF once the child exits.
        let mut child = Command::new(&resolved)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(reply_writer)
            .stderr(error_writer)
            .spawn()
            .map_err(|e| MonitorError::launch(format!("{}: {}", command, e)))?;

        let (tx, rx) = mpsc::channel();
        spawn_reader(reply_reader, tx);

        let stdin = child.stdin.take();

        Ok(Self {
            program: command.to_string(),
            child,
            stdin,
            replies: rx,
            state: SessionState::Open,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Best-effort graceful shutdown. Safe to call more than once.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;

        if let Some(mut stdin) = self.stdin.take() {
            let _ = writeln!(stdin, "{}", TERMINATION_COMMAND);
            let _ = stdin.flush();
            // dropping stdin delivers EOF
        }

        let deadline = Instant::now() + CLOSE_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    log::info!("Session {} exited with {}", self.program, status);
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(CLOSE_POLL_INTERVAL),
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Error checking session {}: {}", self.program, e);
                    break;
                }
            }
        }

        log::warn!(
            "Session {} did not exit within {:?}, killing it",
            self.program,
            CLOSE_GRACE
        );
        if let Err(e) = self.child.kill() {
            log::warn!("Failed to kill session {}: {}", self.program, e);
        }
        let _ = self.child.wait();
    }
}

impl LineChannel for Session {
    fn send(&mut self, line: &str) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(MonitorError::write("session is closed"));
        }

        if let Ok(Some(status)) = self.child.try_wait() {
            return Err(MonitorError::write(format!(
                "{} exited with {}",
                self.program, status
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MonitorError::write("session has no command stream"))?;

        stdin
            .write_all(format!("{}\n", line).as_bytes())
            .and_then(|_| stdin.flush())
            .map_err(|e| MonitorError::write(format!("{}: {}", self.program, e)))?;

        log::debug!("> {}", line);
        Ok(())
    }

    fn receive_line(&mut self, timeout: Duration) -> Result<String> {
        match self.replies.recv_timeout(timeout) {
            Ok(line) => {
                log::debug!("< {}", line);
                Ok(line)
            }
            Err(RecvTimeoutError::Timeout) => Err(MonitorError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(MonitorError::EndOfStream),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolve a program name through PATH, or check an explicit path exists
fn resolve_executable(command: &str) -> Result<PathBuf> {
    if command.trim().is_empty() {
        return Err(MonitorError::launch("no executable given"));
    }

    which::which(command).map_err(|e| MonitorError::launch(format!("{}: {}", command, e)))
}

/// Forward every line of `stream` to `tx` until EOF or the receiver is gone
fn spawn_reader<R: Read + Send + 'static>(stream: R, tx: Sender<String>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(clean_line(&buf)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("Session stream read failed: {}", e);
                    break;
                }
            }
        }
    });
}

/// Decode one raw line: lossy UTF-8, no line terminator, no prompt prefix
pub fn clean_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end_matches(['\n', '\r']);

    match text.strip_prefix(PROMPT_PREFIX) {
        Some(rest) => rest.trim_start().to_string(),
        None => text.to_string(),
    }
}
