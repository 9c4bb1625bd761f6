//! Scripted in-memory stand-in for a jmxterm session, used in tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use super::LineChannel;
use crate::error::{MonitorError, Result};

/// How the fake answers one `get` for a metric
#[derive(Debug, Clone, PartialEq)]
pub enum FakeReply {
    /// Header line followed by this value line
    Value(String),
    /// A `#`-prefixed exception line and no value
    Error(String),
    /// Header line only, as if the process died mid-reply
    HeaderOnly,
    /// Nothing at all; the next read times out
    Silent,
}

type SendHook = Box<dyn FnMut(usize, &str) + Send>;

/// Fake session that answers `get -s -b <bean> <attr>` commands.
///
/// Replies for a metric are taken from its script in order; once the script
/// is exhausted the default value is returned.
pub struct FakeJmxChannel {
    pending: VecDeque<String>,
    writes: Vec<String>,
    scripts: HashMap<String, VecDeque<FakeReply>>,
    default_value: String,
    banner: Vec<String>,
    fail_send_at: Option<usize>,
    on_send: Option<SendHook>,
    sends: usize,
}

impl Default for FakeJmxChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeJmxChannel {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            writes: Vec::new(),
            scripts: HashMap::new(),
            default_value: "0".to_string(),
            banner: Vec::new(),
            fail_send_at: None,
            on_send: None,
            sends: 0,
        }
    }

    pub fn with_default_value<S: Into<String>>(mut self, value: S) -> Self {
        self.default_value = value.into();
        self
    }

    /// Script the replies for one metric
    pub fn with_replies(mut self, metric: &str, replies: Vec<FakeReply>) -> Self {
        self.scripts
            .entry(metric.to_string())
            .or_default()
            .extend(replies);
        self
    }

    /// Noise lines printed before every reply header
    pub fn with_banner(mut self, lines: &[&str]) -> Self {
        self.banner = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Make the `n`-th send (1-based) fail with a write error
    pub fn fail_send_at(mut self, n: usize) -> Self {
        self.fail_send_at = Some(n);
        self
    }

    /// Called after every successful send with the send count and the line
    pub fn on_send<F>(mut self, hook: F) -> Self
    where
        F: FnMut(usize, &str) + Send + 'static,
    {
        self.on_send = Some(Box::new(hook));
        self
    }

    /// Lines successfully sent so far
    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    fn answer(&mut self, line: &str) {
        let Some(object_name) = line.split_whitespace().nth(3) else {
            self.pending.push_back(format!("#Unknown command: {}", line));
            return;
        };
        let metric = object_name
            .rsplit("name=")
            .next()
            .unwrap_or(object_name)
            .to_string();

        let reply = self
            .scripts
            .get_mut(&metric)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| FakeReply::Value(self.default_value.clone()));

        let header = format!("#mbean = {}:", object_name);
        self.pending.extend(self.banner.iter().cloned());

        match reply {
            FakeReply::Value(value) => {
                self.pending.push_back(header);
                self.pending.push_back(value);
            }
            FakeReply::Error(message) => {
                self.pending.push_back(format!("#{}", message));
            }
            FakeReply::HeaderOnly => self.pending.push_back(header),
            FakeReply::Silent => {}
        }
    }
}

impl LineChannel for FakeJmxChannel {
    fn send(&mut self, line: &str) -> Result<()> {
        let attempt = self.sends + 1;
        if self.fail_send_at == Some(attempt) {
            return Err(MonitorError::write("broken pipe"));
        }
        self.sends = attempt;
        self.writes.push(line.to_string());

        if line.starts_with("get ") {
            self.answer(line);
        }

        if let Some(hook) = self.on_send.as_mut() {
            hook(attempt, line);
        }
        Ok(())
    }

    fn receive_line(&mut self, timeout: Duration) -> Result<String> {
        self.pending
            .pop_front()
            .ok_or(MonitorError::Timeout(timeout))
    }
}
