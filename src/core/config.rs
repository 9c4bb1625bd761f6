use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::queries::{default_metrics, MetricDefinition, MetricQuerySet};
use crate::core::sampler::SamplerConfig;
use crate::error::MonitorError;

pub const DEFAULT_CASSANDRA_DIR: &str = "cassandra";
pub const DEFAULT_JMXTERM_PATH: &str = "lib/jmxterm.jar";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_JMX_PORT: u16 = 7199;
pub const DEFAULT_LOG_FILE: &str = "stress_test.log";

/// Settings for one monitoring run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Cassandra installation; the stress tool lives under `tools/bin`
    pub cassandra_dir: String,
    pub java: String,
    pub jmxterm_path: String,
    pub host: String,
    pub jmx_port: u16,
    pub keyspace: String,
    pub scope: String,
    pub interval_ms: u64,
    pub reply_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub stress_count: u64,
    pub stress_threads: u32,
    pub capture_path: String,
    pub output_path: String,
    pub log_file: Option<String>,
    /// Overrides the built-in metric list when set
    pub metrics: Option<Vec<MetricDefinition>>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            cassandra_dir: DEFAULT_CASSANDRA_DIR.to_string(),
            java: "java".to_string(),
            jmxterm_path: DEFAULT_JMXTERM_PATH.to_string(),
            host: DEFAULT_HOST.to_string(),
            jmx_port: DEFAULT_JMX_PORT,
            keyspace: "keyspace1".to_string(),
            scope: "standard1".to_string(),
            interval_ms: 1000,
            reply_timeout_ms: 5000,
            probe_timeout_ms: 2000,
            stress_count: 100_000,
            stress_threads: 4,
            capture_path: "jmx_capture.log".to_string(),
            output_path: "jmx_series.json".to_string(),
            log_file: Some(DEFAULT_LOG_FILE.to_string()),
            metrics: None,
        }
    }
}

impl MonitorConfig {
    /// Load from `path`, or from the default location when `path` is None.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            if path.is_some() {
                anyhow::bail!("Config file not found: {}", config_path.display());
            }
            return Ok(Self::default());
        }

        let data = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {:?}", parent)
                })?;
            }
        }

        let data = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, data)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(config_path)
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("jmxmon").join("config.json"))
    }

    /// Reject settings that cannot produce a run, before anything is spawned
    pub fn validate(&self) -> std::result::Result<(), MonitorError> {
        if self.interval_ms == 0 {
            return Err(MonitorError::config("interval must be greater than zero"));
        }
        if self.reply_timeout_ms == 0 {
            return Err(MonitorError::config("reply timeout must be greater than zero"));
        }
        if self.stress_count == 0 {
            return Err(MonitorError::config("stress count must be greater than zero"));
        }
        if self.stress_threads == 0 {
            return Err(MonitorError::config("stress threads must be greater than zero"));
        }
        if self.host.trim().is_empty() {
            return Err(MonitorError::config("host must not be empty"));
        }
        if self.jmxterm_path.trim().is_empty() {
            return Err(MonitorError::config("jmxterm path must not be empty"));
        }

        self.query_set().map(|_| ())
    }

    pub fn metric_definitions(&self) -> Vec<MetricDefinition> {
        self.metrics.clone().unwrap_or_else(default_metrics)
    }

    pub fn query_set(&self) -> std::result::Result<MetricQuerySet, MonitorError> {
        MetricQuerySet::with_metrics(&self.keyspace, &self.scope, self.metric_definitions())
    }

    pub fn stress_executable(&self) -> PathBuf {
        Path::new(&self.cassandra_dir)
            .join("tools")
            .join("bin")
            .join("cassandra-stress")
    }

    /// Executable and arguments for the jmxterm session
    pub fn session_command(&self) -> (String, Vec<String>) {
        (
            self.java.clone(),
            vec![
                "-jar".to_string(),
                self.jmxterm_path.clone(),
                "-n".to_string(),
            ],
        )
    }

    pub fn jmx_endpoint(&self) -> String {
        format!("{}:{}", self.host, self.jmx_port)
    }

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            interval: Duration::from_millis(self.interval_ms),
            reply_timeout: Duration::from_millis(self.reply_timeout_ms),
            max_cycles: None,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}
