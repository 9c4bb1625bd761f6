//! Metric definitions and the jmxterm query text for each of them.
//!
//! The monitored process has no structured query language: a reply can only
//! be matched back to its metric if the object name in the query reproduces
//! the MBean naming scheme exactly.

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// JMX domain of the Cassandra metrics registry
pub const METRICS_NAMESPACE: &str = "org.apache.cassandra.metrics";

/// MBean type for per-table metrics
pub const COLUMN_FAMILY_TYPE: &str = "ColumnFamily";

/// How a metric's reply is coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Integer,
    Float,
}

impl ValueKind {
    /// Attribute read from the MBean: gauges expose `Value`, latency timers
    /// are read at their 95th percentile.
    pub fn attribute(&self) -> &'static str {
        match self {
            ValueKind::Integer => "Value",
            ValueKind::Float => "95thPercentile",
        }
    }
}

/// One sampled metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    pub kind: ValueKind,
}

impl MetricDefinition {
    pub fn new<S: Into<String>>(name: S, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Full MBean object name for this metric within a keyspace/table scope
    pub fn object_name(&self, keyspace: &str, scope: &str) -> String {
        format!(
            "{}:type={},keyspace={},scope={},name={}",
            METRICS_NAMESPACE, COLUMN_FAMILY_TYPE, keyspace, scope, self.name
        )
    }

    /// jmxterm command reading this metric
    pub fn query(&self, keyspace: &str, scope: &str) -> String {
        format!(
            "get -s -b {} {}",
            self.object_name(keyspace, scope),
            self.kind.attribute()
        )
    }
}

/// Metrics sampled when the configuration does not override them, in issue order
pub fn default_metrics() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::new("LiveSSTableCount", ValueKind::Integer),
        MetricDefinition::new("LiveDiskSpaceUsed", ValueKind::Integer),
        MetricDefinition::new("MemtableColumnsCount", ValueKind::Integer),
        MetricDefinition::new("MemtableLiveDataSize", ValueKind::Integer),
        MetricDefinition::new("MemtableSwitchCount", ValueKind::Integer),
        MetricDefinition::new("PendingCompactions", ValueKind::Integer),
        MetricDefinition::new("WriteLatency", ValueKind::Float),
        MetricDefinition::new("ReadLatency", ValueKind::Float),
    ]
}

/// A query ready to be sent, paired with the metric it reads
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub metric: MetricDefinition,
    pub text: String,
}

/// The ordered set of queries issued once per poll cycle
#[derive(Debug, Clone)]
pub struct MetricQuerySet {
    keyspace: String,
    scope: String,
    queries: Vec<MetricQuery>,
}

impl MetricQuerySet {
    /// Build the query set for the default metrics
    pub fn build(keyspace: &str, scope: &str) -> Result<Self> {
        Self::with_metrics(keyspace, scope, default_metrics())
    }

    /// Build the query set for an explicit list of metrics
    pub fn with_metrics(
        keyspace: &str,
        scope: &str,
        metrics: Vec<MetricDefinition>,
    ) -> Result<Self> {
        validate_identifier("keyspace", keyspace)?;
        validate_identifier("scope", scope)?;
        validate_metrics(&metrics)?;

        let queries = metrics
            .into_iter()
            .map(|metric| {
                let text = metric.query(keyspace, scope);
                MetricQuery { metric, text }
            })
            .collect();

        Ok(Self {
            keyspace: keyspace.to_string(),
            scope: scope.to_string(),
            queries,
        })
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Queries in issue order
    pub fn queries(&self) -> &[MetricQuery] {
        &self.queries
    }

    /// Query text for a metric name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.queries
            .iter()
            .find(|q| q.metric.name == name)
            .map(|q| q.text.as_str())
    }

    pub fn definitions(&self) -> Vec<MetricDefinition> {
        self.queries.iter().map(|q| q.metric.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

impl std::ops::Index<&str> for MetricQuerySet {
    type Output = str;

    fn index(&self, name: &str) -> &str {
        match self.get(name) {
            Some(text) => text,
            None => panic!("no query for metric '{}'", name),
        }
    }
}

/// Keyspace and scope are embedded verbatim in an MBean object name
fn validate_identifier(label: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(MonitorError::config(format!("{} must not be empty", label)));
    }

    if let Some(c) = value
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, ',' | '=' | ':' | '*' | '?'))
    {
        return Err(MonitorError::config(format!(
            "{} '{}' contains invalid character '{}'",
            label, value, c
        )));
    }

    Ok(())
}

fn validate_metrics(metrics: &[MetricDefinition]) -> Result<()> {
    if metrics.is_empty() {
        return Err(MonitorError::config("metric set must not be empty"));
    }

    let mut seen = std::collections::HashSet::new();
    for metric in metrics {
        validate_identifier("metric name", &metric.name)?;
        if !seen.insert(metric.name.as_str()) {
            return Err(MonitorError::config(format!(
                "metric '{}' is defined more than once",
                metric.name
            )));
        }
    }

    Ok(())
}
