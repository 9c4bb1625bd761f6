// Core acquisition pipeline

pub mod capture;
pub mod config;
pub mod parser;
pub mod pipeline;
pub mod probe;
pub mod queries;
pub mod sampler;
pub mod series;
pub mod session;
pub mod workload;

// Re-export commonly used items
pub use capture::CaptureRecord;
pub use config::MonitorConfig;
pub use pipeline::{Acquisition, AcquisitionFailure, MonitorRun, RunOutcome};
pub use queries::{MetricDefinition, MetricQuerySet, ValueKind};
pub use sampler::{Sampler, SamplerConfig, SamplingReport};
pub use series::{MetricValue, Sample, TimeSeriesStore};
pub use session::{LineChannel, Session};
pub use workload::{CompletionFlag, WorkloadHandle, WorkloadRunner};
