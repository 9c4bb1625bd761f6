// Integration tests for sampling, parsing and run orchestration
// The management session is replaced by the scripted fake channel

use jmxmon::core::capture::CaptureRecord;
use jmxmon::core::parser;
use jmxmon::core::session::fake::{FakeJmxChannel, FakeReply};
use jmxmon::core::{
    CompletionFlag, MetricQuerySet, MetricValue, MonitorConfig, MonitorRun, Sampler,
    SamplerConfig,
};
use jmxmon::MonitorError;
use std::time::Duration;
use tempfile::TempDir;

fn fast_sampler() -> Sampler {
    Sampler::new(SamplerConfig {
        interval: Duration::from_millis(1),
        reply_timeout: Duration::from_millis(20),
        max_cycles: None,
    })
}

#[test]
fn test_series_lengths_equal_cycle_count() {
    let queries = MetricQuerySet::build("keyspace1", "standard1").unwrap();
    let flag = CompletionFlag::new();

    // finish the workload during the third cycle
    let per_cycle = queries.len();
    let observer = flag.clone();
    let mut channel = FakeJmxChannel::new()
        .with_default_value("3")
        .with_replies("WriteLatency", vec![FakeReply::Value("812.5".into())])
        .with_replies(
            "MemtableSwitchCount",
            vec![FakeReply::Value(String::new())],
        )
        .on_send(move |n, _| {
            if n == 2 * per_cycle + 1 {
                observer.mark_finished();
            }
        });

    let mut capture = CaptureRecord::new();
    let report = fast_sampler()
        .run(&mut channel, &queries, &flag, &mut capture)
        .unwrap();
    assert_eq!(report.cycles, 3);

    let store = parser::parse(&capture, &queries.definitions()).unwrap();
    assert!(store.is_aligned());
    for query in queries.queries() {
        let series = store.series(&query.metric.name);
        assert_eq!(series.len(), report.cycles, "{}", query.metric.name);
        let indices: Vec<_> = series.iter().map(|s| s.index).collect();
        assert_eq!(indices, (0..report.cycles).collect::<Vec<_>>());
    }

    assert_eq!(store.series("WriteLatency")[0].value, MetricValue::Float(812.5));
    assert_eq!(store.series("WriteLatency")[1].value, MetricValue::Float(3.0));
    assert!(store.series("MemtableSwitchCount")[0].value.is_missing());
}

#[test]
fn test_in_flight_cycle_completes_after_completion() {
    let queries = MetricQuerySet::build("keyspace1", "standard1").unwrap();
    let flag = CompletionFlag::new();

    // completion arrives right after the first query of the first cycle
    let observer = flag.clone();
    let mut channel = FakeJmxChannel::new().on_send(move |n, _| {
        if n == 1 {
            observer.mark_finished();
        }
    });

    let mut capture = CaptureRecord::new();
    let report = fast_sampler()
        .run(&mut channel, &queries, &flag, &mut capture)
        .unwrap();

    assert_eq!(report.cycles, 1);
    assert_eq!(channel.writes().len(), queries.len());

    let store = parser::parse(&capture, &queries.definitions()).unwrap();
    assert!(store.is_aligned());
    assert_eq!(store.cycles(), 1);
}

#[test]
fn test_write_error_leaves_capture_unchanged() {
    let queries = MetricQuerySet::build("keyspace1", "standard1").unwrap();
    let flag = CompletionFlag::new();

    // break the pipe on the first query of the second cycle
    let mut channel = FakeJmxChannel::new().fail_send_at(queries.len() + 1);
    let mut capture = CaptureRecord::new();

    let err = fast_sampler()
        .run(&mut channel, &queries, &flag, &mut capture)
        .unwrap_err();
    assert!(matches!(err, MonitorError::Write(_)));

    // exactly one full cycle: echo, header, value per query
    assert_eq!(capture.len(), queries.len() * 3);
    assert_eq!(
        capture.lines().last().map(String::as_str),
        Some("0"),
        "no partial line after the failed send"
    );

    let store = parser::parse(&capture, &queries.definitions()).unwrap();
    assert!(store.is_aligned());
    assert_eq!(store.cycles(), 1);
}

#[test]
fn test_header_only_reply_drops_sample_at_end_of_record() {
    let queries = MetricQuerySet::build("keyspace1", "standard1").unwrap();
    let last = queries.queries().last().unwrap().metric.name.clone();
    let flag = CompletionFlag::new();

    let mut channel = FakeJmxChannel::new().with_replies(&last, vec![FakeReply::HeaderOnly]);
    let mut capture = CaptureRecord::new();

    let err = fast_sampler()
        .run(&mut channel, &queries, &flag, &mut capture)
        .unwrap_err();
    assert!(matches!(err, MonitorError::Timeout(_)));

    let store = parser::parse(&capture, &queries.definitions()).unwrap();
    assert!(store.series(&last).is_empty());
    assert_eq!(store.series(&queries.queries()[0].metric.name).len(), 1);
}

#[test]
fn test_reparse_is_idempotent() {
    let queries = MetricQuerySet::build("keyspace1", "standard1").unwrap();
    let flag = CompletionFlag::new();
    let observer = flag.clone();
    let per_cycle = queries.len();
    let mut channel = FakeJmxChannel::new()
        .with_banner(&["#Connection to 127.0.0.1:7199 is opened"])
        .on_send(move |n, _| {
            if n == per_cycle {
                observer.mark_finished();
            }
        });

    let mut capture = CaptureRecord::new();
    fast_sampler()
        .run(&mut channel, &queries, &flag, &mut capture)
        .unwrap();

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("capture.log");
    capture.save(&path).unwrap();

    let first = jmxmon::core::pipeline::replay(&path, &queries).unwrap();
    let second = jmxmon::core::pipeline::replay(&path, &queries).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, parser::parse(&capture, &queries.definitions()).unwrap());
}

#[cfg(unix)]
#[test]
fn test_acquire_and_finish_with_real_workload() {
    use jmxmon::core::WorkloadRunner;

    let temp_dir = TempDir::new().unwrap();
    let config = MonitorConfig {
        interval_ms: 20,
        reply_timeout_ms: 100,
        capture_path: temp_dir.path().join("capture.log").to_string_lossy().to_string(),
        output_path: temp_dir.path().join("series.json").to_string_lossy().to_string(),
        log_file: None,
        ..Default::default()
    };
    let run = MonitorRun::new(config).unwrap();

    let workload = WorkloadRunner::start("sh", &["-c", "sleep 0.3; exit 1"]).unwrap();
    let mut channel = FakeJmxChannel::new().with_default_value("42");

    let acquisition = run.acquire(&mut channel, workload).unwrap();
    assert!(acquisition.report.cycles >= 1);
    assert_eq!(acquisition.workload_status.and_then(|s| s.code()), Some(1));

    let cycles = acquisition.report.cycles;
    let outcome = run.finish(acquisition).unwrap();
    assert!(outcome.store.is_aligned());
    assert_eq!(outcome.store.cycles(), cycles);
    assert_eq!(
        outcome.store.series("LiveSSTableCount")[0].value,
        MetricValue::Integer(42)
    );

    assert!(temp_dir.path().join("capture.log").exists());
    let json = std::fs::read_to_string(temp_dir.path().join("series.json")).unwrap();
    assert!(json.contains("LiveSSTableCount"));
}

#[cfg(unix)]
#[test]
fn test_acquire_failure_keeps_partial_capture() {
    use jmxmon::core::WorkloadRunner;

    let temp_dir = TempDir::new().unwrap();
    let capture_path = temp_dir.path().join("partial.log");
    let config = MonitorConfig {
        interval_ms: 1,
        reply_timeout_ms: 20,
        capture_path: capture_path.to_string_lossy().to_string(),
        log_file: None,
        ..Default::default()
    };
    let run = MonitorRun::new(config).unwrap();

    let workload = WorkloadRunner::start("sleep", &["30"]).unwrap();
    let completion = workload.completion();
    let mut channel = FakeJmxChannel::new().fail_send_at(3);

    let failure = run.acquire(&mut channel, workload).unwrap_err();
    assert!(matches!(failure.error, MonitorError::Write(_)));

    // the workload is killed and reaped before acquire returns
    assert!(completion.is_finished());
    assert!(failure.workload_status.is_some());

    // the caller gets the same partial capture that was written to disk
    assert_eq!(failure.capture.len(), 2 * 3);
    let saved = CaptureRecord::load(&capture_path).unwrap();
    assert_eq!(saved, failure.capture);

    let err: MonitorError = failure.into();
    assert!(err.is_channel_failure());
}
