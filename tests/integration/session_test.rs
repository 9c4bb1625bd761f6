// Integration tests for the subprocess-backed session channel
// These spawn real processes (cat, sh) and only run on Unix

#![cfg(unix)]

use jmxmon::core::capture::CaptureRecord;
use jmxmon::core::parser;
use jmxmon::core::session::{LineChannel, Session, SessionState};
use jmxmon::core::{CompletionFlag, MetricQuerySet, MetricValue, Sampler, SamplerConfig};
use jmxmon::MonitorError;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn test_send_and_receive_through_cat() {
    let mut session = Session::open::<&str>("cat", &[]).unwrap();

    session.send("hello").unwrap();
    assert_eq!(session.receive_line(TIMEOUT).unwrap(), "hello");

    session.send("$>prompted").unwrap();
    assert_eq!(session.receive_line(TIMEOUT).unwrap(), "prompted");

    session.close();
}

#[test]
fn test_stderr_is_merged_into_replies() {
    let mut session = Session::open("sh", &["-c", "echo oops 1>&2"]).unwrap();
    assert_eq!(session.receive_line(TIMEOUT).unwrap(), "oops");
}

#[test]
fn test_interleaved_stderr_and_stdout_keep_write_order() {
    let rounds = 300;
    let script = format!(
        "i=0; while [ $i -lt {} ]; do echo \"#mbean = x:name=M$i:\" >&2; echo $i; i=$((i+1)); done",
        rounds
    );
    let mut session = Session::open("sh", &["-c", script.as_str()]).unwrap();

    for i in 0..rounds {
        let header = session.receive_line(TIMEOUT).unwrap();
        let value = session.receive_line(TIMEOUT).unwrap();
        assert_eq!(header, format!("#mbean = x:name=M{}:", i));
        assert_eq!(value, i.to_string());
    }

    let err = session.receive_line(TIMEOUT).unwrap_err();
    assert!(matches!(err, MonitorError::EndOfStream));
}

/// Answers every `get` like jmxterm does: header on stderr, value on stdout
const SPLIT_STREAM_JMXTERM: &str = r##"
while read cmd; do
    case "$cmd" in
        get*)
            name=${cmd##*name=}
            name=${name%% *}
            echo "#mbean = org.apache.cassandra.metrics:name=$name:" >&2
            echo 7
            ;;
        quit)
            exit 0
            ;;
    esac
done
"##;

#[test]
fn test_sampler_over_split_stream_session() {
    let cycles = 50;
    let queries = MetricQuerySet::build("keyspace1", "standard1").unwrap();
    let sampler = Sampler::new(SamplerConfig {
        interval: Duration::ZERO,
        reply_timeout: TIMEOUT,
        max_cycles: Some(cycles),
    });

    let mut session = Session::open("sh", &["-c", SPLIT_STREAM_JMXTERM]).unwrap();
    assert!(session.pid() > 0);

    let mut capture = CaptureRecord::new();
    let report = sampler
        .run(&mut session, &queries, &CompletionFlag::new(), &mut capture)
        .unwrap();
    session.close();

    assert_eq!(report.cycles, cycles);
    assert_eq!(report.missing_replies, 0);

    let store = parser::parse(&capture, &queries.definitions()).unwrap();
    assert!(store.is_aligned());
    for query in queries.queries() {
        let series = store.series(&query.metric.name);
        assert_eq!(series.len(), cycles);
        assert!(series.iter().all(|s| s.value.as_f64() == Some(7.0)));
    }
    assert_eq!(
        store.series("LiveSSTableCount")[0].value,
        MetricValue::Integer(7)
    );
}

#[test]
fn test_receive_times_out_without_output() {
    let mut session = Session::open::<&str>("cat", &[]).unwrap();
    let err = session.receive_line(Duration::from_millis(50)).unwrap_err();
    assert!(matches!(err, MonitorError::Timeout(_)));
}

#[test]
fn test_end_of_stream_after_exit() {
    let mut session = Session::open("sh", &["-c", "echo last"]).unwrap();
    assert_eq!(session.receive_line(TIMEOUT).unwrap(), "last");

    let err = session.receive_line(TIMEOUT).unwrap_err();
    assert!(matches!(err, MonitorError::EndOfStream));
}

#[test]
fn test_send_after_exit_is_write_error() {
    let mut session = Session::open("sh", &["-c", "exit 0"]).unwrap();

    // both pipes closing means the process is gone
    let err = session.receive_line(TIMEOUT).unwrap_err();
    assert!(matches!(err, MonitorError::EndOfStream));

    let err = session.send("get -s -b x Value").unwrap_err();
    assert!(matches!(err, MonitorError::Write(_)));
}

#[test]
fn test_close_is_idempotent_and_blocks_writes() {
    let mut session = Session::open::<&str>("cat", &[]).unwrap();
    session.close();
    session.close();
    assert_eq!(session.state(), SessionState::Closed);

    let err = session.send("anything").unwrap_err();
    assert!(matches!(err, MonitorError::Write(_)));
}

#[test]
fn test_close_kills_process_ignoring_quit() {
    // ignores stdin entirely, so only the kill after the grace period ends it
    let mut session = Session::open("sleep", &["30"]).unwrap();
    session.close();
    assert!(!session.is_open());
}
