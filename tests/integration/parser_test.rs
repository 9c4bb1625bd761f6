// Integration tests for the reply parser against generated capture records

use jmxmon::core::capture::CaptureRecord;
use jmxmon::core::parser::{self, header_metric};
use jmxmon::core::queries::default_metrics;
use jmxmon::core::{MetricQuerySet, MetricValue};

fn header(name: &str) -> String {
    format!(
        "#mbean = org.apache.cassandra.metrics:type=ColumnFamily,keyspace=keyspace1,scope=standard1,name={}:",
        name
    )
}

/// Capture as the sampler writes it: echo, header, value for each query
fn generated_capture(cycles: usize) -> Vec<String> {
    let queries = MetricQuerySet::build("keyspace1", "standard1").unwrap();
    let mut lines = vec![
        "Welcome to JMX terminal. Type \"help\" for available commands.".to_string(),
        "#Connection to 127.0.0.1:7199 is opened".to_string(),
    ];

    for cycle in 0..cycles {
        for (i, query) in queries.queries().iter().enumerate() {
            lines.push(query.text.clone());
            lines.push(header(&query.metric.name));
            lines.push(format!("{}", i * 1000 + cycle));
        }
    }
    lines
}

/// Small deterministic generator so failures are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn test_generated_capture_parses_exactly() {
    let cycles = 5;
    let capture: CaptureRecord = generated_capture(cycles).into_iter().collect();
    let store = parser::parse(&capture, &default_metrics()).unwrap();

    assert!(store.is_aligned());
    for (i, metric) in default_metrics().iter().enumerate() {
        let series = store.series(&metric.name);
        assert_eq!(series.len(), cycles);
        for (cycle, sample) in series.iter().enumerate() {
            let expected = (i * 1000 + cycle) as f64;
            assert_eq!(sample.index, cycle);
            assert_eq!(sample.value.as_f64(), Some(expected));
        }
    }
}

#[test]
fn test_integer_and_float_kinds() {
    let capture: CaptureRecord = vec![
        header("LiveSSTableCount"),
        "5".to_string(),
        header("ReadLatency"),
        "17.75".to_string(),
    ]
    .into_iter()
    .collect();
    let store = parser::parse(&capture, &default_metrics()).unwrap();

    assert_eq!(store.series("LiveSSTableCount")[0].value, MetricValue::Integer(5));
    assert_eq!(store.series("ReadLatency")[0].value, MetricValue::Float(17.75));
}

#[test]
fn test_reordered_captures_never_fail_or_overflow() {
    let cycles = 4;
    let original = generated_capture(cycles);
    let mut rng = Lcg(0x5eed);

    for _ in 0..200 {
        let mut lines = original.clone();
        // swap a handful of adjacent lines to simulate interleaved output
        for _ in 0..5 {
            let i = (rng.next() as usize) % (lines.len() - 1);
            lines.swap(i, i + 1);
        }

        let capture: CaptureRecord = lines.into_iter().collect();
        let store = parser::parse(&capture, &default_metrics()).unwrap();

        for metric in default_metrics() {
            assert!(store.series(&metric.name).len() <= cycles);
            let indices: Vec<_> = store.series(&metric.name).iter().map(|s| s.index).collect();
            assert_eq!(indices, (0..indices.len()).collect::<Vec<_>>());
        }
    }
}

#[test]
fn test_value_line_swapped_with_next_header_loses_only_one_sample() {
    let capture: CaptureRecord = vec![
        header("LiveSSTableCount"),
        header("PendingCompactions"),
        "1".to_string(),
        "2".to_string(),
    ]
    .into_iter()
    .collect();
    let store = parser::parse(&capture, &default_metrics()).unwrap();

    // the one-line lookahead attributes the first value to the second header
    assert!(store.series("LiveSSTableCount").is_empty());
    assert_eq!(store.series("PendingCompactions").len(), 1);
}

#[test]
fn test_header_metric_uses_last_name_key() {
    assert_eq!(
        header_metric("#mbean = a:name=Outer,type=x,name=Inner:"),
        Some("Inner")
    );
}
