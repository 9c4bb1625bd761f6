use colored::Colorize;
use std::time::Duration;

use crate::core::sampler::SamplingReport;
use crate::core::series::{SeriesStats, TimeSeriesStore};
use crate::core::MetricQuerySet;

/// Format an optional number for a table cell
pub fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

/// Format a duration as `1m 05s` / `12.3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

fn format_stats_row(name: &str, stats: &SeriesStats, width: usize) -> String {
    let last = stats
        .last
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "{:<width$}  {:>7}  {:>7}  {:>12}  {:>12}  {:>12}",
        name,
        stats.count,
        stats.missing,
        format_number(stats.min),
        format_number(stats.max),
        last,
        width = width
    )
}

/// Print one row per metric with sample count and range
pub fn print_series_summary(store: &TimeSeriesStore) {
    if store.is_empty() {
        println!("{}", "No metrics recorded.".yellow());
        return;
    }

    let width = store.metrics().map(str::len).max().unwrap_or(6).max(6);

    println!(
        "{}",
        format!(
            "{:<width$}  {:>7}  {:>7}  {:>12}  {:>12}  {:>12}",
            "Metric",
            "Samples",
            "Missing",
            "Min",
            "Max",
            "Last",
            width = width
        )
        .bold()
    );
    println!("{}", "-".repeat(width + 62).dimmed());

    for name in store.metrics() {
        let stats = store.stats(name);
        let row = format_stats_row(name, &stats, width);
        if stats.count == 0 {
            println!("{}", row.dimmed());
        } else if stats.missing > 0 {
            println!("{}", row.yellow());
        } else {
            println!("{}", row);
        }
    }

    if !store.is_aligned() {
        println!();
        println!(
            "{}",
            "⚠️  Series have different lengths; the capture is incomplete.".yellow()
        );
    }
}

pub fn print_report(report: &SamplingReport, elapsed: Duration) {
    println!(
        "{} {} cycles in {}",
        "Sampling:".green().bold(),
        report.cycles,
        format_duration(elapsed)
    );

    if report.missing_replies > 0 {
        println!(
            "{}",
            format!("{} replies carried no value", report.missing_replies).yellow()
        );
    }

    if report.was_cancelled {
        println!("{}", "Run was cancelled before the workload finished.".yellow());
    }
}

pub fn print_query_set(queries: &MetricQuerySet) {
    println!(
        "{} keyspace={} scope={}",
        "Queries for".cyan().bold(),
        queries.keyspace().yellow(),
        queries.scope().yellow()
    );
    for query in queries.queries() {
        println!(
            "  {} {}",
            format!("{:<22}", query.metric.name).bold(),
            query.text.as_str().dimmed()
        );
    }
}
