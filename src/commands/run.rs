//! `jmxmon run`: sample JMX metrics while cassandra-stress writes.

use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::commands::config::load_with_overrides;
use crate::core::MonitorRun;
use crate::ui;

pub fn execute(matches: &ArgMatches, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_with_overrides(config_path.as_ref(), matches)?;

    crate::init_logging(config.log_file.as_deref().map(Path::new));

    let json_output = matches.get_flag("json");
    let run = MonitorRun::new(config).context("Invalid monitoring configuration")?;

    let cancel_flag = run.cancel_flag();
    ctrlc::set_handler(move || {
        println!();
        println!("{}", "Cancellation requested...".yellow().bold());
        println!(
            "{}",
            "Finishing the current cycle and stopping the workload...".dimmed()
        );
        cancel_flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    let config = run.config();
    println!(
        "{} {} ({}.{})",
        "Monitoring".cyan().bold(),
        config.jmx_endpoint().yellow(),
        config.keyspace,
        config.scope
    );
    println!(
        "{}",
        format!(
            "Workload: {} write n={} -rate threads={}",
            config.stress_executable().display(),
            config.stress_count,
            config.stress_threads
        )
        .dimmed()
    );
    println!("{}", "Press Ctrl+C at any time to stop sampling".dimmed());
    println!();

    let started = Instant::now();
    let outcome = match run.execute() {
        Ok(outcome) => outcome,
        Err(e) if e.is_channel_failure() => {
            let capture_path = run.config().capture_path.clone();
            return Err(anyhow::Error::new(e).context(format!(
                "JMX session failed mid-run, partial capture kept in {}",
                capture_path
            )));
        }
        Err(e) => return Err(anyhow::Error::new(e).context("Monitoring run failed")),
    };

    if json_output {
        println!("{}", serde_json::to_string(&outcome.store.to_numeric())?);
        return Ok(());
    }

    ui::print_report(&outcome.report, started.elapsed());
    match outcome.workload_status {
        Some(status) if !status.success() => println!(
            "{}",
            format!("Workload exited with {}", status).yellow()
        ),
        _ => {}
    }
    println!();
    ui::print_series_summary(&outcome.store);
    println!();
    println!(
        "{} {}",
        "Capture:".dimmed(),
        run.config().capture_path.as_str().dimmed()
    );
    println!(
        "{} {}",
        "Series:".dimmed(),
        run.config().output_path.as_str().dimmed()
    );

    Ok(())
}
