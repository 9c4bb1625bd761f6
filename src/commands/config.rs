use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::path::PathBuf;

use crate::core::config::MonitorConfig;

/// Config file given with the global `--config` flag
pub fn config_path(matches: &ArgMatches) -> Option<PathBuf> {
    matches.get_one::<String>("config").map(PathBuf::from)
}

/// Load the config file and apply command-line overrides present in `matches`
pub fn load_with_overrides(config_path: Option<&PathBuf>, matches: &ArgMatches) -> Result<MonitorConfig> {
    let mut config = MonitorConfig::load(config_path.map(PathBuf::as_path))?;

    if let Some(keyspace) = try_get::<String>(matches, "keyspace") {
        config.keyspace = keyspace;
    }
    if let Some(scope) = try_get::<String>(matches, "scope") {
        config.scope = scope;
    }
    if let Some(host) = try_get::<String>(matches, "host") {
        config.host = host;
    }
    if let Some(port) = try_get::<u16>(matches, "port") {
        config.jmx_port = port;
    }
    if let Some(interval) = try_get::<u64>(matches, "interval") {
        config.interval_ms = interval;
    }
    if let Some(count) = try_get::<u64>(matches, "count") {
        config.stress_count = count;
    }
    if let Some(threads) = try_get::<u32>(matches, "threads") {
        config.stress_threads = threads;
    }
    if let Some(capture) = try_get::<String>(matches, "capture") {
        config.capture_path = capture;
    }
    if let Some(output) = try_get::<String>(matches, "output") {
        config.output_path = output;
    }

    Ok(config)
}

/// Not every subcommand defines every override flag
fn try_get<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Option<T> {
    matches.try_get_one::<T>(id).ok().flatten().cloned()
}

pub fn execute(matches: &ArgMatches, config_path: Option<PathBuf>) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => handle_show(config_path),
        Some(("init", sub_matches)) => handle_init(config_path, sub_matches.get_flag("force")),
        _ => {
            println!("Use 'jmxmon config --help' for more information.");
            Ok(())
        }
    }
}

fn handle_show(config_path: Option<PathBuf>) -> Result<()> {
    let config = MonitorConfig::load(config_path.as_deref())?;
    let location = match config_path {
        Some(path) => path,
        None => MonitorConfig::default_path()?,
    };

    println!("{} {}", "Config file:".cyan(), location.display());
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("Failed to serialize config")?
    );

    if let Err(e) = config.validate() {
        println!("{} {}", "⚠️ ".yellow(), e.to_string().yellow());
    }

    Ok(())
}

fn handle_init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let target = match config_path {
        Some(path) => path,
        None => MonitorConfig::default_path()?,
    };

    if target.exists() && !force {
        println!(
            "{}",
            format!("Config already exists at {}", target.display()).yellow()
        );
        println!("{}", "Use --force to overwrite it.".dimmed());
        return Ok(());
    }

    let written = MonitorConfig::default().save(Some(&target))?;
    println!("{} {}", "✓ Default config written to".green(), written.display());
    Ok(())
}
