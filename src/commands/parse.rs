use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::commands::config::load_with_overrides;
use crate::core::pipeline;
use crate::ui;

/// Re-parse a saved capture file into time series
pub fn execute(matches: &ArgMatches, config_path: Option<PathBuf>) -> Result<()> {
    let capture_path = matches
        .get_one::<String>("capture")
        .context("Capture file argument is required")?;

    let config = load_with_overrides(config_path.as_ref(), matches)?;
    let queries = config.query_set().context("Invalid metric configuration")?;

    let store = pipeline::replay(Path::new(capture_path), &queries)
        .with_context(|| format!("Failed to parse capture file: {}", capture_path))?;

    if let Some(output) = matches.get_one::<String>("output") {
        store.save_json(Path::new(output))?;
    }

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string(&store.to_numeric())?);
        return Ok(());
    }

    println!("{} {}", "Capture:".cyan(), capture_path);
    println!();
    ui::print_series_summary(&store);

    Ok(())
}
