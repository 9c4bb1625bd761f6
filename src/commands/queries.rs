use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::PathBuf;

use crate::commands::config::load_with_overrides;
use crate::ui;

pub fn execute(matches: &ArgMatches, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_with_overrides(config_path.as_ref(), matches)?;
    let queries = config.query_set().context("Invalid metric configuration")?;

    ui::print_query_set(&queries);
    Ok(())
}
