//! Subcommands and the helpers they share.

pub mod batch;
pub mod case;
pub mod config;
pub mod extract;
mod output;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use console::style;
use tracing::debug;

use procex_core::models::config::ProcexConfig;
use procex_core::{ConfigError, ConfigStore, Pipeline};

pub use output::OutputFormat;

/// Settings and catalogue locations given on the command line.
pub struct ConfigSources<'a> {
    pub settings: Option<&'a str>,
    pub catalogue: Option<&'a str>,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("procex")
        .join("config.json")
}

/// Settings from `--config`, the default location, or built-in defaults.
/// Also returns the directory relative catalogue paths resolve against.
pub fn load_settings(sources: &ConfigSources) -> anyhow::Result<(ProcexConfig, Option<PathBuf>)> {
    let path = match sources.settings {
        Some(path) => PathBuf::from(path),
        None => {
            let default = default_config_path();
            if !default.exists() {
                debug!("No settings file, using defaults");
                return Ok((ProcexConfig::default(), None));
            }
            default
        }
    };

    let settings = ProcexConfig::from_file(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    Ok((settings, path.parent().map(Path::to_path_buf)))
}

/// Settings plus the validated catalogue, ready for a pipeline.
pub fn load_store(sources: &ConfigSources) -> anyhow::Result<ConfigStore> {
    let (settings, base) = load_settings(sources)?;
    let catalogue_path = match sources.catalogue {
        Some(path) => PathBuf::from(path),
        None => settings.catalogue_path(base.as_deref()).ok_or_else(|| {
            anyhow::anyhow!("No field catalogue configured. Pass --catalogue or set \"catalogue\" in the settings file.")
        })?,
    };

    match ConfigStore::open(settings, &catalogue_path) {
        Ok(store) => Ok(store),
        Err(ConfigError::Invalid(issues)) => {
            eprintln!(
                "{} {} has {} problem(s):",
                style("✗").red(),
                catalogue_path.display(),
                issues.len()
            );
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
            anyhow::bail!("Invalid field catalogue: {}", catalogue_path.display())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to load {}", catalogue_path.display())),
    }
}

pub fn load_pipeline(sources: &ConfigSources) -> anyhow::Result<Pipeline> {
    Ok(Pipeline::from_store(&load_store(sources)?))
}

/// Write to `output` when given, stdout otherwise.
pub fn emit(content: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Output written to {}",
                style("✓").green(),
                path.display()
            );
        }
        None => println!("{}", content),
    }
    Ok(())
}
