//! Config command - manage settings and validate catalogues.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use procex_core::models::config::ProcexConfig;
use procex_core::{ConfigError, FieldCatalogue};

use super::{default_config_path, load_settings, ConfigSources};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current settings
    Show,

    /// Initialize a new settings file
    Init(InitArgs),

    /// Get a specific settings value
    Get {
        /// Settings key (e.g., "layout.tolerance_y")
        key: String,
    },

    /// Set a settings value
    Set {
        /// Settings key
        key: String,
        /// New value
        value: String,
    },

    /// Show settings file path
    Path,

    /// Validate a field catalogue and list every problem
    Check {
        /// Catalogue file (default: the configured one)
        #[arg(id = "catalogue_file", value_name = "CATALOGUE")]
        catalogue: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InitArgs {
    /// Output path for settings file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,
}

pub fn run(args: ConfigArgs, sources: &ConfigSources) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(sources),
        ConfigCommand::Init(init_args) => init_config(init_args),
        ConfigCommand::Get { key } => get_config(sources, &key),
        ConfigCommand::Set { key, value } => set_config(sources, &key, &value),
        ConfigCommand::Path => show_path(sources),
        ConfigCommand::Check { catalogue } => check_catalogue(sources, catalogue),
    }
}

fn settings_path(sources: &ConfigSources) -> PathBuf {
    sources
        .settings
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

fn show_config(sources: &ConfigSources) -> anyhow::Result<()> {
    let config_path = settings_path(sources);
    if !config_path.exists() {
        println!(
            "{} No settings file found, showing defaults.",
            style("ℹ").blue()
        );
    }

    let (config, _) = load_settings(sources)?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

fn init_config(args: InitArgs) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(default_config_path);

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Settings file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let config = ProcexConfig::default();
    config.save(&output_path)?;

    println!(
        "{} Created settings file at {}",
        style("✓").green(),
        output_path.display()
    );

    Ok(())
}

fn get_config(sources: &ConfigSources, key: &str) -> anyhow::Result<()> {
    let (config, _) = load_settings(sources)?;
    let json = serde_json::to_value(&config)?;

    let mut current = &json;
    for part in key.split('.') {
        current = current
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Settings key not found: {}", key))?;
    }

    println!("{}", serde_json::to_string_pretty(current)?);

    Ok(())
}

fn set_config(sources: &ConfigSources, key: &str, value: &str) -> anyhow::Result<()> {
    let config_path = settings_path(sources);

    let config = if config_path.exists() {
        ProcexConfig::from_file(&config_path)?
    } else {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        ProcexConfig::default()
    };

    // Bare words are taken as strings
    let parsed_value: serde_json::Value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));

    let mut json = serde_json::to_value(&config)?;

    let parts: Vec<&str> = key.split('.').collect();
    let mut current = &mut json;
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            match current.as_object_mut() {
                Some(obj) if obj.contains_key(*part) => {
                    obj.insert((*part).to_string(), parsed_value.clone());
                }
                Some(_) => anyhow::bail!("Unknown settings key: {}", key),
                None => anyhow::bail!("Cannot set value at non-object path"),
            }
        } else {
            current = current
                .get_mut(*part)
                .ok_or_else(|| anyhow::anyhow!("Settings path not found: {}", key))?;
        }
    }

    let config: ProcexConfig = serde_json::from_value(json)?;
    config.save(&config_path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&parsed_value)?
    );

    Ok(())
}

fn show_path(sources: &ConfigSources) -> anyhow::Result<()> {
    let config_path = settings_path(sources);

    println!("Settings file: {}", config_path.display());

    if config_path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'procex config init' to create a settings file.");
    }

    Ok(())
}

fn check_catalogue(sources: &ConfigSources, catalogue: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match catalogue.or_else(|| sources.catalogue.map(PathBuf::from)) {
        Some(path) => path,
        None => {
            let (settings, base) = load_settings(sources)?;
            settings
                .catalogue_path(base.as_deref())
                .ok_or_else(|| anyhow::anyhow!("No field catalogue given or configured"))?
        }
    };

    match FieldCatalogue::from_file(&path) {
        Ok(catalogue) => {
            println!(
                "{} {} is valid: {} signature(s), {} field(s){}",
                style("✓").green(),
                path.display(),
                catalogue.signatures().len(),
                catalogue.fields().len(),
                catalogue
                    .version()
                    .map(|v| format!(", version {}", v))
                    .unwrap_or_default()
            );
            Ok(())
        }
        Err(ConfigError::Invalid(issues)) => {
            println!(
                "{} {} has {} problem(s):",
                style("✗").red(),
                path.display(),
                issues.len()
            );
            for issue in &issues {
                println!("  - {}", issue);
            }
            anyhow::bail!("Invalid field catalogue: {}", path.display())
        }
        Err(e) => Err(e.into()),
    }
}
