//! CLI application for procurement PDF field extraction.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, case, config, extract};

/// Procurement PDF extraction - pull structured fields out of tender documents
#[derive(Parser)]
#[command(name = "procex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to settings file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Path to field catalogue (overrides the settings file)
    #[arg(long, global = true)]
    catalogue: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from a single document
    Extract(extract::ExtractArgs),

    /// Process the documents of one procurement case and merge them
    Case(case::CaseArgs),

    /// Extract fields from many independent documents
    Batch(batch::BatchArgs),

    /// Manage settings and validate catalogues
    Config(config::ConfigArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let sources = commands::ConfigSources {
        settings: cli.config.as_deref(),
        catalogue: cli.catalogue.as_deref(),
    };

    match cli.command {
        Commands::Extract(args) => extract::run(args, &sources),
        Commands::Case(args) => case::run(args, &sources),
        Commands::Batch(args) => batch::run(args, &sources),
        Commands::Config(args) => config::run(args, &sources),
    }
}
