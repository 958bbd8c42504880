//! Extract command - fields from a single document.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use procex_core::DocumentInput;

use super::output::format_document;
use super::{emit, load_pipeline, ConfigSources, OutputFormat};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input PDF
    #[arg(required = true)]
    input: PathBuf,

    /// Role of the document within its case (e.g. notice)
    #[arg(short, long)]
    role: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

pub fn run(args: ExtractArgs, sources: &ConfigSources) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let pipeline = load_pipeline(sources)?;
    info!("Processing file: {}", args.input.display());

    let mut input = DocumentInput::from_path(&args.input);
    if let Some(role) = &args.role {
        input = input.with_role(role.clone());
    }
    let report = pipeline.process_with_budget(input);

    emit(&format_document(&report, args.format)?, args.output.as_deref())?;

    if let Some(reason) = &report.skipped {
        eprintln!("{} Document skipped: {}", style("⚠").yellow(), reason);
    } else if !report.missing_required.is_empty() {
        eprintln!(
            "{} Missing required fields: {}",
            style("⚠").yellow(),
            report.missing_required.join(", ")
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}
