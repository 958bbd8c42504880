//! Batch command - many independent documents, one report each.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use procex_core::{Classification, DocumentInput, DocumentReport};

use super::output::format_document;
use super::{load_pipeline, ConfigSources, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory (one report per document)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each document
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Fail when any document was skipped
    #[arg(long)]
    strict: bool,
}

pub fn run(args: BatchArgs, sources: &ConfigSources) -> anyhow::Result<()> {
    let start = Instant::now();

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    let pipeline = load_pipeline(sources)?;

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    spinner.set_message(format!("Extracting {} documents", files.len()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let inputs = files.iter().map(DocumentInput::from_path).collect();
    let reports = pipeline.process_batch(inputs);

    spinner.finish_and_clear();

    for (path, report) in files.iter().zip(&reports) {
        match &args.output_dir {
            Some(output_dir) => {
                let output_name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("document");
                let output_path =
                    output_dir.join(format!("{}.{}", output_name, args.format.extension()));
                fs::write(&output_path, format_document(report, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
            None => println!("{}", format_document(report, args.format)?),
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &reports)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let skipped: Vec<&DocumentReport> = reports.iter().filter(|r| r.skipped.is_some()).collect();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        reports.len(),
        start.elapsed()
    );
    println!(
        "   {} extracted, {} skipped",
        style(reports.len() - skipped.len()).green(),
        style(skipped.len()).red()
    );

    if !skipped.is_empty() {
        println!();
        println!("{}", style("Skipped files:").red());
        for report in &skipped {
            warn!("Skipped {}", report.source);
            println!(
                "  - {}: {}",
                report.source,
                report.skipped.as_deref().unwrap_or("unknown reason")
            );
        }
        if args.strict {
            anyhow::bail!("{} document(s) skipped", skipped.len());
        }
    }

    Ok(())
}

fn write_summary(path: &Path, reports: &[DocumentReport]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "source",
        "doc_type",
        "extracted",
        "fields",
        "missing_required",
        "skipped",
        "processing_time_ms",
    ])?;

    for report in reports {
        let doc_type = report
            .classification
            .as_ref()
            .and_then(Classification::doc_type)
            .unwrap_or_default();
        wtr.write_record([
            report.source.clone(),
            doc_type.to_string(),
            report.extracted_count().to_string(),
            report.outcomes.len().to_string(),
            report.missing_required.join(";"),
            report.skipped.clone().unwrap_or_default(),
            report.processing_time_ms.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
