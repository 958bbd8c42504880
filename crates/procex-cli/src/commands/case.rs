//! Case command - process the documents of one procurement and merge them.

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use procex_core::DocumentInput;

use super::output::format_case;
use super::{emit, load_pipeline, ConfigSources, OutputFormat};

/// A document given as `role=path`.
#[derive(Clone, Debug, PartialEq)]
pub struct RoleDocument {
    role: String,
    path: PathBuf,
}

fn parse_role_document(arg: &str) -> Result<RoleDocument, String> {
    let (role, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ROLE=PATH, got {:?}", arg))?;
    let role = role.trim();
    if role.is_empty() || path.is_empty() {
        return Err(format!("expected ROLE=PATH, got {:?}", arg));
    }
    Ok(RoleDocument {
        role: role.to_string(),
        path: PathBuf::from(path),
    })
}

/// Arguments for the case command.
#[derive(Args)]
pub struct CaseArgs {
    /// Documents as ROLE=PATH, e.g. notice=notice.pdf
    #[arg(required = true, value_parser = parse_role_document)]
    documents: Vec<RoleDocument>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Fail when a required field stays unresolved
    #[arg(long)]
    strict: bool,
}

pub fn run(args: CaseArgs, sources: &ConfigSources) -> anyhow::Result<()> {
    for document in &args.documents {
        if !document.path.exists() {
            anyhow::bail!("Input file not found: {}", document.path.display());
        }
    }

    let pipeline = load_pipeline(sources)?;
    info!("Processing case of {} documents", args.documents.len());

    let inputs = args
        .documents
        .iter()
        .map(|d| DocumentInput::from_path(&d.path).with_role(d.role.clone()))
        .collect();
    let report = pipeline.process_case(inputs);

    emit(&format_case(&report, args.format)?, args.output.as_deref())?;

    for document in report.documents.iter().filter(|d| d.skipped.is_some()) {
        eprintln!(
            "{} {} skipped: {}",
            style("⚠").yellow(),
            document.source,
            document.skipped.as_deref().unwrap_or_default()
        );
    }

    let merged = &report.merged;
    if !merged.is_complete() {
        eprintln!(
            "{} {} required field(s) unresolved",
            style("⚠").yellow(),
            merged.unresolved_required
        );
        if args.strict {
            anyhow::bail!("Case incomplete: {}", merged.unresolved.join(", "));
        }
    }

    Ok(())
}
