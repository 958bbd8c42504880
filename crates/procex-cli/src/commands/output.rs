//! Report rendering: JSON, CSV and a plain text summary.

use procex_core::models::record::{ExtractionOutcome, FieldStatus};
use procex_core::{CaseReport, Classification, DocumentReport};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn format_document(report: &DocumentReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(report.to_json()?),
        OutputFormat::Csv => document_csv(report),
        OutputFormat::Text => Ok(document_text(report)),
    }
}

pub fn format_case(report: &CaseReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(report.to_json()?),
        OutputFormat::Csv => case_csv(report),
        OutputFormat::Text => Ok(case_text(report)),
    }
}

fn status_name(status: FieldStatus) -> &'static str {
    match status {
        FieldStatus::Extracted => "extracted",
        FieldStatus::NotFound => "not_found",
        FieldStatus::ValidationFailed => "validation_failed",
    }
}

fn value_of(outcome: &ExtractionOutcome) -> String {
    outcome
        .value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn document_csv(report: &DocumentReport) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["field", "status", "value", "raw", "method", "error"])?;
    for outcome in &report.outcomes {
        let value = value_of(outcome);
        let method = outcome.method.map(|m| m.to_string()).unwrap_or_default();
        wtr.write_record([
            outcome.field.as_str(),
            status_name(outcome.status),
            value.as_str(),
            outcome.raw.as_deref().unwrap_or_default(),
            method.as_str(),
            outcome.error.as_deref().unwrap_or_default(),
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn classification_text(classification: Option<&Classification>) -> String {
    match classification {
        Some(Classification::Classified {
            doc_type,
            confidence,
        }) => format!("{} ({:.0}%)", doc_type, confidence * 100.0),
        Some(Classification::Unclassified { best: Some(best) }) => format!(
            "unclassified (best {} at {:.0}%)",
            best.doc_type,
            best.confidence * 100.0
        ),
        _ => "unclassified".to_string(),
    }
}

fn document_text(report: &DocumentReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("Document: {}\n", report.source));
    if let Some(role) = &report.role {
        output.push_str(&format!("Role: {}\n", role));
    }
    output.push_str(&format!(
        "Type: {}\n",
        classification_text(report.classification.as_ref())
    ));
    if let Some(reason) = &report.skipped {
        output.push_str(&format!("Skipped: {}\n", reason));
    }
    output.push('\n');

    let width = report
        .outcomes
        .iter()
        .map(|o| o.field.chars().count())
        .max()
        .unwrap_or(0);
    for outcome in &report.outcomes {
        let detail = match outcome.status {
            FieldStatus::Extracted => value_of(outcome),
            FieldStatus::ValidationFailed => format!(
                "{:?} rejected: {}",
                outcome.raw.as_deref().unwrap_or_default(),
                outcome.error.as_deref().unwrap_or("invalid")
            ),
            FieldStatus::NotFound => "-".to_string(),
        };
        output.push_str(&format!(
            "  {:<width$}  {:<17}  {}\n",
            outcome.field,
            status_name(outcome.status),
            detail,
            width = width
        ));
    }

    if !report.missing_required.is_empty() {
        output.push_str(&format!(
            "\nMissing required: {}\n",
            report.missing_required.join(", ")
        ));
    }
    output
}

fn case_csv(report: &CaseReport) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["field", "value", "source_role", "source", "method"])?;
    for (name, field) in &report.merged.fields {
        let value = field.value.to_string();
        let method = field.method.map(|m| m.to_string()).unwrap_or_default();
        wtr.write_record([
            name.as_str(),
            value.as_str(),
            field.source_role.as_str(),
            field.source.as_str(),
            method.as_str(),
        ])?;
    }
    for name in &report.merged.unresolved {
        wtr.write_record([name.as_str(), "", "", "", ""])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn case_text(report: &CaseReport) -> String {
    let mut output = String::new();

    output.push_str("Documents:\n");
    for document in &report.documents {
        output.push_str(&format!(
            "  {} [{}] {}: {}/{} fields\n",
            document.source,
            document.role.as_deref().unwrap_or("-"),
            classification_text(document.classification.as_ref()),
            document.extracted_count(),
            document.outcomes.len()
        ));
    }

    let merged = &report.merged;
    output.push_str("\nMerged record:\n");
    for (name, field) in &merged.fields {
        output.push_str(&format!("  {} = {}  ({})\n", name, field.value, field.source_role));
    }

    if !merged.conflicts.is_empty() {
        output.push_str("\nConflicts:\n");
        for conflict in &merged.conflicts {
            output.push_str(&format!(
                "  {}: kept {} from {}, ignored {} from {}\n",
                conflict.field,
                conflict.kept_value,
                conflict.kept_role,
                conflict.ignored_value,
                conflict.ignored_role
            ));
        }
    }

    if !merged.unresolved.is_empty() {
        output.push_str(&format!(
            "\nUnresolved ({} required): {}\n",
            merged.unresolved_required,
            merged.unresolved.join(", ")
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use procex_core::models::record::FieldValue;

    fn report() -> DocumentReport {
        DocumentReport {
            source: "notice.pdf".to_string(),
            role: Some("notice".to_string()),
            classification: Some(Classification::Classified {
                doc_type: "notice".to_string(),
                confidence: 1.0,
            }),
            outcomes: vec![
                ExtractionOutcome {
                    field: "agency".to_string(),
                    status: FieldStatus::Extracted,
                    value: Some(FieldValue::Text("市政府采购中心".to_string())),
                    raw: Some("市政府采购中心".to_string()),
                    method: None,
                    misses: Vec::new(),
                    error: None,
                },
                ExtractionOutcome::not_found("winner", Vec::new()),
            ],
            skipped: None,
            missing_required: vec!["winner".to_string()],
            processing_time_ms: 3,
        }
    }

    #[test]
    fn test_document_csv_has_row_per_field() {
        let csv = format_document(&report(), OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "field,status,value,raw,method,error");
        assert_eq!(lines[1], "agency,extracted,市政府采购中心,市政府采购中心,,");
        assert_eq!(lines[2], "winner,not_found,,,,");
    }

    #[test]
    fn test_document_text_lists_missing_required() {
        let text = format_document(&report(), OutputFormat::Text).unwrap();
        assert!(text.contains("Type: notice (100%)"));
        assert!(text.contains("Missing required: winner"));
    }
}
