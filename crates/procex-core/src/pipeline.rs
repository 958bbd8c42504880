//! Document, batch and case orchestration.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::classify::Classification;
use crate::config::{ConfigSnapshot, ConfigStore};
use crate::error::{ConfigError, DocumentError, Result};
use crate::extract::{FieldExtractor, PreparedDocument};
use crate::merge::{CaseMerger, MergedRecord};
use crate::models::config::ProcexConfig;
use crate::models::record::ExtractionOutcome;
use crate::pdf::{self, DocumentGeometry, GeometrySource, PdfExtractor};

/// Where a document's content comes from.
#[derive(Debug, Clone)]
pub enum InputSource {
    Path(PathBuf),
    Bytes { name: String, data: Vec<u8> },
    /// Pre-extracted geometry, e.g. from another parser or a test.
    Geometry(DocumentGeometry),
}

impl GeometrySource for InputSource {
    fn source_name(&self) -> String {
        match self {
            InputSource::Path(path) => path.display().to_string(),
            InputSource::Bytes { name, .. } => name.clone(),
            InputSource::Geometry(geometry) => geometry.source.clone(),
        }
    }

    fn load_geometry(&self) -> pdf::Result<DocumentGeometry> {
        match self {
            InputSource::Path(path) => path.as_path().load_geometry(),
            InputSource::Bytes { name, data } => {
                Ok(PdfExtractor::from_bytes(data, name.clone())?.extract_geometry())
            }
            InputSource::Geometry(geometry) => Ok(geometry.clone()),
        }
    }
}

/// One document to process, with the caller's role label.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub role: Option<String>,
    pub source: InputSource,
}

impl DocumentInput {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            role: None,
            source: InputSource::Path(path.into()),
        }
    }

    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            role: None,
            source: InputSource::Bytes {
                name: name.into(),
                data,
            },
        }
    }

    pub fn from_geometry(geometry: DocumentGeometry) -> Self {
        Self {
            role: None,
            source: InputSource::Geometry(geometry),
        }
    }

    /// Set the document's role within a case.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Result of processing one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Absent when the document never got as far as classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// One outcome per applicable field, in catalogue order.
    pub outcomes: Vec<ExtractionOutcome>,
    /// Why the document was not extracted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    /// Required fields without an extracted value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_required: Vec<String>,
    pub processing_time_ms: u64,
}

impl DocumentReport {
    pub fn extracted_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_extracted()).count()
    }

    pub fn outcome(&self, field: &str) -> Option<&ExtractionOutcome> {
        self.outcomes.iter().find(|o| o.field == field)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Reports of a case plus the merged record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
    pub documents: Vec<DocumentReport>,
    pub merged: MergedRecord,
}

impl CaseReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs extraction against one configuration snapshot.
///
/// The snapshot is captured at construction; reloads published to the
/// store afterwards do not affect this pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    snapshot: Arc<ConfigSnapshot>,
}

impl Pipeline {
    pub fn new(snapshot: Arc<ConfigSnapshot>) -> Self {
        Self { snapshot }
    }

    /// Load settings from `path` and the catalogue they name, resolved
    /// next to the settings file when relative.
    pub fn from_settings_file(path: &Path) -> Result<Self> {
        let settings = ProcexConfig::from_file(path)?;
        let catalogue = settings.catalogue_path(path.parent()).ok_or_else(|| {
            ConfigError::Parse(format!("{} does not name a catalogue", path.display()))
        })?;
        let store = ConfigStore::open(settings, &catalogue)?;
        Ok(Self::from_store(&store))
    }

    /// Pipeline over the store's current snapshot.
    pub fn from_store(store: &ConfigStore) -> Self {
        Self::new(store.snapshot())
    }

    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    /// Process one document synchronously.
    pub fn process(&self, input: &DocumentInput) -> DocumentReport {
        let start = Instant::now();
        let source = input.source.source_name();
        match input.source.load_geometry() {
            Ok(geometry) => self.process_geometry(geometry, input.role.clone()),
            Err(e) => {
                warn!("Skipping {}: {}", source, e);
                self.skipped(source, input.role.clone(), e.to_string(), start)
            }
        }
    }

    /// Classify and extract already loaded geometry.
    pub fn process_geometry(
        &self,
        geometry: DocumentGeometry,
        role: Option<String>,
    ) -> DocumentReport {
        let start = Instant::now();
        let settings = &self.snapshot.settings;
        let catalogue = &self.snapshot.catalogue;
        let source = geometry.source.clone();

        if geometry.is_blank() {
            warn!("Skipping {}: no extractable text", source);
            return self.skipped(source, role, "no extractable text".to_string(), start);
        }

        let doc = PreparedDocument::new(geometry, &settings.layout);
        let classification = catalogue
            .classifier()
            .classify_text(&doc.text(settings.classifier.max_pages));
        let doc_type = classification.doc_type().map(str::to_string);

        if doc_type.is_none() && catalogue.fields_for(None).next().is_none() {
            let reason = match &classification {
                Classification::Unclassified { best: Some(best) } => format!(
                    "unclassified (best {} at {:.2})",
                    best.doc_type, best.confidence
                ),
                _ => "unclassified".to_string(),
            };
            warn!("Skipping {}: {}", source, reason);
            let mut report = self.skipped(source, role, reason, start);
            report.classification = Some(classification);
            return report;
        }

        let outcomes = FieldExtractor::new(catalogue, &settings.normalize)
            .extract_all(&doc, doc_type.as_deref());
        let missing_required = outcomes
            .iter()
            .filter(|o| !o.is_extracted())
            .filter(|o| catalogue.field(&o.field).is_some_and(|f| f.required))
            .map(|o| o.field.clone())
            .collect();

        let report = DocumentReport {
            source,
            role,
            classification: Some(classification),
            outcomes,
            skipped: None,
            missing_required,
            processing_time_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "{}: {} as {}, {}/{} fields in {} ms",
            report.source,
            report.role.as_deref().unwrap_or("-"),
            doc_type.as_deref().unwrap_or("unclassified"),
            report.extracted_count(),
            report.outcomes.len(),
            report.processing_time_ms
        );
        report
    }

    /// Process one document under the configured wall-clock budget.
    ///
    /// Without a budget this is [`Pipeline::process`]. With one, the work
    /// runs on its own thread; when the budget elapses the thread is
    /// abandoned and the document is reported skipped.
    pub fn process_with_budget(&self, input: DocumentInput) -> DocumentReport {
        let Some(budget_ms) = self.snapshot.settings.pipeline.document_budget_ms else {
            return self.process(&input);
        };

        let start = Instant::now();
        let source = input.source.source_name();
        let role = input.role.clone();
        let (tx, rx) = mpsc::channel();
        let worker = self.clone();
        let spawned = thread::Builder::new()
            .name("procex-worker".to_string())
            .spawn(move || {
                // The receiver is gone when the budget already elapsed.
                let _ = tx.send(worker.process(&input));
            });

        if let Err(e) = spawned {
            warn!("Could not start worker for {}: {}", source, e);
            return self.skipped(source, role, e.to_string(), start);
        }

        match rx.recv_timeout(Duration::from_millis(budget_ms)) {
            Ok(report) => report,
            Err(_) => {
                let reason = DocumentError::BudgetExceeded(budget_ms);
                warn!("Abandoning {}: {}", source, reason);
                self.skipped(source, role, reason.to_string(), start)
            }
        }
    }

    /// Process independent documents, in parallel when configured.
    /// Reports keep the input order.
    pub fn process_batch(&self, inputs: Vec<DocumentInput>) -> Vec<DocumentReport> {
        if self.snapshot.settings.pipeline.parallel {
            inputs
                .into_par_iter()
                .map(|input| self.process_with_budget(input))
                .collect()
        } else {
            inputs
                .into_iter()
                .map(|input| self.process_with_budget(input))
                .collect()
        }
    }

    /// Process the documents of one case and merge them.
    pub fn process_case(&self, inputs: Vec<DocumentInput>) -> CaseReport {
        let documents = self.process_batch(inputs);
        let merged = CaseMerger::new(
            &self.snapshot.catalogue,
            &self.snapshot.settings.merge.role_priority,
        )
        .merge(&documents);
        info!(
            "Case merged: {} fields, {} unresolved ({} required)",
            merged.fields.len(),
            merged.unresolved.len(),
            merged.unresolved_required
        );
        CaseReport { documents, merged }
    }

    /// Shorthand for a single file on disk.
    pub fn process_path(&self, path: &Path) -> DocumentReport {
        self.process_with_budget(DocumentInput::from_path(path))
    }

    /// Report for a document that was not extracted: every catalogue field
    /// is listed as not found.
    fn skipped(
        &self,
        source: String,
        role: Option<String>,
        reason: String,
        start: Instant,
    ) -> DocumentReport {
        let catalogue = &self.snapshot.catalogue;
        DocumentReport {
            source,
            role,
            classification: None,
            outcomes: catalogue
                .fields()
                .iter()
                .map(|f| ExtractionOutcome::not_found(&f.name, Vec::new()))
                .collect(),
            skipped: Some(reason),
            missing_required: catalogue
                .fields()
                .iter()
                .filter(|f| f.required)
                .map(|f| f.name.clone())
                .collect(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldCatalogue;
    use crate::error::ProcexError;
    use crate::models::record::FieldStatus;
    use crate::pdf::{BBox, TextFragment};

    const CATALOGUE: &str = r#"{
        "signatures": [{"doc_type": "notice", "patterns": ["采购公告"], "threshold": 1.0}],
        "fields": [
            {"name": "project_name", "type": "text", "source": "notice", "required": true,
             "method": {"kind": "horizontal_keyvalue", "key_text": "项目名称"}}
        ]
    }"#;

    fn pipeline(settings: ProcexConfig) -> Pipeline {
        let catalogue = FieldCatalogue::from_json_str(CATALOGUE).unwrap();
        Pipeline::from_store(&ConfigStore::new(settings, catalogue))
    }

    fn geometry(texts: &[(&str, f64, f64)]) -> DocumentGeometry {
        let fragments = texts
            .iter()
            .map(|(t, x, y)| TextFragment::new(*t, 0, BBox::new(*x, *y, x + 40.0, y + 10.0)))
            .collect();
        DocumentGeometry::from_fragments("doc", (595.0, 842.0), fragments)
    }

    #[test]
    fn test_classified_document_is_extracted() {
        let report = pipeline(ProcexConfig::default()).process_geometry(
            geometry(&[("采购公告", 250.0, 40.0), ("项目名称", 50.0, 100.0), ("图书馆", 120.0, 100.0)]),
            Some("notice".to_string()),
        );
        assert!(report.skipped.is_none());
        assert_eq!(report.outcome("project_name").unwrap().status, FieldStatus::Extracted);
        assert!(report.missing_required.is_empty());
    }

    #[test]
    fn test_unclassified_without_any_fields_is_skipped() {
        let report = pipeline(ProcexConfig::default())
            .process_geometry(geometry(&[("会议纪要", 50.0, 40.0)]), None);
        assert!(report.skipped.as_deref().unwrap().starts_with("unclassified"));
        assert!(matches!(
            report.classification,
            Some(Classification::Unclassified { .. })
        ));
        assert_eq!(report.outcomes[0].status, FieldStatus::NotFound);
        assert_eq!(report.missing_required, vec!["project_name".to_string()]);
    }

    #[test]
    fn test_unreadable_document_does_not_stop_batch() {
        let reports = pipeline(ProcexConfig::default()).process_batch(vec![
            DocumentInput::from_bytes("broken.pdf", b"not a pdf".to_vec()),
            DocumentInput::from_geometry(geometry(&[("采购公告", 250.0, 40.0)])),
        ]);
        assert_eq!(reports.len(), 2);
        assert!(reports[0].skipped.as_deref().unwrap().contains("unreadable"));
        assert!(reports[1].skipped.is_none());
    }

    #[test]
    fn test_budget_allows_fast_documents() {
        let mut settings = ProcexConfig::default();
        settings.pipeline.document_budget_ms = Some(10_000);
        settings.pipeline.parallel = false;
        let report = pipeline(settings).process_with_budget(
            DocumentInput::from_geometry(geometry(&[("采购公告", 250.0, 40.0)])).with_role("notice"),
        );
        assert!(report.skipped.is_none());
        assert_eq!(report.role.as_deref(), Some("notice"));
    }

    #[test]
    fn test_budget_exceeded_abandons_document() {
        let mut settings = ProcexConfig::default();
        settings.pipeline.document_budget_ms = Some(0);
        settings.pipeline.parallel = false;
        let fragments = (0..20_000)
            .map(|i| {
                let (x, y) = ((i % 10) as f64 * 50.0, (i / 10) as f64 * 12.0);
                TextFragment::new("项目名称", 0, BBox::new(x, y, x + 40.0, y + 10.0))
            })
            .collect();
        let slow = DocumentGeometry::from_fragments("slow.pdf", (595.0, 842.0), fragments);

        let report = pipeline(settings)
            .process_with_budget(DocumentInput::from_geometry(slow).with_role("notice"));
        assert_eq!(
            report.skipped.as_deref(),
            Some(DocumentError::BudgetExceeded(0).to_string().as_str())
        );
        assert_eq!(report.role.as_deref(), Some("notice"));
        assert_eq!(report.outcomes[0].status, FieldStatus::NotFound);
        assert_eq!(report.missing_required, vec!["project_name".to_string()]);
    }

    #[test]
    fn test_budget_worker_accepts_any_source_name() {
        let mut settings = ProcexConfig::default();
        settings.pipeline.document_budget_ms = Some(10_000);
        let reports = pipeline(settings).process_batch(vec![
            DocumentInput::from_bytes("a\0b.pdf", b"not a pdf".to_vec()),
            DocumentInput::from_geometry(geometry(&[("采购公告", 250.0, 40.0)])),
        ]);
        assert_eq!(reports[0].source, "a\0b.pdf");
        assert!(reports[0].skipped.as_deref().unwrap().contains("unreadable"));
        assert!(reports[1].skipped.is_none());
    }

    #[test]
    fn test_classifier_reads_only_leading_pages() {
        let two_pages = || {
            DocumentGeometry::from_fragments(
                "doc",
                (595.0, 842.0),
                vec![
                    TextFragment::new("项目名称", 0, BBox::new(50.0, 100.0, 90.0, 110.0)),
                    TextFragment::new("图书馆", 0, BBox::new(120.0, 100.0, 160.0, 110.0)),
                    TextFragment::new("采购公告", 1, BBox::new(250.0, 40.0, 290.0, 50.0)),
                ],
            )
        };

        let mut settings = ProcexConfig::default();
        settings.classifier.max_pages = 1;
        let report = pipeline(settings).process_geometry(two_pages(), None);
        assert!(matches!(
            report.classification,
            Some(Classification::Unclassified { .. })
        ));

        let report = pipeline(ProcexConfig::default()).process_geometry(two_pages(), None);
        assert_eq!(
            report.classification.as_ref().and_then(Classification::doc_type),
            Some("notice")
        );
        assert_eq!(report.outcome("project_name").unwrap().status, FieldStatus::Extracted);
    }

    #[test]
    fn test_blank_document_is_skipped() {
        let report = pipeline(ProcexConfig::default()).process_geometry(
            DocumentGeometry::from_fragments("blank", (595.0, 842.0), Vec::new()),
            None,
        );
        assert_eq!(report.skipped.as_deref(), Some("no extractable text"));
        assert!(report.classification.is_none());
        assert_eq!(report.missing_required, vec!["project_name".to_string()]);
    }

    #[test]
    fn test_from_settings_file_resolves_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fields.json"), CATALOGUE).unwrap();
        let settings = dir.path().join("procex.json");
        std::fs::write(&settings, r#"{"catalogue": "fields.json"}"#).unwrap();

        let pipeline = Pipeline::from_settings_file(&settings).unwrap();
        assert_eq!(pipeline.snapshot().catalogue.fields().len(), 1);

        std::fs::write(&settings, "{}").unwrap();
        assert!(matches!(
            Pipeline::from_settings_file(&settings),
            Err(ProcexError::Config(ConfigError::Parse(_)))
        ));
    }

    #[test]
    fn test_report_json() {
        let report = pipeline(ProcexConfig::default())
            .process_geometry(geometry(&[("采购公告", 250.0, 40.0)]), None);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"field\": \"project_name\""));
        assert!(json.contains("\"status\": \"not_found\""));
    }
}
