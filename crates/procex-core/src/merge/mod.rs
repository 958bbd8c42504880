//! Precedence-based merge of several documents of one case.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::FieldCatalogue;
use crate::models::record::{FieldValue, MethodUsed};
use crate::pipeline::DocumentReport;

/// Role used for documents submitted without one.
pub const UNASSIGNED_ROLE: &str = "unassigned";

/// A merged field with its audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedField {
    pub value: FieldValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    /// Role of the document that supplied the value.
    pub source_role: String,
    /// Display identity of that document.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<MethodUsed>,
}

/// A lower-priority document that extracted a different value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    pub field: String,
    pub kept_role: String,
    pub kept_value: FieldValue,
    pub ignored_role: String,
    pub ignored_value: FieldValue,
}

/// One record per case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub fields: BTreeMap<String, MergedField>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<FieldConflict>,
    /// Catalogue fields no document supplied, in catalogue order.
    pub unresolved: Vec<String>,
    pub unresolved_required: usize,
}

impl MergedRecord {
    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field).map(|f| &f.value)
    }

    /// True when every required field was resolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved_required == 0
    }
}

/// Folds document reports into a [`MergedRecord`].
pub struct CaseMerger<'a> {
    catalogue: &'a FieldCatalogue,
    role_priority: &'a [String],
}

impl<'a> CaseMerger<'a> {
    pub fn new(catalogue: &'a FieldCatalogue, role_priority: &'a [String]) -> Self {
        Self {
            catalogue,
            role_priority,
        }
    }

    fn rank(&self, role: &str) -> usize {
        self.role_priority
            .iter()
            .position(|r| r == role)
            .unwrap_or(self.role_priority.len())
    }

    /// Documents are visited in role priority order (unlisted roles after
    /// the listed ones, in input order). A field is taken from the first
    /// document that extracted it and never overwritten.
    pub fn merge(&self, reports: &[DocumentReport]) -> MergedRecord {
        let mut ordered: Vec<&DocumentReport> = reports.iter().collect();
        ordered.sort_by_key(|r| self.rank(role_of(r)));

        let mut record = MergedRecord::default();
        for report in ordered {
            let role = role_of(report);
            for outcome in report.outcomes.iter().filter(|o| o.is_extracted()) {
                let Some(value) = &outcome.value else {
                    continue;
                };

                if let Some(kept) = record.fields.get(&outcome.field) {
                    if &kept.value != value {
                        debug!(
                            "{}: keeping {} from {}, ignoring {} from {}",
                            outcome.field, kept.value, kept.source_role, value, role
                        );
                        record.conflicts.push(FieldConflict {
                            field: outcome.field.clone(),
                            kept_role: kept.source_role.clone(),
                            kept_value: kept.value.clone(),
                            ignored_role: role.to_string(),
                            ignored_value: value.clone(),
                        });
                    }
                    continue;
                }

                record.fields.insert(
                    outcome.field.clone(),
                    MergedField {
                        value: value.clone(),
                        raw: outcome.raw.clone(),
                        source_role: role.to_string(),
                        source: report.source.clone(),
                        method: outcome.method,
                    },
                );
            }
        }

        for field in self.catalogue.fields() {
            if !record.fields.contains_key(&field.name) {
                record.unresolved.push(field.name.clone());
                if field.required {
                    record.unresolved_required += 1;
                }
            }
        }

        debug!(
            "merged {} fields, {} unresolved ({} required), {} conflicts",
            record.fields.len(),
            record.unresolved.len(),
            record.unresolved_required,
            record.conflicts.len()
        );
        record
    }
}

fn role_of(report: &DocumentReport) -> &str {
    report.role.as_deref().unwrap_or(UNASSIGNED_ROLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::MergeConfig;
    use crate::models::record::{ExtractionOutcome, FieldStatus};
    use pretty_assertions::assert_eq;

    const CATALOGUE: &str = r#"{
        "signatures": [],
        "fields": [
            {"name": "project_name", "type": "text", "source": "any", "required": true,
             "method": {"kind": "horizontal_keyvalue", "key_text": "项目名称"}},
            {"name": "winner", "type": "text", "source": "any", "required": true,
             "method": {"kind": "horizontal_keyvalue", "key_text": "中标供应商"}},
            {"name": "remarks", "type": "text", "source": "any",
             "method": {"kind": "horizontal_keyvalue", "key_text": "备注"}}
        ]
    }"#;

    fn extracted(field: &str, value: &str) -> ExtractionOutcome {
        ExtractionOutcome {
            field: field.to_string(),
            status: FieldStatus::Extracted,
            value: Some(FieldValue::Text(value.to_string())),
            raw: Some(value.to_string()),
            method: None,
            misses: Vec::new(),
            error: None,
        }
    }

    fn report(role: &str, outcomes: Vec<ExtractionOutcome>) -> DocumentReport {
        DocumentReport {
            source: format!("{}.pdf", role),
            role: Some(role.to_string()),
            classification: None,
            outcomes,
            skipped: None,
            missing_required: Vec::new(),
            processing_time_ms: 0,
        }
    }

    #[test]
    fn test_higher_priority_role_wins() {
        let catalogue = FieldCatalogue::from_json_str(CATALOGUE).unwrap();
        let priority = MergeConfig::default().role_priority;
        let merger = CaseMerger::new(&catalogue, &priority);

        // Input order is the reverse of the priority order.
        let record = merger.merge(&[
            report("result_publicity", vec![extracted("project_name", "教学楼维修(结果)")]),
            report("request", vec![extracted("project_name", "教学楼维修")]),
        ]);

        let field = &record.fields["project_name"];
        assert_eq!(field.value, FieldValue::Text("教学楼维修".to_string()));
        assert_eq!(field.source_role, "request");
        assert_eq!(record.conflicts.len(), 1);
        assert_eq!(record.conflicts[0].ignored_role, "result_publicity");
    }

    #[test]
    fn test_unresolved_counts_required() {
        let catalogue = FieldCatalogue::from_json_str(CATALOGUE).unwrap();
        let priority = MergeConfig::default().role_priority;
        let merger = CaseMerger::new(&catalogue, &priority);

        let mut failed = extracted("winner", "x");
        failed.status = FieldStatus::ValidationFailed;
        let record = merger.merge(&[report("notice", vec![extracted("project_name", "p"), failed])]);

        assert_eq!(record.unresolved, vec!["winner".to_string(), "remarks".to_string()]);
        assert_eq!(record.unresolved_required, 1);
        assert!(!record.is_complete());
    }

    #[test]
    fn test_same_value_is_not_a_conflict() {
        let catalogue = FieldCatalogue::from_json_str(CATALOGUE).unwrap();
        let priority = MergeConfig::default().role_priority;
        let merger = CaseMerger::new(&catalogue, &priority);
        let record = merger.merge(&[
            report("notice", vec![extracted("winner", "某某建设")]),
            report("candidate_publicity", vec![extracted("winner", "某某建设")]),
        ]);
        assert!(record.conflicts.is_empty());
        assert_eq!(record.fields["winner"].source_role, "notice");
    }
}
