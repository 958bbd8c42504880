//! Per-field fallback chains and method dispatch.

use tracing::debug;

use super::document::PreparedDocument;
use super::patterns::{amount_in_value, date_in_value, first_date, marked_amount};
use super::text;
use crate::config::{FieldCatalogue, FieldMappingEntry, KeyValueParams, MethodSpec, TokenParams};
use crate::error::LookupError;
use crate::layout::Direction;
use crate::models::config::NormalizeConfig;
use crate::models::record::{
    ExtractionOutcome, FieldStatus, MethodKind, MethodMiss, MethodUsed, Strategy,
};
use crate::normalize::normalize_value;

/// Raw value found by one method.
#[derive(Debug, Clone, PartialEq)]
struct RawHit {
    raw: String,
    strategy: Strategy,
}

impl RawHit {
    fn spatial(raw: String) -> Self {
        Self {
            raw,
            strategy: Strategy::Spatial,
        }
    }

    fn text(raw: String) -> Self {
        Self {
            raw,
            strategy: Strategy::Text,
        }
    }
}

/// Runs the configured methods for each field of a document.
pub struct FieldExtractor<'a> {
    catalogue: &'a FieldCatalogue,
    normalize: &'a NormalizeConfig,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(catalogue: &'a FieldCatalogue, normalize: &'a NormalizeConfig) -> Self {
        Self {
            catalogue,
            normalize,
        }
    }

    /// Outcomes for every field that applies to `doc_type`, in catalogue order.
    pub fn extract_all(
        &self,
        doc: &PreparedDocument,
        doc_type: Option<&str>,
    ) -> Vec<ExtractionOutcome> {
        self.catalogue
            .fields_for(doc_type)
            .map(|field| self.extract_field(doc, field))
            .collect()
    }

    /// Walk the field's chain until a method yields a raw value, then
    /// normalize it.
    pub fn extract_field(
        &self,
        doc: &PreparedDocument,
        field: &FieldMappingEntry,
    ) -> ExtractionOutcome {
        let mut misses = Vec::new();

        for method in field.chain() {
            let kind = method.kind();
            let Some(hit) = self.run(doc, method, &mut misses) else {
                continue;
            };
            let used = MethodUsed {
                kind,
                strategy: hit.strategy,
            };

            return match normalize_value(field.field_type, &hit.raw, &field.rules, self.normalize) {
                Ok(value) => {
                    debug!("{}: extracted via {}", field.name, used);
                    ExtractionOutcome {
                        field: field.name.clone(),
                        status: FieldStatus::Extracted,
                        value: Some(value),
                        raw: Some(hit.raw),
                        method: Some(used),
                        misses,
                        error: None,
                    }
                }
                Err(e) => {
                    debug!("{}: raw {:?} rejected: {}", field.name, hit.raw, e);
                    ExtractionOutcome {
                        field: field.name.clone(),
                        status: FieldStatus::ValidationFailed,
                        value: None,
                        raw: Some(hit.raw),
                        method: Some(used),
                        misses,
                        error: Some(e.to_string()),
                    }
                }
            };
        }

        debug!("{}: not found after {} misses", field.name, misses.len());
        ExtractionOutcome::not_found(&field.name, misses)
    }

    fn run(
        &self,
        doc: &PreparedDocument,
        method: &MethodSpec,
        misses: &mut Vec<MethodMiss>,
    ) -> Option<RawHit> {
        match method {
            MethodSpec::HorizontalKeyvalue(p) => {
                self.keyvalue(doc, p, Direction::Right, MethodKind::HorizontalKeyvalue, misses)
            }
            MethodSpec::VerticalKeyvalue(p) => {
                self.keyvalue(doc, p, Direction::Below, MethodKind::VerticalKeyvalue, misses)
            }
            MethodSpec::Amount(p) => {
                self.token(doc, p, MethodKind::Amount, amount_in_value, marked_amount, misses)
            }
            MethodSpec::Date(p) => {
                self.token(doc, p, MethodKind::Date, date_in_value, first_date, misses)
            }
            MethodSpec::Regex(p) => {
                match p.regex().and_then(|re| text::first_capture(doc.page_lines(), re)) {
                    Some(raw) => Some(RawHit::text(raw)),
                    None => {
                        let reason = LookupError::PatternNotFound(p.pattern.clone());
                        record(misses, MethodKind::Regex, Strategy::Text, reason);
                        None
                    }
                }
            }
            MethodSpec::TableFirstRow(p) => {
                match doc.cells().first_table_row(&p.anchor_text, p.column_index) {
                    Ok(raw) => return Some(RawHit::spatial(raw)),
                    Err(e) => record(misses, MethodKind::TableFirstRow, Strategy::Spatial, e),
                }
                match text::table_row_after_anchor(doc.page_lines(), &p.anchor_text, p.column_index) {
                    Ok(raw) => Some(RawHit::text(raw)),
                    Err(e) => {
                        record(misses, MethodKind::TableFirstRow, Strategy::Text, e);
                        None
                    }
                }
            }
            MethodSpec::Multiline(p) => {
                let stops: Vec<&str> = self
                    .catalogue
                    .recognized_labels()
                    .iter()
                    .map(String::as_str)
                    .chain(p.end_labels.iter().map(String::as_str))
                    .collect();
                match text::multiline_after_label(doc.page_lines(), &p.start_label, &stops) {
                    Ok(raw) => Some(RawHit::text(raw)),
                    Err(e) => {
                        record(misses, MethodKind::Multiline, Strategy::Text, e);
                        None
                    }
                }
            }
            MethodSpec::FixedValue(p) => Some(RawHit {
                raw: p.value.clone(),
                strategy: Strategy::Direct,
            }),
        }
    }

    /// Spatial lookup over every label spelling, then the linear text match.
    fn keyvalue(
        &self,
        doc: &PreparedDocument,
        params: &KeyValueParams,
        natural: Direction,
        kind: MethodKind,
        misses: &mut Vec<MethodMiss>,
    ) -> Option<RawHit> {
        let direction = params.direction.unwrap_or(natural);
        let labels: Vec<&str> = params.labels().collect();

        match spatial_value(doc, &labels, direction, params.max_distance, |v| Some(v.trim())) {
            Ok(raw) => return Some(RawHit::spatial(raw)),
            Err(e) => record(misses, kind, Strategy::Spatial, e),
        }
        match text_value(doc, &labels, direction, |v| Some(v.trim())) {
            Ok(raw) => Some(RawHit::text(raw)),
            Err(e) => {
                record(misses, kind, Strategy::Text, e);
                None
            }
        }
    }

    /// Amount/date: a token inside a labeled value, or the first marked
    /// token on the pages when no label is configured.
    fn token(
        &self,
        doc: &PreparedDocument,
        params: &TokenParams,
        kind: MethodKind,
        in_value: fn(&str) -> Option<&str>,
        in_page: fn(&str) -> Option<&str>,
        misses: &mut Vec<MethodMiss>,
    ) -> Option<RawHit> {
        let labels: Vec<&str> = params.labels().collect();

        if labels.is_empty() {
            return match text::first_in_pages(doc.page_lines(), in_page) {
                Some(raw) => Some(RawHit::text(raw)),
                None => {
                    let reason = LookupError::PatternNotFound(kind.to_string());
                    record(misses, kind, Strategy::Text, reason);
                    None
                }
            };
        }

        match spatial_value(doc, &labels, Direction::Auto, None, in_value) {
            Ok(raw) => return Some(RawHit::spatial(raw)),
            Err(e) => record(misses, kind, Strategy::Spatial, e),
        }
        match text_value(doc, &labels, Direction::Auto, in_value) {
            Ok(raw) => Some(RawHit::text(raw)),
            Err(e) => {
                record(misses, kind, Strategy::Text, e);
                None
            }
        }
    }
}

fn record(misses: &mut Vec<MethodMiss>, kind: MethodKind, strategy: Strategy, reason: LookupError) {
    debug!("miss {}: {}", MethodUsed { kind, strategy }, reason);
    misses.push(MethodMiss {
        kind,
        strategy,
        reason: reason.to_string(),
    });
}

/// First label spelling whose located value passes `pick`.
fn spatial_value(
    doc: &PreparedDocument,
    labels: &[&str],
    direction: Direction,
    max_distance: Option<f64>,
    pick: impl Fn(&str) -> Option<&str>,
) -> Result<String, LookupError> {
    let cells = doc.cells();
    let mut last = None;
    for label in labels {
        match cells.extract_keyvalue_pair(label, direction, max_distance) {
            Ok(hit) => match pick(&hit.value).filter(|v| !v.is_empty()) {
                Some(value) => return Ok(value.to_string()),
                None => last = Some(LookupError::PatternNotFound(hit.value)),
            },
            Err(e) => last = Some(prefer_specific(last, e)),
        }
    }
    Err(last.unwrap_or_else(|| LookupError::LabelNotFound(labels.join("|"))))
}

fn text_value(
    doc: &PreparedDocument,
    labels: &[&str],
    direction: Direction,
    pick: impl Fn(&str) -> Option<&str>,
) -> Result<String, LookupError> {
    let pages = doc.page_lines();
    let mut last = None;
    for label in labels {
        let found = match direction {
            Direction::Right => text::value_after_label(pages, label),
            Direction::Below => text::value_below_label(pages, label),
            Direction::Auto => text::value_after_label(pages, label)
                .or_else(|_| text::value_below_label(pages, label)),
        };
        match found {
            Ok(value) => match pick(&value).filter(|v| !v.is_empty()) {
                Some(picked) => return Ok(picked.to_string()),
                None => last = Some(LookupError::PatternNotFound(value)),
            },
            Err(e) => last = Some(prefer_specific(last, e)),
        }
    }
    Err(last.unwrap_or_else(|| LookupError::LabelNotFound(labels.join("|"))))
}

/// Keep the more informative of two misses: a located label beats an
/// absent one.
fn prefer_specific(previous: Option<LookupError>, next: LookupError) -> LookupError {
    match (previous, next) {
        (Some(prev), LookupError::LabelNotFound(_)) => prev,
        (_, next) => next,
    }
}
