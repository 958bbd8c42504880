//! Catalogue loading and validation.

use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use super::model::{FieldMappingEntry, FieldType, MethodSpec, TypeSignature, ANY_SOURCE};
use crate::classify::DocumentClassifier;
use crate::error::{ConfigError, ConfigIssue};
use crate::models::record::MethodKind;

#[derive(Debug, Deserialize)]
struct RawCatalogue {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    signatures: Vec<Value>,
    #[serde(default)]
    fields: Vec<Value>,
}

/// Validated field and signature catalogue. Immutable once built.
#[derive(Debug, Clone)]
pub struct FieldCatalogue {
    version: Option<String>,
    signatures: Vec<TypeSignature>,
    fields: Vec<FieldMappingEntry>,
    classifier: DocumentClassifier,
    labels: Vec<String>,
}

impl FieldCatalogue {
    /// Validate typed signatures and fields.
    pub fn new(
        signatures: Vec<TypeSignature>,
        fields: Vec<FieldMappingEntry>,
    ) -> Result<Self, ConfigError> {
        let fields = fields.into_iter().enumerate().collect();
        Self::validate(None, signatures, fields, Vec::new())
    }

    /// Parse and validate catalogue JSON, reporting every offending entry.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawCatalogue =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut issues = Vec::new();

        let mut signatures = Vec::with_capacity(raw.signatures.len());
        for (i, value) in raw.signatures.into_iter().enumerate() {
            let entry = format!("signature[{}] {}", i, entry_name(&value, "doc_type"));
            match serde_json::from_value::<TypeSignature>(value) {
                Ok(signature) => signatures.push(signature),
                Err(e) => issues.push(ConfigIssue::new(entry, format!("malformed entry: {}", e))),
            }
        }

        let mut fields = Vec::with_capacity(raw.fields.len());
        for (i, value) in raw.fields.into_iter().enumerate() {
            let entry = format!("field[{}] {}", i, entry_name(&value, "name"));
            let kind_issues = check_method_kinds(&value);
            if !kind_issues.is_empty() {
                issues.extend(kind_issues.into_iter().map(|p| ConfigIssue::new(&entry, p)));
                continue;
            }
            match serde_json::from_value::<FieldMappingEntry>(value) {
                Ok(field) => fields.push((i, field)),
                Err(e) => issues.push(ConfigIssue::new(entry, format!("malformed entry: {}", e))),
            }
        }

        Self::validate(raw.version, signatures, fields, issues)
    }

    /// Read and validate a catalogue file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let catalogue = Self::from_json_str(&content)?;
        info!(
            "Loaded catalogue {}: {} signatures, {} fields",
            path.display(),
            catalogue.signatures.len(),
            catalogue.fields.len()
        );
        Ok(catalogue)
    }

    fn validate(
        version: Option<String>,
        signatures: Vec<TypeSignature>,
        mut fields: Vec<(usize, FieldMappingEntry)>,
        mut issues: Vec<ConfigIssue>,
    ) -> Result<Self, ConfigError> {
        let classifier = match DocumentClassifier::from_signatures(&signatures) {
            Ok(classifier) => classifier,
            Err(signature_issues) => {
                issues.extend(signature_issues);
                DocumentClassifier::default()
            }
        };
        let known_types: HashSet<&str> = signatures.iter().map(|s| s.doc_type.as_str()).collect();

        let mut names = HashSet::new();
        for (i, field) in fields.iter_mut() {
            let entry = format!("field[{}] {}", i, field.name);
            let mut problems = Vec::new();

            if field.name.trim().is_empty() {
                problems.push("empty field name".to_string());
            } else if !names.insert(field.name.clone()) {
                problems.push("duplicate field name".to_string());
            }
            if field.source != ANY_SOURCE && !known_types.contains(field.source.as_str()) {
                problems.push(format!("source type `{}` has no signature", field.source));
            }

            check_method(&mut field.method, &mut problems);
            for method in field.fallback.iter_mut() {
                check_method(method, &mut problems);
            }
            check_rules(field, &mut problems);

            issues.extend(problems.into_iter().map(|p| ConfigIssue::new(&entry, p)));
        }

        if !issues.is_empty() {
            return Err(ConfigError::Invalid(issues));
        }

        let fields: Vec<FieldMappingEntry> = fields.into_iter().map(|(_, f)| f).collect();
        let mut labels: Vec<String> = Vec::new();
        for label in fields.iter().flat_map(|f| f.chain()).flat_map(|m| m.labels()) {
            if !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }
        debug!("catalogue recognizes {} labels", labels.len());

        Ok(Self {
            version,
            signatures,
            fields,
            classifier,
            labels,
        })
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn signatures(&self) -> &[TypeSignature] {
        &self.signatures
    }

    /// Fields in catalogue order.
    pub fn fields(&self) -> &[FieldMappingEntry] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldMappingEntry> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields extracted from a document of `doc_type` (`None` = unclassified).
    pub fn fields_for<'a>(
        &'a self,
        doc_type: Option<&'a str>,
    ) -> impl Iterator<Item = &'a FieldMappingEntry> + 'a {
        self.fields.iter().filter(move |f| f.applies_to(doc_type))
    }

    pub fn classifier(&self) -> &DocumentClassifier {
        &self.classifier
    }

    /// Every label text any method looks for; ends multiline captures.
    pub fn recognized_labels(&self) -> &[String] {
        &self.labels
    }
}

fn entry_name<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("<unnamed>")
}

/// Method kinds are checked before typed parsing so an unknown kind is
/// reported as such rather than as a generic schema error.
fn check_method_kinds(value: &Value) -> Vec<String> {
    let mut problems = Vec::new();
    let methods = value
        .get("method")
        .into_iter()
        .chain(value.get("fallback").and_then(Value::as_array).into_iter().flatten());
    for method in methods {
        match method.get("kind").and_then(Value::as_str) {
            None => problems.push("method without `kind`".to_string()),
            Some(kind) if MethodKind::from_name(kind).is_none() => {
                problems.push(format!("unrecognized method kind `{}`", kind));
            }
            Some(_) => {}
        }
    }
    problems
}

fn require(value: &str, param: &str, kind: MethodKind, problems: &mut Vec<String>) {
    if value.trim().is_empty() {
        problems.push(format!("{} requires a non-empty `{}`", kind, param));
    }
}

fn check_method(method: &mut MethodSpec, problems: &mut Vec<String>) {
    let kind = method.kind();
    match method {
        MethodSpec::HorizontalKeyvalue(p) | MethodSpec::VerticalKeyvalue(p) => {
            require(&p.key_text, "key_text", kind, problems);
            if p.aliases.iter().any(|a| a.trim().is_empty()) {
                problems.push(format!("{} has an empty alias", kind));
            }
            if p.max_distance.is_some_and(|d| d < 0.0) {
                problems.push(format!("{} has a negative max_distance", kind));
            }
        }
        MethodSpec::Amount(p) | MethodSpec::Date(p) => {
            if let Some(key) = &p.key_text {
                require(key, "key_text", kind, problems);
            }
            if !p.aliases.is_empty() && p.key_text.is_none() {
                problems.push(format!("{} has aliases but no key_text", kind));
            }
        }
        MethodSpec::Regex(p) => match Regex::new(&p.pattern) {
            Ok(re) if !p.pattern.is_empty() => p.compiled = Some(re),
            Ok(_) => require(&p.pattern, "pattern", kind, problems),
            Err(e) => problems.push(format!("invalid regex {:?}: {}", p.pattern, e)),
        },
        MethodSpec::TableFirstRow(p) => require(&p.anchor_text, "anchor_text", kind, problems),
        MethodSpec::Multiline(p) => require(&p.start_label, "start_label", kind, problems),
        MethodSpec::FixedValue(p) => require(&p.value, "value", kind, problems),
    }
}

fn check_rules(field: &mut FieldMappingEntry, problems: &mut Vec<String>) {
    let rules = &mut field.rules;

    if field.field_type == FieldType::Choice && rules.choices.is_empty() {
        problems.push("choice field without choices".to_string());
    }
    for (alias, canonical) in &rules.aliases {
        if !rules.choices.contains(canonical) {
            problems.push(format!("alias {:?} maps to unknown choice {:?}", alias, canonical));
        }
    }
    if rules.unit_multiplier.is_some_and(|m| m <= Decimal::ZERO) {
        problems.push("unit_multiplier must be positive".to_string());
    }
    if let (Some(min), Some(max)) = (rules.min_year, rules.max_year) {
        if min > max {
            problems.push(format!("min_year {} after max_year {}", min, max));
        }
    }
    if let Some(pattern) = &rules.must_match {
        match Regex::new(pattern) {
            Ok(re) => rules.must_match_regex = Some(re),
            Err(e) => problems.push(format!("invalid must_match {:?}: {}", pattern, e)),
        }
    }
}
