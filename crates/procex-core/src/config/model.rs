//! Catalogue schema: field mapping entries and type signatures.

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::layout::Direction;
use crate::models::record::MethodKind;

/// Source value for fields that apply to every document, classified or not.
pub const ANY_SOURCE: &str = "any";

/// Declared type of a field; selects the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Decimal,
    Date,
    Choice,
}

/// Parameters of the key/value methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueParams {
    /// Label text as printed on the form.
    pub key_text: String,

    /// Alternative spellings of the label, tried after `key_text`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    /// Overrides the method's natural direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,

    /// Overrides the configured search distance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f64>,
}

impl KeyValueParams {
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.key_text.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Parameters of the `amount` and `date` methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenParams {
    /// Label whose value holds the token; whole pages are scanned without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl TokenParams {
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.key_text
            .as_deref()
            .into_iter()
            .chain(self.aliases.iter().map(String::as_str))
    }
}

/// Parameters of the `regex` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexParams {
    pub pattern: String,

    #[serde(skip)]
    pub(crate) compiled: Option<Regex>,
}

impl RegexParams {
    /// Compiled pattern; set when the catalogue is validated.
    pub fn regex(&self) -> Option<&Regex> {
        self.compiled.as_ref()
    }
}

/// Parameters of the `table_first_row` method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableParams {
    /// Header text identifying the table.
    pub anchor_text: String,

    /// Header column to read (0-based).
    #[serde(default)]
    pub column_index: usize,
}

/// Parameters of the `multiline` method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultilineParams {
    pub start_label: String,

    /// Extra labels that end the capture, besides every catalogue label.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub end_labels: Vec<String>,
}

/// Parameters of the `fixed_value` method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedParams {
    pub value: String,
}

/// One extraction method with its typed parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MethodSpec {
    HorizontalKeyvalue(KeyValueParams),
    VerticalKeyvalue(KeyValueParams),
    Amount(TokenParams),
    Date(TokenParams),
    Regex(RegexParams),
    TableFirstRow(TableParams),
    Multiline(MultilineParams),
    FixedValue(FixedParams),
}

impl MethodSpec {
    pub fn kind(&self) -> MethodKind {
        match self {
            MethodSpec::HorizontalKeyvalue(_) => MethodKind::HorizontalKeyvalue,
            MethodSpec::VerticalKeyvalue(_) => MethodKind::VerticalKeyvalue,
            MethodSpec::Amount(_) => MethodKind::Amount,
            MethodSpec::Date(_) => MethodKind::Date,
            MethodSpec::Regex(_) => MethodKind::Regex,
            MethodSpec::TableFirstRow(_) => MethodKind::TableFirstRow,
            MethodSpec::Multiline(_) => MethodKind::Multiline,
            MethodSpec::FixedValue(_) => MethodKind::FixedValue,
        }
    }

    /// Label texts this method looks for in documents.
    pub fn labels(&self) -> Vec<&str> {
        match self {
            MethodSpec::HorizontalKeyvalue(p) | MethodSpec::VerticalKeyvalue(p) => p.labels().collect(),
            MethodSpec::Amount(p) | MethodSpec::Date(p) => p.labels().collect(),
            MethodSpec::TableFirstRow(p) => vec![p.anchor_text.as_str()],
            MethodSpec::Multiline(p) => vec![p.start_label.as_str()],
            MethodSpec::Regex(_) | MethodSpec::FixedValue(_) => Vec::new(),
        }
    }
}

/// Per-field normalization and validation rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRules {
    /// Factor applied to amounts (e.g. 10000 for a `万元` column).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_multiplier: Option<Decimal>,

    /// Date formats for this field; the global list is used when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub date_formats: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_year: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_year: Option<i32>,

    /// Text truncation length in characters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Canonical values of a `choice` field.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,

    /// Alias -> canonical choice.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,

    /// Pattern the normalized text must match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_match: Option<String>,

    #[serde(skip)]
    pub(crate) must_match_regex: Option<Regex>,
}

impl FieldRules {
    pub fn must_match_regex(&self) -> Option<&Regex> {
        self.must_match_regex.as_ref()
    }
}

/// Declarative description of one field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMappingEntry {
    pub name: String,

    #[serde(default)]
    pub required: bool,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Document type id, or `"any"`.
    pub source: String,

    /// Primary method.
    pub method: MethodSpec,

    /// Methods tried in order after the primary one misses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback: Vec<MethodSpec>,

    #[serde(default)]
    pub rules: FieldRules,
}

impl FieldMappingEntry {
    /// Primary method followed by the fallbacks.
    pub fn chain(&self) -> impl Iterator<Item = &MethodSpec> {
        std::iter::once(&self.method).chain(self.fallback.iter())
    }

    /// Whether the field is extracted from a document of `doc_type`
    /// (`None` for unclassified documents).
    pub fn applies_to(&self, doc_type: Option<&str>) -> bool {
        self.source == ANY_SOURCE || doc_type == Some(self.source.as_str())
    }
}

/// A signature pattern: a plain substring, or a weighted substring/regex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignaturePattern {
    Plain(String),
    Weighted {
        pattern: String,
        #[serde(default = "default_weight")]
        weight: f64,
        #[serde(default)]
        regex: bool,
    },
}

fn default_weight() -> f64 {
    1.0
}

impl SignaturePattern {
    pub fn pattern(&self) -> &str {
        match self {
            SignaturePattern::Plain(p) => p,
            SignaturePattern::Weighted { pattern, .. } => pattern,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            SignaturePattern::Plain(_) => 1.0,
            SignaturePattern::Weighted { weight, .. } => *weight,
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, SignaturePattern::Weighted { regex: true, .. })
    }
}

/// Textual signature of one document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSignature {
    pub doc_type: String,
    pub patterns: Vec<SignaturePattern>,
    /// Minimum confidence for the type to be selected.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}
