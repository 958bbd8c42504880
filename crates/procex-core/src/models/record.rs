//! Per-field extraction results.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Cleaned free text.
    Text(String),
    /// Amount rounded to two decimal places.
    Decimal(Decimal),
    /// Calendar date.
    Date(NaiveDate),
    /// Canonical enumerated value.
    Choice(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) | FieldValue::Choice(s) => f.write_str(s),
            FieldValue::Decimal(d) => write!(f, "{:.2}", d),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Final status of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Extracted,
    NotFound,
    ValidationFailed,
}

/// Extraction method kinds, one per catalogue `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    HorizontalKeyvalue,
    VerticalKeyvalue,
    Amount,
    Date,
    Regex,
    TableFirstRow,
    Multiline,
    FixedValue,
}

impl MethodKind {
    /// All kinds in catalogue spelling.
    pub const ALL: [MethodKind; 8] = [
        MethodKind::HorizontalKeyvalue,
        MethodKind::VerticalKeyvalue,
        MethodKind::Amount,
        MethodKind::Date,
        MethodKind::Regex,
        MethodKind::TableFirstRow,
        MethodKind::Multiline,
        MethodKind::FixedValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::HorizontalKeyvalue => "horizontal_keyvalue",
            MethodKind::VerticalKeyvalue => "vertical_keyvalue",
            MethodKind::Amount => "amount",
            MethodKind::Date => "date",
            MethodKind::Regex => "regex",
            MethodKind::TableFirstRow => "table_first_row",
            MethodKind::Multiline => "multiline",
            MethodKind::FixedValue => "fixed_value",
        }
    }

    /// Parse a catalogue kind name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a method obtained its raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Cell geometry lookup.
    Spatial,
    /// Linear match over reconstructed page text.
    Text,
    /// No document lookup (fixed value).
    Direct,
}

/// The method that actually produced a field's raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodUsed {
    pub kind: MethodKind,
    pub strategy: Strategy,
}

impl fmt::Display for MethodUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self.strategy {
            Strategy::Spatial => "spatial",
            Strategy::Text => "text",
            Strategy::Direct => "direct",
        };
        write!(f, "{}/{}", self.kind, strategy)
    }
}

/// A recoverable miss recorded while walking the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodMiss {
    pub kind: MethodKind,
    pub strategy: Strategy,
    pub reason: String,
}

/// Outcome of extracting one configured field from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    /// Catalogue field name.
    pub field: String,
    /// Final status.
    pub status: FieldStatus,
    /// Normalized value when extracted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FieldValue>,
    /// Raw text as read from the document, kept for audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    /// Method that produced the raw value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<MethodUsed>,
    /// Methods tried before the one that succeeded (or all, when not found).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub misses: Vec<MethodMiss>,
    /// Normalizer rejection message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionOutcome {
    /// A field that no method could locate.
    pub fn not_found(field: impl Into<String>, misses: Vec<MethodMiss>) -> Self {
        Self {
            field: field.into(),
            status: FieldStatus::NotFound,
            value: None,
            raw: None,
            method: None,
            misses,
            error: None,
        }
    }

    pub fn is_extracted(&self) -> bool {
        self.status == FieldStatus::Extracted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_method_kind_names_round_trip() {
        for kind in MethodKind::ALL {
            assert_eq!(MethodKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(MethodKind::from_name("guess"), None);
    }

    #[test]
    fn test_field_value_display() {
        let amount = FieldValue::Decimal(Decimal::from_str("383300.00").unwrap());
        assert_eq!(amount.to_string(), "383300.00");
        let date = FieldValue::Date(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(date.to_string(), "2025-01-15");
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = ExtractionOutcome::not_found("budget", Vec::new());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "not_found");
        assert!(json.get("value").is_none());
    }
}
