//! Value normalizers: pure functions from raw text to canonical values.

pub mod amount;
pub mod choice;
pub mod date;
pub mod text;

pub use amount::{normalize_amount, parse_amount};
pub use choice::normalize_choice;
pub use date::normalize_date;
pub use text::{clean_text, fold_width, normalize_text};

use crate::config::{FieldRules, FieldType};
use crate::error::NormalizeError;
use crate::models::config::NormalizeConfig;
use crate::models::record::FieldValue;

/// Normalize `raw` for a field of `field_type`, with per-field `rules`
/// taking precedence over the global `defaults`.
pub fn normalize_value(
    field_type: FieldType,
    raw: &str,
    rules: &FieldRules,
    defaults: &NormalizeConfig,
) -> Result<FieldValue, NormalizeError> {
    match field_type {
        FieldType::Text => {
            let max_length = rules.max_length.unwrap_or(defaults.max_text_length);
            normalize_text(raw, max_length, rules.must_match_regex()).map(FieldValue::Text)
        }
        FieldType::Decimal => normalize_amount(raw, rules.unit_multiplier).map(FieldValue::Decimal),
        FieldType::Date => {
            let formats = if rules.date_formats.is_empty() {
                &defaults.date_formats
            } else {
                &rules.date_formats
            };
            normalize_date(
                raw,
                formats,
                rules.min_year.unwrap_or(defaults.min_year),
                rules.max_year.unwrap_or(defaults.max_year),
            )
            .map(FieldValue::Date)
        }
        FieldType::Choice => normalize_choice(raw, &rules.choices, &rules.aliases).map(FieldValue::Choice),
    }
}
