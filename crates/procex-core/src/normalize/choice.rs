//! Enumerated value normalization.

use std::collections::BTreeMap;

use super::text::{clean_text, label_key};
use crate::error::NormalizeError;

/// Map `raw` onto a canonical choice: exact match first, then the alias table.
pub fn normalize_choice(
    raw: &str,
    choices: &[String],
    aliases: &BTreeMap<String, String>,
) -> Result<String, NormalizeError> {
    let key = label_key(raw);
    if key.is_empty() {
        return Err(NormalizeError::Empty);
    }

    if let Some(choice) = choices.iter().find(|c| label_key(c) == key) {
        return Ok(choice.clone());
    }

    aliases
        .iter()
        .find(|(alias, _)| label_key(alias) == key)
        .map(|(_, canonical)| canonical.clone())
        .ok_or_else(|| NormalizeError::UnknownChoice(clean_text(raw)))
}
