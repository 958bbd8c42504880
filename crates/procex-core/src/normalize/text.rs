//! Free-text normalization and whitespace-insensitive label matching.

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::NormalizeError;

/// Full-width to half-width folding (NFKC): `１２３` → `123`, `：` → `:`,
/// ideographic space → ASCII space.
pub fn fold_width(s: &str) -> String {
    s.nfkc().collect()
}

/// NFKC, trim, and collapse whitespace runs into a single space.
pub fn clean_text(raw: &str) -> String {
    fold_width(raw).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a free-text field value.
pub fn normalize_text(
    raw: &str,
    max_length: usize,
    must_match: Option<&Regex>,
) -> Result<String, NormalizeError> {
    let cleaned = clean_text(raw);
    if cleaned.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let truncated: String = if max_length > 0 && cleaned.chars().count() > max_length {
        cleaned.chars().take(max_length).collect::<String>().trim_end().to_string()
    } else {
        cleaned
    };

    if let Some(pattern) = must_match {
        if !pattern.is_match(&truncated) {
            return Err(NormalizeError::PatternMismatch(truncated));
        }
    }

    Ok(truncated)
}

fn is_label_colon(c: char) -> bool {
    matches!(c, ':' | '：')
}

/// Comparison key for labels: NFKC, no whitespace, no trailing colon.
pub fn label_key(s: &str) -> String {
    let compact: String = fold_width(s).chars().filter(|c| !c.is_whitespace()).collect();
    compact.trim_end_matches(is_label_colon).to_string()
}

/// Text following a `label:value` cell, when the label is followed by a colon.
pub fn inline_value(cell_text: &str, label: &str) -> Option<String> {
    let folded = fold_width(cell_text);
    let (start, end) = find_label_span(&folded, label)?;
    if start != 0 && !folded[..start].trim().is_empty() {
        return None;
    }
    let rest = folded[end..].trim_start();
    let rest = rest.strip_prefix(is_label_colon)?;
    let value = rest.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Byte span of `label` in `haystack`, ignoring whitespace on both sides.
///
/// Both inputs are compared after width folding of the label; the haystack is
/// expected to be folded already. A trailing colon on the label is ignored.
pub fn find_label_span(haystack: &str, label: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = label_key(label).chars().collect();
    if needle.is_empty() {
        return None;
    }

    let chars: Vec<(usize, char)> = haystack
        .char_indices()
        .filter(|(_, c)| !c.is_whitespace())
        .collect();
    if chars.len() < needle.len() {
        return None;
    }

    (0..=chars.len() - needle.len())
        .find(|&start| {
            needle
                .iter()
                .enumerate()
                .all(|(i, c)| chars[start + i].1 == *c)
        })
        .map(|start| {
            let (last_pos, last_char) = chars[start + needle.len() - 1];
            (chars[start].0, last_pos + last_char.len_utf8())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_and_folds() {
        assert_eq!(clean_text("  某某\u{3000}\u{3000}工程  \n 二期 "), "某某 工程 二期");
        assert_eq!(clean_text("ＡＢＣ１２３"), "ABC123");
    }

    #[test]
    fn test_normalize_text_truncates() {
        assert_eq!(normalize_text("abcdef", 3, None).unwrap(), "abc");
        assert_eq!(normalize_text("   ", 10, None), Err(NormalizeError::Empty));
    }

    #[test]
    fn test_normalize_text_pattern() {
        let re = Regex::new(r"^[A-Z]{2}-\d+$").unwrap();
        assert_eq!(normalize_text(" ＣＧ-2025 ", 0, Some(&re)).unwrap(), "CG-2025");
        assert!(matches!(
            normalize_text("draft", 0, Some(&re)),
            Err(NormalizeError::PatternMismatch(_))
        ));
    }

    #[test]
    fn test_label_key() {
        assert_eq!(label_key("项目 名称："), "项目名称");
        assert_eq!(label_key("Budget:"), "Budget");
    }

    #[test]
    fn test_find_label_span_ignores_whitespace() {
        let line = "采购 项目 名称: 办公楼改造";
        let (start, end) = find_label_span(line, "采购项目名称").unwrap();
        assert_eq!(&line[start..end], "采购 项目 名称");
        assert!(find_label_span(line, "预算金额").is_none());
    }

    #[test]
    fn test_inline_value() {
        assert_eq!(inline_value("项目编号：CG-2025-017", "项目编号"), Some("CG-2025-017".to_string()));
        assert_eq!(inline_value("项目编号", "项目编号"), None);
        assert_eq!(inline_value("项目编号 说明", "项目编号"), None);
    }
}
