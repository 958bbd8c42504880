//! Token patterns used by the amount and date methods.
//!
//! Page text is width-folded before matching, so only half-width forms
//! (`¥`, `,`, `:`) need to appear here.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Amount with a currency sign or unit: ¥1,234.50 / 38.33万元 / RMB 500
    pub static ref AMOUNT_MARKED: Regex = Regex::new(
        r"(?:[¥]|RMB|CNY|人民币)\s*-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?(?:\s*(?:万元|元|万))?|-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?\s*(?:万元|元|万)"
    ).unwrap();

    // Bare number, thousands separators allowed
    pub static ref AMOUNT_BARE: Regex = Regex::new(
        r"-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?"
    ).unwrap();

    // 2025年1月15日 / 2025-01-15 / 2025/1/15 / 2025.01.15
    pub static ref DATE_TOKEN: Regex = Regex::new(
        r"\d{4}\s*年\s*\d{1,2}\s*月\s*\d{1,2}\s*日|\d{4}[-/.]\d{1,2}[-/.]\d{1,2}"
    ).unwrap();
}

/// Currency-marked amount in `text`, falling back to a bare number.
pub fn amount_in_value(text: &str) -> Option<&str> {
    AMOUNT_MARKED
        .find(text)
        .or_else(|| AMOUNT_BARE.find(text))
        .map(|m| m.as_str().trim())
}

/// First currency-marked amount in free text.
pub fn marked_amount(text: &str) -> Option<&str> {
    AMOUNT_MARKED.find(text).map(|m| m.as_str().trim())
}

/// Date token in a located value; the whole value when it holds no
/// recognizable token (compact `YYYYMMDD` and custom formats).
pub fn date_in_value(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(DATE_TOKEN.find(trimmed).map(|m| m.as_str()).unwrap_or(trimmed))
}

/// First date token in free text.
pub fn first_date(text: &str) -> Option<&str> {
    DATE_TOKEN.find(text).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marked_amount_skips_years() {
        assert_eq!(marked_amount("2025年预算 38.33万元"), Some("38.33万元"));
        assert_eq!(marked_amount("合计: ¥ 1,234.50"), Some("¥ 1,234.50"));
        assert_eq!(marked_amount("编号 2025-017"), None);
    }

    #[test]
    fn test_amount_in_value_prefers_marked() {
        assert_eq!(amount_in_value("第1包 560元"), Some("560元"));
        assert_eq!(amount_in_value("1,280,000.00"), Some("1,280,000.00"));
    }

    #[test]
    fn test_date_tokens() {
        assert_eq!(first_date("发布时间: 2025年 1月15日 10:00"), Some("2025年 1月15日"));
        assert_eq!(first_date("截止 2025-03-01 09:30"), Some("2025-03-01"));
        assert_eq!(date_in_value(" 20250115 "), Some("20250115"));
    }
}
