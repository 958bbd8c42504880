//! Date normalization.

use chrono::{Datelike, NaiveDate};

use super::text::fold_width;
use crate::error::NormalizeError;

/// Parse `raw` with the first matching format and check the year range.
///
/// Formats are chrono strftime patterns tried in declared order; trailing
/// text after a successful parse (a time of day, a weekday) is ignored. Runs
/// of eight digits are read as `YYYYMMDD`.
pub fn normalize_date(
    raw: &str,
    formats: &[String],
    min_year: i32,
    max_year: i32,
) -> Result<NaiveDate, NormalizeError> {
    let compact: String = fold_width(raw).chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let date = parse_compact_digits(&compact)
        .or_else(|| {
            formats.iter().find_map(|format| {
                NaiveDate::parse_and_remainder(&compact, format)
                    .ok()
                    .map(|(date, _)| date)
            })
        })
        .ok_or_else(|| NormalizeError::InvalidDate(raw.trim().to_string()))?;

    let year = date.year();
    if year < min_year || year > max_year {
        return Err(NormalizeError::YearOutOfRange {
            year,
            min: min_year,
            max: max_year,
        });
    }

    Ok(date)
}

fn parse_compact_digits(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::NormalizeConfig;

    fn defaults() -> Vec<String> {
        NormalizeConfig::default().date_formats
    }

    #[test]
    fn test_chinese_idiom() {
        let date = normalize_date("2025年1月15日", &defaults(), 1900, 2100).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
    }

    #[test]
    fn test_spaced_and_full_width() {
        let date = normalize_date("２０２５ 年 ３ 月 ８ 日", &defaults(), 1900, 2100).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 8).unwrap());
    }

    #[test]
    fn test_iso_with_trailing_time() {
        let date = normalize_date("2024-12-01 09:30", &defaults(), 1900, 2100).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
    }

    #[test]
    fn test_compact_digits() {
        let date = normalize_date("20240229", &defaults(), 1900, 2100).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_declared_order_is_respected() {
        let formats = vec!["%d/%m/%Y".to_string(), "%m/%d/%Y".to_string()];
        let date = normalize_date("03/04/2025", &formats, 1900, 2100).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 4, 3).unwrap());
    }

    #[test]
    fn test_year_out_of_range() {
        assert_eq!(
            normalize_date("1899年12月31日", &defaults(), 1900, 2100),
            Err(NormalizeError::YearOutOfRange { year: 1899, min: 1900, max: 2100 })
        );
    }

    #[test]
    fn test_invalid_calendar_date() {
        assert!(matches!(
            normalize_date("2025年2月30日", &defaults(), 1900, 2100),
            Err(NormalizeError::InvalidDate(_))
        ));
    }
}
