//! Linear text matching over reconstructed page lines.
//!
//! Second tier behind the spatial lookups: labels are searched as
//! whitespace-insensitive substrings of each line.

use regex::Regex;

use crate::error::LookupError;
use crate::normalize::text::{find_label_span, label_key};

/// Remainder of `line` after the label ending at `end`, without the colon.
fn after_label(line: &str, end: usize) -> &str {
    line[end..]
        .trim_start_matches([' ', '\t'])
        .trim_start_matches([':', '：'])
        .trim_start_matches([' ', '\t'])
}

/// Text up to the next delimiter: tab, `|`, two spaces, or line end.
fn until_delimiter(s: &str) -> &str {
    let end = [s.find('\t'), s.find('|'), s.find("  ")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(s.len());
    s[..end].trim()
}

/// Value on the same line as `label`.
pub fn value_after_label(pages: &[Vec<String>], label: &str) -> Result<String, LookupError> {
    let mut seen = false;
    for line in pages.iter().flatten() {
        if let Some((_, end)) = find_label_span(line, label) {
            seen = true;
            let value = until_delimiter(after_label(line, end));
            if !value.is_empty() {
                return Ok(value.to_string());
            }
        }
    }
    Err(if seen {
        LookupError::NoAlignedValue(label.to_string())
    } else {
        LookupError::LabelNotFound(label.to_string())
    })
}

/// Value on the next non-empty line under `label`, taken from the same
/// tab-separated column when the lines are columnar.
pub fn value_below_label(pages: &[Vec<String>], label: &str) -> Result<String, LookupError> {
    let mut seen = false;
    for lines in pages {
        for (i, line) in lines.iter().enumerate() {
            let Some((start, _)) = find_label_span(line, label) else {
                continue;
            };
            seen = true;
            let column = line[..start].matches('\t').count();
            let Some(next) = lines[i + 1..].iter().find(|l| !l.trim().is_empty()) else {
                continue;
            };
            let cells: Vec<&str> = next.split('\t').collect();
            let value = if cells.len() > column {
                cells[column].trim()
            } else {
                next.trim()
            };
            if !value.is_empty() {
                return Ok(value.to_string());
            }
        }
    }
    Err(if seen {
        LookupError::NoAlignedValue(label.to_string())
    } else {
        LookupError::LabelNotFound(label.to_string())
    })
}

/// First capture group (or the whole match) of `re`, pages in order.
pub fn first_capture(pages: &[Vec<String>], re: &Regex) -> Option<String> {
    pages.iter().find_map(|lines| {
        let text = lines.join("\n");
        let caps = re.captures(&text)?;
        let m = caps.get(1).or_else(|| caps.get(0))?;
        let value = m.as_str().trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// First match of `find` over whole pages.
pub fn first_in_pages(pages: &[Vec<String>], find: impl Fn(&str) -> Option<&str>) -> Option<String> {
    pages.iter().find_map(|lines| find(&lines.join("\n")).map(str::to_string))
}

/// Column `column_index` of the line after the anchor line.
pub fn table_row_after_anchor(
    pages: &[Vec<String>],
    anchor: &str,
    column_index: usize,
) -> Result<String, LookupError> {
    let mut seen = false;
    for lines in pages {
        for (i, line) in lines.iter().enumerate() {
            if find_label_span(line, anchor).is_none() {
                continue;
            }
            seen = true;
            let Some(row) = lines[i + 1..].iter().find(|l| !l.trim().is_empty()) else {
                continue;
            };
            let value = split_columns(row).get(column_index).copied().unwrap_or("");
            if !value.is_empty() {
                return Ok(value.to_string());
            }
        }
    }
    Err(if seen {
        LookupError::TableRowNotFound(anchor.to_string())
    } else {
        LookupError::LabelNotFound(anchor.to_string())
    })
}

fn split_columns(row: &str) -> Vec<&str> {
    let separator = if row.contains('\t') { "\t" } else { "  " };
    row.split(separator)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}

/// `text` up to the earliest stop label, and whether one was found.
fn cut_at_stop<'a>(text: &'a str, stops: &[&str]) -> (&'a str, bool) {
    match stops
        .iter()
        .filter_map(|label| find_label_span(text, label))
        .map(|(start, _)| start)
        .min()
    {
        Some(start) => (text[..start].trim(), true),
        None => (text.trim(), false),
    }
}

/// Text from `start_label` up to the next stop label, wherever it sits on a
/// line, or the page end. Lines are joined with `\n`.
pub fn multiline_after_label(
    pages: &[Vec<String>],
    start_label: &str,
    stop_labels: &[&str],
) -> Result<String, LookupError> {
    let start_key = label_key(start_label);
    let stops: Vec<&str> = stop_labels
        .iter()
        .copied()
        .filter(|l| label_key(l) != start_key)
        .collect();

    for lines in pages {
        for (i, line) in lines.iter().enumerate() {
            let Some((_, end)) = find_label_span(line, start_label) else {
                continue;
            };
            let mut parts: Vec<&str> = Vec::new();
            let (first, mut stopped) = cut_at_stop(after_label(line, end), &stops);
            if !first.is_empty() {
                parts.push(first);
            }
            for next in &lines[i + 1..] {
                if stopped {
                    break;
                }
                let (text, hit) = cut_at_stop(next, &stops);
                if !text.is_empty() {
                    parts.push(text);
                }
                stopped = hit;
            }
            if parts.is_empty() {
                return Err(LookupError::NoAlignedValue(start_label.to_string()));
            }
            return Ok(parts.join("\n"));
        }
    }
    Err(LookupError::LabelNotFound(start_label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(lines: &[&str]) -> Vec<Vec<String>> {
        vec![lines.iter().map(|l| l.to_string()).collect()]
    }

    #[test]
    fn test_value_after_label_stops_at_delimiter() {
        let pages = page(&["项目名称: 办公楼改造\t预算金额: 120万元", "采购人：市一中 | 联系人 王"]);
        assert_eq!(value_after_label(&pages, "项目名称").unwrap(), "办公楼改造");
        assert_eq!(value_after_label(&pages, "预算金额").unwrap(), "120万元");
        assert_eq!(value_after_label(&pages, "采购人").unwrap(), "市一中");
        assert_eq!(
            value_after_label(&pages, "开标时间"),
            Err(LookupError::LabelNotFound("开标时间".to_string()))
        );
    }

    #[test]
    fn test_value_below_label_keeps_column() {
        let pages = page(&["供应商名称\t中标金额", "", "某某建设有限公司\t1,280,000.00元"]);
        assert_eq!(value_below_label(&pages, "中标金额").unwrap(), "1,280,000.00元");
        assert_eq!(value_below_label(&pages, "供应商名称").unwrap(), "某某建设有限公司");
    }

    #[test]
    fn test_label_without_value() {
        let pages = page(&["备注:"]);
        assert_eq!(
            value_after_label(&pages, "备注"),
            Err(LookupError::NoAlignedValue("备注".to_string()))
        );
    }

    #[test]
    fn test_first_capture() {
        let pages = page(&["公告编号: ZB-2025-0031"]);
        let re = Regex::new(r"公告编号:\s*([A-Z]+-\d{4}-\d+)").unwrap();
        assert_eq!(first_capture(&pages, &re), Some("ZB-2025-0031".to_string()));
        let whole = Regex::new(r"ZB-\d{4}").unwrap();
        assert_eq!(first_capture(&pages, &whole), Some("ZB-2025".to_string()));
    }

    #[test]
    fn test_table_row_after_anchor() {
        let pages = page(&["序号\t中标供应商\t中标金额", "1\t某某建设\t560元"]);
        assert_eq!(table_row_after_anchor(&pages, "中标供应商", 1).unwrap(), "某某建设");
        assert!(table_row_after_anchor(&pages, "中标供应商", 5).is_err());
    }

    #[test]
    fn test_multiline_stops_at_next_label() {
        let pages = page(&[
            "项目概况: 本项目为办公楼",
            "外立面及内部改造,",
            "工期90天。",
            "预算金额: 120万元",
        ]);
        let value = multiline_after_label(&pages, "项目概况", &["项目概况", "预算金额"]).unwrap();
        assert_eq!(value, "本项目为办公楼\n外立面及内部改造,\n工期90天。");
    }

    #[test]
    fn test_multiline_stops_at_label_on_same_row() {
        let pages = page(&["项目概况: 办公楼改造\t预算金额: 120万元", "工期90天。"]);
        let value = multiline_after_label(&pages, "项目概况", &["项目概况", "预算金额"]).unwrap();
        assert_eq!(value, "办公楼改造");

        let pages = page(&["项目概况:", "办公楼改造 工期90天。 预算金额: 120万元", "其他"]);
        let value = multiline_after_label(&pages, "项目概况", &["预算金额"]).unwrap();
        assert_eq!(value, "办公楼改造 工期90天。");
    }
}
