//! Field extraction engine.
//!
//! Each catalogue field runs its primary method and then its fallbacks
//! until one yields a raw value. Key/value methods try a spatial cell
//! lookup before a linear match over page text. Misses are recorded on the
//! outcome; a normalizer rejection keeps the raw value for audit.

mod document;
mod engine;
pub mod patterns;
mod text;

pub use document::PreparedDocument;
pub use engine::FieldExtractor;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldCatalogue;
    use crate::models::config::{LayoutConfig, NormalizeConfig};
    use crate::models::record::{FieldStatus, FieldValue, MethodKind, Strategy};
    use crate::pdf::{BBox, DocumentGeometry, TextFragment};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn frag(text: &str, x0: f64, y0: f64, x1: f64) -> TextFragment {
        TextFragment::new(text, 0, BBox::new(x0, y0, x1, y0 + 10.0))
    }

    fn notice() -> DocumentGeometry {
        DocumentGeometry::from_fragments(
            "notice.pdf",
            (595.0, 842.0),
            vec![
                frag("采购公告", 250.0, 40.0, 330.0),
                frag("项目名称", 50.0, 100.0, 90.0),
                // Value sits 1pt lower than its label.
                frag("教学楼维修工程", 120.0, 101.0, 200.0),
                frag("预算金额", 50.0, 120.0, 90.0),
                frag("38.33万元", 120.0, 120.0, 165.0),
                frag("发布日期：2025年1月15日", 50.0, 140.0, 170.0),
                frag("采购方式", 50.0, 160.0, 90.0),
                frag("单一来源", 120.0, 160.0, 160.0),
            ],
        )
    }

    const CATALOGUE: &str = r#"{
        "signatures": [{"doc_type": "notice", "patterns": ["采购公告"]}],
        "fields": [
            {"name": "project_name", "type": "text", "source": "notice",
             "method": {"kind": "horizontal_keyvalue", "key_text": "项目名称"}},
            {"name": "budget", "type": "decimal", "source": "notice",
             "method": {"kind": "amount", "key_text": "预算金额"},
             "rules": {"unit_multiplier": 10000}},
            {"name": "published", "type": "date", "source": "notice",
             "method": {"kind": "date", "key_text": "发布日期"}},
            {"name": "procurement_method", "type": "choice", "source": "notice",
             "method": {"kind": "horizontal_keyvalue", "key_text": "采购方式"},
             "rules": {"choices": ["公开招标", "竞争性磋商"]}},
            {"name": "contact", "type": "text", "source": "notice",
             "method": {"kind": "horizontal_keyvalue", "key_text": "联系人"},
             "fallback": [{"kind": "regex", "pattern": "联系人[:：]\\s*(\\S+)"}]},
            {"name": "agency", "type": "text", "source": "any",
             "method": {"kind": "fixed_value", "value": "市政府采购中心"}}
        ]
    }"#;

    fn run(settings: LayoutConfig) -> Vec<crate::models::record::ExtractionOutcome> {
        let catalogue = FieldCatalogue::from_json_str(CATALOGUE).unwrap();
        let normalize = NormalizeConfig::default();
        let doc = PreparedDocument::new(notice(), &settings);
        FieldExtractor::new(&catalogue, &normalize).extract_all(&doc, Some("notice"))
    }

    #[test]
    fn test_spatial_lookup_and_normalization() {
        let outcomes = run(LayoutConfig::default());
        assert_eq!(outcomes.len(), 6);

        assert_eq!(outcomes[0].value, Some(FieldValue::Text("教学楼维修工程".to_string())));
        assert_eq!(outcomes[0].method.unwrap().strategy, Strategy::Spatial);

        assert_eq!(
            outcomes[1].value,
            Some(FieldValue::Decimal(Decimal::from_str("383300.00").unwrap()))
        );
        assert_eq!(outcomes[1].raw.as_deref(), Some("38.33万元"));

        assert_eq!(outcomes[2].value.as_ref().unwrap().to_string(), "2025-01-15");
    }

    #[test]
    fn test_unmapped_choice_is_validation_failed() {
        let outcomes = run(LayoutConfig::default());
        let method = &outcomes[3];
        assert_eq!(method.status, FieldStatus::ValidationFailed);
        assert_eq!(method.raw.as_deref(), Some("单一来源"));
        assert!(method.error.as_deref().unwrap().contains("unknown choice"));
    }

    #[test]
    fn test_all_methods_missing_is_not_found() {
        let outcomes = run(LayoutConfig::default());
        let contact = &outcomes[4];
        assert_eq!(contact.status, FieldStatus::NotFound);
        let kinds: Vec<(MethodKind, Strategy)> =
            contact.misses.iter().map(|m| (m.kind, m.strategy)).collect();
        assert_eq!(
            kinds,
            vec![
                (MethodKind::HorizontalKeyvalue, Strategy::Spatial),
                (MethodKind::HorizontalKeyvalue, Strategy::Text),
                (MethodKind::Regex, Strategy::Text),
            ]
        );
    }

    #[test]
    fn test_fixed_value_always_extracted() {
        let outcomes = run(LayoutConfig::default());
        assert_eq!(outcomes[5].status, FieldStatus::Extracted);
        assert_eq!(outcomes[5].value, Some(FieldValue::Text("市政府采购中心".to_string())));
        assert_eq!(outcomes[5].method.unwrap().strategy, Strategy::Direct);
    }

    #[test]
    fn test_zero_row_tolerance_falls_back_to_text() {
        let settings = LayoutConfig {
            tolerance_y: 0.0,
            ..LayoutConfig::default()
        };
        let outcomes = run(settings);
        let project = &outcomes[0];
        assert_eq!(project.status, FieldStatus::Extracted);
        assert_eq!(project.value, Some(FieldValue::Text("教学楼维修工程".to_string())));
        assert_eq!(project.method.unwrap().strategy, Strategy::Text);
        assert_eq!(project.misses[0].strategy, Strategy::Spatial);
    }

    #[test]
    fn test_rerun_is_identical() {
        assert_eq!(run(LayoutConfig::default()), run(LayoutConfig::default()));
    }
}
