//! Geometry extraction from PDFs generated with lopdf.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use procex_core::{
    ConfigStore, DocumentError, DocumentInput, FieldCatalogue, FieldStatus, FieldValue,
    GeometrySource, PdfExtractor, Pipeline, ProcexConfig,
};
use rust_decimal::Decimal;
use std::str::FromStr;

fn text_at(x: i64, y: i64, size: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// One A4 page with a Courier font and the given operations.
fn build_document(operations: Vec<Operation>) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn build_pdf(operations: Vec<Operation>) -> Vec<u8> {
    save(build_document(operations))
}

fn notice_pdf() -> Vec<u8> {
    let mut ops = text_at(100, 780, 16, "Tender Notice");
    ops.extend(text_at(100, 700, 12, "Budget"));
    ops.extend(text_at(200, 700, 12, "1,280.50"));
    ops.extend(text_at(100, 680, 12, "Buyer"));
    ops.extend(text_at(200, 680, 12, "City Library"));
    build_pdf(ops)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn test_fragments_are_positioned_top_left() {
    let pdf = PdfExtractor::from_bytes(&notice_pdf(), "notice.pdf").unwrap();
    assert_eq!(pdf.page_count(), 1);

    let geometry = pdf.extract_geometry();
    assert_eq!(geometry.pages.len(), 1);
    assert!(approx(geometry.pages[0].width, 595.0));
    assert!(approx(geometry.pages[0].height, 842.0));

    let texts: Vec<&str> = geometry.pages[0]
        .fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect();
    assert_eq!(texts, vec!["Tender Notice", "Budget", "1,280.50", "Buyer", "City Library"]);

    // Baseline at 842 - 700 = 142; 12pt font spans 9.6 above and 2.4 below.
    let budget = &geometry.pages[0].fragments[1];
    assert!(approx(budget.bbox.x0, 100.0));
    assert!(approx(budget.bbox.y0, 142.0 - 9.6));
    assert!(approx(budget.bbox.y1, 142.0 + 2.4));
    assert!(budget.bbox.x1 > budget.bbox.x0);
    assert!(budget.bbox.x1 < 200.0);
}

#[test]
fn test_path_source_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notice.pdf");
    std::fs::write(&path, notice_pdf()).unwrap();

    let geometry = path.as_path().load_geometry().unwrap();
    assert_eq!(geometry.fragment_count(), 5);
    assert!(geometry.source.ends_with("notice.pdf"));
}

#[test]
fn test_pdf_bytes_through_pipeline() {
    let catalogue = FieldCatalogue::from_json_str(
        r#"{
            "signatures": [{"doc_type": "notice", "patterns": ["Tender Notice"]}],
            "fields": [
                {"name": "budget", "type": "decimal", "source": "notice",
                 "method": {"kind": "amount", "key_text": "Budget"}},
                {"name": "buyer", "type": "text", "source": "notice",
                 "method": {"kind": "horizontal_keyvalue", "key_text": "Buyer"}}
            ]
        }"#,
    )
    .unwrap();
    let pipeline = Pipeline::from_store(&ConfigStore::new(ProcexConfig::default(), catalogue));

    let report = pipeline.process(&DocumentInput::from_bytes("notice.pdf", notice_pdf()));

    assert!(report.skipped.is_none());
    let budget = report.outcome("budget").unwrap();
    assert_eq!(budget.status, FieldStatus::Extracted);
    assert_eq!(
        budget.value,
        Some(FieldValue::Decimal(Decimal::from_str("1280.50").unwrap()))
    );
    assert_eq!(
        report.outcome("buyer").unwrap().value,
        Some(FieldValue::Text("City Library".to_string()))
    );
}

#[test]
fn test_unsupported_encryption_is_reported() {
    let mut doc = build_document(text_at(100, 700, 12, "Budget"));
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 5,
        "R" => 6,
        "O" => Object::string_literal(vec![0u8; 48]),
        "U" => Object::string_literal(vec![0u8; 48]),
        "P" => -4,
    });
    doc.trailer.set("Encrypt", encrypt_id);

    let result = PdfExtractor::from_bytes(&save(doc), "locked.pdf");
    assert!(matches!(result, Err(DocumentError::Encrypted)));
}
