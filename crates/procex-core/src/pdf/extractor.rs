//! Positioned text extraction using lopdf, with pdf-extract as plain-text fallback.

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, trace, warn};

use super::{BBox, DocumentGeometry, GeometrySource, PageGeometry, Result, TextFragment};
use crate::error::DocumentError;

/// Fallback page size (A4) when a page has no usable MediaBox.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 595.0, 842.0];

/// TJ adjustments wider than this (thousandths of an em) split a fragment.
const TJ_SPLIT_THRESHOLD: f64 = 500.0;

/// Share of the font size above the baseline.
const ASCENT: f64 = 0.8;
/// Share of the font size below the baseline.
const DESCENT: f64 = 0.2;

type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn translate(m: &Matrix, tx: f64, ty: f64) -> Matrix {
    [
        m[0],
        m[1],
        m[2],
        m[3],
        tx * m[0] + ty * m[2] + m[4],
        tx * m[1] + ty * m[3] + m[5],
    ]
}

/// PDF loaded for geometry extraction.
pub struct PdfExtractor {
    document: Document,
    raw_data: Vec<u8>,
    source: String,
}

impl PdfExtractor {
    /// Open a PDF file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| DocumentError::Unreadable(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&data, path.display().to_string())
    }

    /// Load a PDF from memory.
    pub fn from_bytes(data: &[u8], source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let mut document = Document::load_mem(data)
            .map_err(|e| DocumentError::Unreadable(format!("{}: {}", source, e)))?;

        let raw_data = if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(DocumentError::Encrypted);
            }
            debug!("Decrypted {} with empty password", source);

            // pdf-extract needs the decrypted bytes
            let mut decrypted = Vec::new();
            document
                .save_to(&mut decrypted)
                .map_err(|e| DocumentError::Unreadable(format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        let page_count = document.get_pages().len();
        if page_count == 0 {
            return Err(DocumentError::Empty);
        }

        debug!("Loaded {} with {} pages", source, page_count);
        Ok(Self {
            document,
            raw_data,
            source,
        })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Walk every page content stream and collect positioned fragments.
    ///
    /// Pages whose content cannot be decoded are kept empty; the document is
    /// only unreadable as a whole when it cannot be loaded at all.
    pub fn extract_geometry(&self) -> DocumentGeometry {
        let mut pages = Vec::new();

        for (index, (page_number, page_id)) in self.document.get_pages().into_iter().enumerate() {
            let media_box = self.media_box(page_id);
            let fragments = match self.page_fragments(page_id, index, &media_box) {
                Ok(fragments) => fragments,
                Err(reason) => {
                    warn!("Page {} of {}: {}", page_number, self.source, reason);
                    Vec::new()
                }
            };
            trace!("Page {}: {} fragments", page_number, fragments.len());
            pages.push(PageGeometry {
                index,
                width: media_box[2] - media_box[0],
                height: media_box[3] - media_box[1],
                fragments,
            });
        }

        let mut geometry = DocumentGeometry {
            source: self.source.clone(),
            pages,
            fallback_text: None,
        };

        if geometry.fragment_count() == 0 {
            match self.extract_plain_text() {
                Ok(text) if !text.trim().is_empty() => {
                    debug!("{}: no positioned text, using plain-text fallback", self.source);
                    geometry.fallback_text = Some(text);
                }
                Ok(_) => debug!("{}: no text layer", self.source),
                Err(e) => warn!("{}: plain-text fallback failed: {}", self.source, e),
            }
        }

        geometry
    }

    /// Plain text of the whole document via pdf-extract.
    pub fn extract_plain_text(&self) -> Result<String> {
        pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| DocumentError::Unreadable(format!("text extraction failed: {}", e)))
    }

    fn media_box(&self, page_id: ObjectId) -> [f64; 4] {
        self.inherited_attribute(page_id, b"MediaBox")
            .and_then(|obj| {
                let values: Vec<f64> = obj
                    .as_array()
                    .ok()?
                    .iter()
                    .filter_map(|o| number(self.deref(o)))
                    .collect();
                (values.len() == 4).then(|| {
                    [
                        values[0].min(values[2]),
                        values[1].min(values[3]),
                        values[0].max(values[2]),
                        values[1].max(values[3]),
                    ]
                })
            })
            .unwrap_or(DEFAULT_MEDIA_BOX)
    }

    /// Look up a page attribute, walking up the page tree.
    fn inherited_attribute(&self, node_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let dict = self.document.get_object(node_id).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(self.deref(value));
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.inherited_attribute(*parent_id, key),
            _ => None,
        }
    }

    fn deref<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match self.document.dereference(obj) {
            Ok((_, resolved)) => resolved,
            Err(_) => obj,
        }
    }

    fn page_fragments(
        &self,
        page_id: ObjectId,
        page_index: usize,
        media_box: &[f64; 4],
    ) -> std::result::Result<Vec<TextFragment>, String> {
        let fonts = self.document.get_page_fonts(page_id).unwrap_or_default();
        let data = self
            .document
            .get_page_content(page_id)
            .map_err(|e| format!("no content: {}", e))?;
        let content = Content::decode(&data).map_err(|e| format!("undecodable content: {}", e))?;

        let mut walker = PageWalker::new(self, &fonts, page_index, *media_box);
        for op in &content.operations {
            walker.apply(op.operator.as_str(), &op.operands);
        }
        Ok(walker.fragments)
    }
}

impl GeometrySource for PdfExtractor {
    fn source_name(&self) -> String {
        self.source.clone()
    }

    fn load_geometry(&self) -> Result<DocumentGeometry> {
        Ok(self.extract_geometry())
    }
}

impl GeometrySource for Path {
    fn source_name(&self) -> String {
        self.display().to_string()
    }

    fn load_geometry(&self) -> Result<DocumentGeometry> {
        PdfExtractor::open(self).map(|pdf| pdf.extract_geometry())
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Text state tracked while walking one content stream.
struct PageWalker<'a> {
    pdf: &'a PdfExtractor,
    fonts: &'a BTreeMap<Vec<u8>, &'a Dictionary>,
    page_index: usize,
    media_box: [f64; 4],
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font: Vec<u8>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    fragments: Vec<TextFragment>,
}

impl<'a> PageWalker<'a> {
    fn new(
        pdf: &'a PdfExtractor,
        fonts: &'a BTreeMap<Vec<u8>, &'a Dictionary>,
        page_index: usize,
        media_box: [f64; 4],
    ) -> Self {
        Self {
            pdf,
            fonts,
            page_index,
            media_box,
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            font: Vec::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            fragments: Vec::new(),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        let num = |i: usize| operands.get(i).and_then(number);
        match operator {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.ctm_stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if operands.len() >= 6 {
                    let mut m = IDENTITY;
                    for (i, slot) in m.iter_mut().enumerate() {
                        *slot = num(i).unwrap_or(IDENTITY[i]);
                    }
                    self.ctm = multiply(&m, &self.ctm);
                }
            }
            "BT" => {
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let Some(Ok(name)) = operands.first().map(|o| o.as_name()) {
                    self.font = name.to_vec();
                }
                if let Some(size) = num(1) {
                    self.font_size = size;
                }
            }
            "Tc" => self.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => self.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => self.horizontal_scale = num(0).unwrap_or(100.0) / 100.0,
            "TL" => self.leading = num(0).unwrap_or(0.0),
            "Td" | "TD" => {
                let tx = num(0).unwrap_or(0.0);
                let ty = num(1).unwrap_or(0.0);
                if operator == "TD" {
                    self.leading = -ty;
                }
                self.line_matrix = translate(&self.line_matrix, tx, ty);
                self.text_matrix = self.line_matrix;
            }
            "Tm" => {
                if operands.len() >= 6 {
                    for i in 0..6 {
                        self.text_matrix[i] = num(i).unwrap_or(IDENTITY[i]);
                    }
                    self.line_matrix = self.text_matrix;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                self.word_spacing = num(0).unwrap_or(self.word_spacing);
                self.char_spacing = num(1).unwrap_or(self.char_spacing);
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Ok(items)) = operands.first().map(|o| o.as_array()) {
                    self.show_array(items);
                }
            }
            _ => {}
        }
    }

    fn next_line(&mut self) {
        self.line_matrix = translate(&self.line_matrix, 0.0, -self.leading);
        self.text_matrix = self.line_matrix;
    }

    fn show(&mut self, bytes: &[u8]) {
        let origin = self.text_matrix;
        let text = self.decode(bytes);
        let advance = self.advance(bytes, &text);
        self.text_matrix = translate(&self.text_matrix, advance, 0.0);
        self.push_fragment(&origin, text, advance);
    }

    fn show_array(&mut self, items: &[Object]) {
        let mut origin = self.text_matrix;
        let mut text = String::new();
        let mut run_advance = 0.0;

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    let decoded = self.decode(bytes);
                    let advance = self.advance(bytes, &decoded);
                    self.text_matrix = translate(&self.text_matrix, advance, 0.0);
                    run_advance += advance;
                    text.push_str(&decoded);
                }
                other => {
                    let Some(adjust) = number(other) else { continue };
                    let shift = -adjust / 1000.0 * self.font_size * self.horizontal_scale;
                    self.text_matrix = translate(&self.text_matrix, shift, 0.0);
                    if adjust < -TJ_SPLIT_THRESHOLD {
                        let finished = std::mem::take(&mut text);
                        self.push_fragment(&origin, finished, run_advance);
                        origin = self.text_matrix;
                        run_advance = 0.0;
                    } else {
                        run_advance += shift;
                    }
                }
            }
        }
        self.push_fragment(&origin, text, run_advance);
    }

    /// Record a fragment starting at `origin` (text space) spanning `advance`.
    fn push_fragment(&mut self, origin: &Matrix, text: String, advance: f64) {
        if text.trim().is_empty() {
            return;
        }
        let m = multiply(origin, &self.ctm);
        let scale_x = (m[0] * m[0] + m[1] * m[1]).sqrt();
        let scale_y = (m[2] * m[2] + m[3] * m[3]).sqrt();
        let size = self.font_size * scale_y;
        let width = advance * scale_x;

        let [llx, _, _, ury] = self.media_box;
        let x0 = m[4] - llx;
        let baseline = ury - m[5];
        let bbox = BBox::new(
            x0,
            baseline - size * ASCENT,
            x0 + width.max(0.0),
            baseline + size * DESCENT,
        );
        trace!("fragment {:?} at {:?}", text, bbox);

        self.fragments.push(TextFragment::new(text.trim(), self.page_index, bbox));
    }

    fn current_font(&self) -> Option<&'a Dictionary> {
        self.fonts.get(&self.font).copied()
    }

    fn decode(&self, bytes: &[u8]) -> String {
        if let Some(font) = self.current_font() {
            if let Ok(encoding) = font.get_font_encoding(&self.pdf.document) {
                if let Ok(text) = Document::decode_text(&encoding, bytes) {
                    return text;
                }
            }
        }

        if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            let utf16: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                .collect();
            return String::from_utf16_lossy(&utf16);
        }

        bytes.iter().map(|&b| b as char).collect()
    }

    /// Horizontal advance of a shown string in unscaled text space.
    fn advance(&self, bytes: &[u8], decoded: &str) -> f64 {
        let glyph_widths = self
            .current_font()
            .and_then(|font| self.simple_font_widths(font, bytes));

        let (glyphs, em_total) = match glyph_widths {
            Some(widths) => (bytes.len(), widths),
            None => {
                let ems: f64 = decoded.chars().map(|c| if is_wide(c) { 1.0 } else { 0.5 }).sum();
                (decoded.chars().count(), ems)
            }
        };
        let spaces = decoded.chars().filter(|&c| c == ' ').count();

        (em_total * self.font_size
            + glyphs as f64 * self.char_spacing
            + spaces as f64 * self.word_spacing)
            * self.horizontal_scale
    }

    /// Sum of glyph widths in ems, for single-byte fonts that carry `/Widths`.
    fn simple_font_widths(&self, font: &Dictionary, bytes: &[u8]) -> Option<f64> {
        if matches!(font.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Type0") {
            return None;
        }
        let first_char = number(self.pdf.deref(font.get(b"FirstChar").ok()?))? as usize;
        let widths = self.pdf.deref(font.get(b"Widths").ok()?).as_array().ok()?;
        let total: f64 = bytes
            .iter()
            .map(|&b| {
                (b as usize)
                    .checked_sub(first_char)
                    .and_then(|i| widths.get(i))
                    .and_then(|w| number(self.pdf.deref(w)))
                    .unwrap_or(500.0)
                    / 1000.0
            })
            .sum();
        Some(total)
    }
}

/// CJK and full-width glyphs take a full em.
fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x3FFFD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_are_unreadable() {
        let result = PdfExtractor::from_bytes(b"not a pdf at all", "junk.pdf");
        assert!(matches!(result, Err(DocumentError::Unreadable(_))));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let result = PdfExtractor::open(Path::new("/nonexistent/request.pdf"));
        assert!(matches!(result, Err(DocumentError::Unreadable(_))));
    }

    #[test]
    fn test_matrix_translate_follows_scale() {
        let m = [2.0, 0.0, 0.0, 2.0, 10.0, 20.0];
        assert_eq!(translate(&m, 5.0, 1.0), [2.0, 0.0, 0.0, 2.0, 20.0, 22.0]);
        assert_eq!(multiply(&IDENTITY, &m), m);
    }

    #[test]
    fn test_wide_glyphs() {
        assert!(is_wide('项'));
        assert!(is_wide('：'));
        assert!(!is_wide('A'));
    }
}
