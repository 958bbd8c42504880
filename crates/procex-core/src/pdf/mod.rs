//! PDF geometry extraction.
//!
//! Turns a document into positioned text fragments per page. Everything
//! downstream (cells, classification, text fallbacks) works on
//! [`DocumentGeometry`], so callers that already hold geometry can skip the
//! PDF layer entirely.

mod extractor;

pub use extractor::PdfExtractor;

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Axis-aligned box in PDF points, top-left origin (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Center point `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Length of the vertical overlap with another box (0 when disjoint).
    pub fn vertical_overlap(&self, other: &BBox) -> f64 {
        (self.y1.min(other.y1) - self.y0.max(other.y0)).max(0.0)
    }
}

/// A run of text with its position, as emitted by the content stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// Page index (0-based).
    pub page: usize,
    pub bbox: BBox,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, page: usize, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            page,
            bbox,
        }
    }
}

/// Fragments of a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Page index (0-based).
    pub index: usize,
    pub width: f64,
    pub height: f64,
    pub fragments: Vec<TextFragment>,
}

/// Positioned text of a whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentGeometry {
    /// Display identity of the document (path or caller-supplied name).
    pub source: String,
    pub pages: Vec<PageGeometry>,
    /// Plain text used when no page produced positioned fragments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_text: Option<String>,
}

impl DocumentGeometry {
    /// Build geometry from fragments, grouping them by page.
    pub fn from_fragments(
        source: impl Into<String>,
        page_size: (f64, f64),
        fragments: Vec<TextFragment>,
    ) -> Self {
        let page_count = fragments.iter().map(|f| f.page + 1).max().unwrap_or(1);
        let mut pages: Vec<PageGeometry> = (0..page_count)
            .map(|index| PageGeometry {
                index,
                width: page_size.0,
                height: page_size.1,
                fragments: Vec::new(),
            })
            .collect();
        for fragment in fragments {
            let page = fragment.page;
            pages[page].fragments.push(fragment);
        }
        Self {
            source: source.into(),
            pages,
            fallback_text: None,
        }
    }

    pub fn fragment_count(&self) -> usize {
        self.pages.iter().map(|p| p.fragments.len()).sum()
    }

    /// True when neither positioned nor fallback text is available.
    pub fn is_blank(&self) -> bool {
        self.fragment_count() == 0
            && self.fallback_text.as_deref().is_none_or(|t| t.trim().is_empty())
    }
}

/// Anything that can produce document geometry.
pub trait GeometrySource {
    /// Display identity used in reports and logs.
    fn source_name(&self) -> String;

    /// Produce positioned text for every page.
    fn load_geometry(&self) -> Result<DocumentGeometry>;
}

impl GeometrySource for DocumentGeometry {
    fn source_name(&self) -> String {
        self.source.clone()
    }

    fn load_geometry(&self) -> Result<DocumentGeometry> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_center_and_union() {
        let a = BBox::new(10.0, 20.0, 30.0, 40.0);
        let b = BBox::new(5.0, 25.0, 35.0, 45.0);
        assert_eq!(a.center(), (20.0, 30.0));
        assert_eq!(a.union(&b), BBox::new(5.0, 20.0, 35.0, 45.0));
        assert_eq!(a.vertical_overlap(&b), 15.0);
    }

    #[test]
    fn test_from_fragments_groups_pages() {
        let geometry = DocumentGeometry::from_fragments(
            "memo",
            (595.0, 842.0),
            vec![
                TextFragment::new("a", 0, BBox::new(0.0, 0.0, 5.0, 5.0)),
                TextFragment::new("b", 2, BBox::new(0.0, 0.0, 5.0, 5.0)),
            ],
        );
        assert_eq!(geometry.pages.len(), 3);
        assert_eq!(geometry.pages[1].fragments.len(), 0);
        assert_eq!(geometry.fragment_count(), 2);
        assert!(!geometry.is_blank());
    }
}
