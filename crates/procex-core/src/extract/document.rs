//! A document ready for extraction, with lazily built cells.

use std::sync::OnceLock;

use crate::layout::CellSet;
use crate::models::config::LayoutConfig;
use crate::normalize::text::fold_width;
use crate::pdf::DocumentGeometry;

/// Geometry plus caches shared by every field of one extraction run.
///
/// Cells and page lines are built on first use and never rebuilt; a new
/// run over the same file gets a new `PreparedDocument`.
#[derive(Debug)]
pub struct PreparedDocument {
    geometry: DocumentGeometry,
    settings: LayoutConfig,
    cells: OnceLock<CellSet>,
    lines: OnceLock<Vec<Vec<String>>>,
}

impl PreparedDocument {
    pub fn new(geometry: DocumentGeometry, settings: &LayoutConfig) -> Self {
        Self {
            geometry,
            settings: settings.clone(),
            cells: OnceLock::new(),
            lines: OnceLock::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.geometry.source
    }

    pub fn geometry(&self) -> &DocumentGeometry {
        &self.geometry
    }

    pub fn cells(&self) -> &CellSet {
        self.cells
            .get_or_init(|| CellSet::build(&self.geometry, &self.settings))
    }

    /// Reading-order lines per page. Documents without positioned text use
    /// the plain-text fallback as a single page.
    pub fn page_lines(&self) -> &[Vec<String>] {
        self.lines.get_or_init(|| {
            if self.geometry.fragment_count() > 0 {
                let cells = self.cells();
                (0..cells.page_count()).map(|p| cells.page_lines(p)).collect()
            } else {
                let text = self.geometry.fallback_text.as_deref().unwrap_or_default();
                vec![
                    text.lines()
                        .map(|l| fold_width(l.trim_end()))
                        .filter(|l| !l.trim().is_empty())
                        .collect(),
                ]
            }
        })
    }

    /// Text of the first `max_pages` pages (0 = all), one line per row.
    pub fn text(&self, max_pages: usize) -> String {
        let pages = self.page_lines();
        let take = if max_pages == 0 { pages.len() } else { max_pages };
        pages
            .iter()
            .take(take)
            .map(|lines| lines.join("\n"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{BBox, TextFragment};

    #[test]
    fn test_fallback_text_used_without_fragments() {
        let geometry = DocumentGeometry {
            source: "plain".to_string(),
            pages: Vec::new(),
            fallback_text: Some("采购公告\n\n项目名称：教学楼维修\n".to_string()),
        };
        let doc = PreparedDocument::new(geometry, &LayoutConfig::default());
        assert_eq!(doc.page_lines(), &[vec!["采购公告".to_string(), "项目名称:教学楼维修".to_string()]]);
        assert!(doc.cells().is_empty());
    }

    #[test]
    fn test_text_limits_pages() {
        let geometry = DocumentGeometry::from_fragments(
            "two",
            (595.0, 842.0),
            vec![
                TextFragment::new("first", 0, BBox::new(10.0, 10.0, 40.0, 20.0)),
                TextFragment::new("second", 1, BBox::new(10.0, 10.0, 40.0, 20.0)),
            ],
        );
        let doc = PreparedDocument::new(geometry, &LayoutConfig::default());
        assert_eq!(doc.text(1), "first");
        assert_eq!(doc.text(0), "first\nsecond");
    }
}
