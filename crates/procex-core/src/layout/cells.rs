//! Cells: fragments coalesced into atomic label/value units.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::index::SpatialIndex;
use crate::models::config::LayoutConfig;
use crate::normalize::text::{fold_width, label_key};
use crate::pdf::{BBox, DocumentGeometry, TextFragment};

/// Stable index of a cell inside its [`CellSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub usize);

/// One fragment or a run of adjacent same-line fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub id: CellId,
    /// Page index (0-based).
    pub page: usize,
    pub text: String,
    /// `text` folded for label comparison.
    pub label_key: String,
    pub bbox: BBox,
}

impl Cell {
    pub fn center(&self) -> (f64, f64) {
        self.bbox.center()
    }
}

/// A reading-order row of cells on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub page: usize,
    /// Cells left to right.
    pub cells: Vec<CellId>,
    pub bbox: BBox,
}

/// Cells of one document plus the structures built over them.
///
/// Ids are assigned in reading order (page, row, x), so comparing ids
/// compares reading position.
#[derive(Debug, Clone)]
pub struct CellSet {
    cells: Vec<Cell>,
    lines: Vec<Vec<Line>>,
    index: SpatialIndex,
    settings: LayoutConfig,
}

impl CellSet {
    /// Detect cells and rows on every page and index them.
    pub fn build(geometry: &DocumentGeometry, settings: &LayoutConfig) -> Self {
        let mut cells: Vec<Cell> = Vec::new();
        let mut lines: Vec<Vec<Line>> = Vec::with_capacity(geometry.pages.len());

        for page in &geometry.pages {
            let mut page_lines = Vec::new();
            for row in group_rows(&page.fragments, settings.line_tolerance) {
                let mut ids = Vec::new();
                for (text, bbox) in coalesce_row(&row, settings.coalesce_gap) {
                    let id = CellId(cells.len());
                    cells.push(Cell {
                        id,
                        page: page.index,
                        label_key: label_key(&text),
                        text,
                        bbox,
                    });
                    ids.push(id);
                }
                let bbox = ids
                    .iter()
                    .map(|id| cells[id.0].bbox)
                    .reduce(|a, b| a.union(&b));
                if let Some(bbox) = bbox {
                    page_lines.push(Line {
                        page: page.index,
                        cells: ids,
                        bbox,
                    });
                }
            }
            trace!(
                "page {}: {} fragments -> {} lines",
                page.index,
                page.fragments.len(),
                page_lines.len()
            );
            lines.push(page_lines);
        }

        let index = SpatialIndex::build(&cells, geometry.pages.len());

        Self {
            cells,
            lines,
            index,
            settings: settings.clone(),
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0]
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.lines.len()
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn settings(&self) -> &LayoutConfig {
        &self.settings
    }

    /// Rows of a page, top to bottom.
    pub fn lines(&self, page: usize) -> &[Line] {
        self.lines.get(page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The row holding `id`, with its position on the page.
    pub fn line_of(&self, id: CellId) -> Option<(usize, &Line)> {
        let page = self.cells.get(id.0)?.page;
        self.lines(page)
            .iter()
            .enumerate()
            .find(|(_, line)| line.cells.contains(&id))
    }

    /// Text of one row: cells joined by a space, or a tab across column gaps.
    pub fn line_text(&self, line: &Line) -> String {
        let mut text = String::new();
        let mut previous: Option<&Cell> = None;
        for id in &line.cells {
            let cell = self.cell(*id);
            if let Some(prev) = previous {
                let gap = cell.bbox.x0 - prev.bbox.x1;
                text.push(if gap > self.settings.column_gap { '\t' } else { ' ' });
            }
            text.push_str(&cell.text);
            previous = Some(cell);
        }
        fold_width(&text)
    }

    /// Reading-order text lines of a page.
    pub fn page_lines(&self, page: usize) -> Vec<String> {
        self.lines(page).iter().map(|line| self.line_text(line)).collect()
    }

    /// Page text with one row per line.
    pub fn page_text(&self, page: usize) -> String {
        self.page_lines(page).join("\n")
    }
}

/// Group fragments into rows: sort by vertical center, then attach each
/// fragment to the current row when centers are within `tolerance` or the
/// boxes overlap by at least half the shorter height.
fn group_rows(fragments: &[TextFragment], tolerance: f64) -> Vec<Vec<&TextFragment>> {
    let mut sorted: Vec<&TextFragment> = fragments
        .iter()
        .filter(|f| !f.text.trim().is_empty())
        .collect();
    sorted.sort_by(|a, b| {
        a.bbox
            .center()
            .1
            .total_cmp(&b.bbox.center().1)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut rows: Vec<(BBox, Vec<&TextFragment>)> = Vec::new();
    for fragment in sorted {
        let joins = rows.last().is_some_and(|(row_box, _)| {
            let dy = (row_box.center().1 - fragment.bbox.center().1).abs();
            let shorter = row_box.height().min(fragment.bbox.height());
            dy <= tolerance
                || (shorter > 0.0 && row_box.vertical_overlap(&fragment.bbox) >= shorter / 2.0)
        });
        if joins {
            if let Some((row_box, members)) = rows.last_mut() {
                *row_box = row_box.union(&fragment.bbox);
                members.push(fragment);
                continue;
            }
        }
        rows.push((fragment.bbox, vec![fragment]));
    }

    rows.into_iter()
        .map(|(_, mut members)| {
            members.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            members
        })
        .collect()
}

/// Merge horizontally adjacent fragments of a row.
fn coalesce_row(row: &[&TextFragment], max_gap: f64) -> Vec<(String, BBox)> {
    let mut out: Vec<(String, BBox)> = Vec::new();
    for fragment in row {
        let text = fragment.text.trim();
        if let Some((cell_text, bbox)) = out.last_mut() {
            if fragment.bbox.x0 - bbox.x1 <= max_gap {
                cell_text.push_str(text);
                *bbox = bbox.union(&fragment.bbox);
                continue;
            }
        }
        out.push((text.to_string(), fragment.bbox));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frag(text: &str, x0: f64, y0: f64, x1: f64) -> TextFragment {
        TextFragment::new(text, 0, BBox::new(x0, y0, x1, y0 + 10.0))
    }

    fn geometry(fragments: Vec<TextFragment>) -> DocumentGeometry {
        DocumentGeometry::from_fragments("test", (595.0, 842.0), fragments)
    }

    #[test]
    fn test_adjacent_fragments_coalesce() {
        let cells = CellSet::build(
            &geometry(vec![
                frag("项目", 50.0, 100.0, 70.0),
                frag("名称", 70.5, 100.5, 90.0),
                frag("办公楼改造", 150.0, 100.0, 200.0),
            ]),
            &LayoutConfig::default(),
        );
        let texts: Vec<&str> = cells.cells().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["项目名称", "办公楼改造"]);
        assert_eq!(cells.cell(CellId(0)).label_key, "项目名称");
        assert_eq!(cells.cell(CellId(0)).bbox, BBox::new(50.0, 100.0, 90.0, 110.5));
    }

    #[test]
    fn test_ids_follow_reading_order() {
        let cells = CellSet::build(
            &geometry(vec![
                frag("second", 50.0, 200.0, 90.0),
                frag("right", 300.0, 100.0, 340.0),
                frag("left", 50.0, 101.0, 90.0),
            ]),
            &LayoutConfig::default(),
        );
        let texts: Vec<&str> = cells.cells().iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["left", "right", "second"]);
        assert_eq!(cells.lines(0).len(), 2);
    }

    #[test]
    fn test_page_lines_use_tab_for_column_gaps() {
        let cells = CellSet::build(
            &geometry(vec![
                frag("预算金额:", 50.0, 100.0, 100.0),
                frag("１２０万元", 104.0, 100.0, 150.0),
                frag("采购方式", 300.0, 100.0, 340.0),
            ]),
            &LayoutConfig::default(),
        );
        assert_eq!(cells.page_lines(0), vec!["预算金额: 120万元\t采购方式".to_string()]);
    }

    #[test]
    fn test_blank_fragments_are_ignored() {
        let cells = CellSet::build(
            &geometry(vec![frag("  ", 50.0, 100.0, 60.0), frag("x", 70.0, 100.0, 75.0)]),
            &LayoutConfig::default(),
        );
        assert_eq!(cells.len(), 1);
        assert_eq!(cells.line_of(CellId(0)).map(|(i, _)| i), Some(0));
    }
}
