//! Per-page R-tree over cell boxes.

use rstar::{AABB, RTree, RTreeObject};

use super::cells::{Cell, CellId};

/// A cell box as stored in a page tree.
#[derive(Debug, Clone, PartialEq)]
struct CellEnvelope {
    id: CellId,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for CellEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// One R-tree per page, keyed by [`CellId`].
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    trees: Vec<RTree<CellEnvelope>>,
    page_cells: Vec<Vec<CellId>>,
}

impl SpatialIndex {
    /// Bulk-load one tree per page.
    pub fn build(cells: &[Cell], page_count: usize) -> Self {
        let page_count = cells
            .iter()
            .map(|cell| cell.page + 1)
            .max()
            .unwrap_or(0)
            .max(page_count);
        let mut per_page: Vec<Vec<CellEnvelope>> = vec![Vec::new(); page_count];
        let mut page_cells: Vec<Vec<CellId>> = vec![Vec::new(); page_count];

        for cell in cells {
            let b = &cell.bbox;
            per_page[cell.page].push(CellEnvelope {
                id: cell.id,
                envelope: AABB::from_corners([b.x0, b.y0], [b.x1, b.y1]),
            });
            page_cells[cell.page].push(cell.id);
        }

        Self {
            trees: per_page.into_iter().map(RTree::bulk_load).collect(),
            page_cells,
        }
    }

    /// Cells of `page` whose box intersects `[x_lo, x_hi] × [y_lo, y_hi]`,
    /// ascending by id. Callers still apply exact geometric predicates.
    pub fn query(&self, page: usize, x_lo: f64, x_hi: f64, y_lo: f64, y_hi: f64) -> Vec<CellId> {
        let Some(tree) = self.trees.get(page) else {
            return Vec::new();
        };
        let window = AABB::from_corners([x_lo, y_lo], [x_hi, y_hi]);
        let mut ids: Vec<CellId> = tree
            .locate_in_envelope_intersecting(&window)
            .map(|entry| entry.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// All cells of a page in id order.
    pub fn page_cells(&self, page: usize) -> &[CellId] {
        self.page_cells.get(page).map(Vec::as_slice).unwrap_or(&[])
    }
}
