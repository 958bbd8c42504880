//! Table reads: the first data row under a header anchor.

use super::cells::{CellId, CellSet};
use crate::error::LookupError;

impl CellSet {
    /// Text of column `column_index` (0-based) in the first row under the
    /// header containing `anchor`.
    ///
    /// Data cells are assigned to the header column with the nearest center
    /// when the header has several cells, by position otherwise. Cells that
    /// land in the same column are joined left to right.
    pub fn first_table_row(&self, anchor: &str, column_index: usize) -> Result<String, LookupError> {
        let anchor_match = self.find_label(anchor)?;
        let (row, header) = self
            .line_of(anchor_match.cell)
            .ok_or_else(|| LookupError::TableRowNotFound(anchor.to_string()))?;
        let data = self
            .lines(header.page)
            .get(row + 1)
            .ok_or_else(|| LookupError::TableRowNotFound(anchor.to_string()))?;

        let picked: Vec<CellId> = if header.cells.len() >= 2 {
            data.cells
                .iter()
                .copied()
                .filter(|id| self.nearest_column(&header.cells, *id) == Some(column_index))
                .collect()
        } else {
            data.cells.get(column_index).copied().into_iter().collect()
        };

        let text = picked
            .iter()
            .map(|id| self.cell(*id).text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if text.is_empty() {
            Err(LookupError::TableRowNotFound(anchor.to_string()))
        } else {
            Ok(text)
        }
    }

    fn nearest_column(&self, header: &[CellId], id: CellId) -> Option<usize> {
        let (cx, _) = self.cell(id).center();
        header
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = (self.cell(**a).center().0 - cx).abs();
                let db = (self.cell(**b).center().0 - cx).abs();
                da.total_cmp(&db)
            })
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::LookupError;
    use crate::layout::CellSet;
    use crate::models::config::LayoutConfig;
    use crate::pdf::{BBox, DocumentGeometry, TextFragment};

    fn frag(text: &str, x0: f64, y0: f64, x1: f64) -> TextFragment {
        TextFragment::new(text, 0, BBox::new(x0, y0, x1, y0 + 10.0))
    }

    fn table() -> CellSet {
        let fragments = vec![
            frag("序号", 50.0, 100.0, 70.0),
            frag("中标供应商", 100.0, 100.0, 150.0),
            frag("中标金额", 250.0, 100.0, 290.0),
            frag("1", 58.0, 120.0, 62.0),
            frag("某某建设", 95.0, 120.0, 135.0),
            frag("有限公司", 137.0, 120.0, 177.0),
            frag("1,280,000.00元", 240.0, 120.0, 305.0),
            frag("2", 58.0, 140.0, 62.0),
            frag("其他公司", 100.0, 140.0, 140.0),
        ];
        CellSet::build(
            &DocumentGeometry::from_fragments("table", (595.0, 842.0), fragments),
            &LayoutConfig::default(),
        )
    }

    #[test]
    fn test_first_row_by_nearest_header_column() {
        let cells = table();
        assert_eq!(cells.first_table_row("中标供应商", 1).unwrap(), "某某建设 有限公司");
        assert_eq!(cells.first_table_row("中标供应商", 2).unwrap(), "1,280,000.00元");
        assert_eq!(cells.first_table_row("序号", 0).unwrap(), "1");
    }

    #[test]
    fn test_missing_column_or_anchor() {
        let cells = table();
        assert_eq!(
            cells.first_table_row("中标供应商", 7),
            Err(LookupError::TableRowNotFound("中标供应商".to_string()))
        );
        assert!(matches!(
            cells.first_table_row("联系电话", 0),
            Err(LookupError::LabelNotFound(_))
        ));
    }
}
