//! Directional neighbor queries and label lookup.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strsim::normalized_levenshtein;
use tracing::trace;

use super::cells::{Cell, CellId, CellSet};
use crate::error::LookupError;
use crate::normalize::text::{inline_value, label_key};

/// Spatial relationship between a label and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Value on the same row, to the right of the label.
    #[default]
    Right,
    /// Value in the same column, under the label.
    Below,
    /// Right first, then below.
    Auto,
}

/// Score of an inline `label:value` cell.
const INLINE_SCORE: f64 = 0.95;
/// Smallest label/cell length ratio accepted for containment matches.
const MIN_CONTAINMENT: f64 = 0.4;
/// Levenshtein matches rank below containment of the same similarity.
const LEVENSHTEIN_WEIGHT: f64 = 0.9;

/// A cell matching a label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMatch {
    pub cell: CellId,
    /// 1.0 for exact matches.
    pub score: f64,
    /// Value carried in the label cell itself (`label:value`).
    pub inline: Option<String>,
}

/// A resolved label/value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValueHit {
    pub label: CellId,
    /// `None` when the value was read from the label cell.
    pub value_cell: Option<CellId>,
    pub value: String,
    /// Direction that produced the value (never `Auto`).
    pub direction: Direction,
}

impl CellSet {
    /// Nearest cell to the right of `key` on the same row.
    pub fn find_right_cell(&self, key: CellId, max_distance: f64) -> Option<CellId> {
        let key_cell = self.cell(key);
        let (_, key_cy) = key_cell.center();
        let tolerance = self.settings().tolerance_y;
        let x_start = key_cell.bbox.x1;

        self.index()
            .query(
                key_cell.page,
                x_start,
                x_start + max_distance,
                key_cy - tolerance,
                key_cy + tolerance,
            )
            .into_iter()
            .filter(|id| *id != key)
            .map(|id| self.cell(id))
            .filter_map(|cell| {
                let distance = cell.bbox.x0 - x_start;
                let dy = (cell.center().1 - key_cy).abs();
                (cell.page == key_cell.page
                    && dy <= tolerance
                    && distance >= 0.0
                    && distance <= max_distance)
                    .then_some((distance, dy, cell.id))
            })
            .min_by(compare_candidates)
            .map(|(_, _, id)| id)
    }

    /// Nearest column-aligned cell under `key`.
    pub fn find_below_cell(&self, key: CellId, max_distance: f64) -> Option<CellId> {
        let key_cell = self.cell(key);
        let (key_cx, _) = key_cell.center();
        let tolerance = self.settings().tolerance_x;
        let y_start = key_cell.bbox.y1;

        self.index()
            .query(
                key_cell.page,
                key_cell.bbox.x0.min(key_cx) - tolerance,
                key_cell.bbox.x0.max(key_cx) + tolerance,
                y_start,
                y_start + max_distance,
            )
            .into_iter()
            .filter(|id| *id != key)
            .map(|id| self.cell(id))
            .filter_map(|cell| {
                let distance = cell.bbox.y0 - y_start;
                let dx = (cell.center().0 - key_cx).abs();
                let aligned = dx <= tolerance || (cell.bbox.x0 - key_cell.bbox.x0).abs() <= tolerance;
                (cell.page == key_cell.page && aligned && distance >= 0.0 && distance <= max_distance)
                    .then_some((distance, dx, cell.id))
            })
            .min_by(compare_candidates)
            .map(|(_, _, id)| id)
    }

    /// Every cell matching `label`, best first.
    ///
    /// Exact matches (width-folded, whitespace and trailing colon ignored)
    /// shadow fuzzy ones. Fuzzy matches are inline `label:value` cells,
    /// cells containing the label, and cells within the configured
    /// Levenshtein similarity. Equal scores keep reading order.
    pub fn label_candidates(&self, label: &str) -> Vec<LabelMatch> {
        let key = label_key(label);
        if key.is_empty() {
            return Vec::new();
        }

        let exact: Vec<LabelMatch> = self
            .cells()
            .iter()
            .filter(|cell| cell.label_key == key)
            .map(|cell| LabelMatch {
                cell: cell.id,
                score: 1.0,
                inline: None,
            })
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        let similarity = self.settings().label_similarity;
        let mut fuzzy: Vec<LabelMatch> = self
            .cells()
            .iter()
            .filter_map(|cell| fuzzy_match(cell, label, &key, similarity))
            .collect();
        fuzzy.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.cell.cmp(&b.cell)));
        fuzzy
    }

    /// Best cell matching `label`.
    pub fn find_label(&self, label: &str) -> Result<LabelMatch, LookupError> {
        self.label_candidates(label)
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::LabelNotFound(label.to_string()))
    }

    /// Locate `label` and read the value in `direction`.
    ///
    /// Candidates are tried best first; the first one with an aligned value
    /// wins. `max_distance` overrides the configured per-direction default.
    pub fn extract_keyvalue_pair(
        &self,
        label: &str,
        direction: Direction,
        max_distance: Option<f64>,
    ) -> Result<KeyValueHit, LookupError> {
        let candidates = self.label_candidates(label);
        if candidates.is_empty() {
            return Err(LookupError::LabelNotFound(label.to_string()));
        }

        let right = max_distance.unwrap_or(self.settings().max_distance_right);
        let below = max_distance.unwrap_or(self.settings().max_distance_below);

        for candidate in &candidates {
            let hit = match direction {
                Direction::Right => self.value_right(candidate, right),
                Direction::Below => self.value_below(candidate, below),
                Direction::Auto => self
                    .value_right(candidate, right)
                    .or_else(|| self.value_below(candidate, below)),
            };
            if let Some(hit) = hit {
                trace!(
                    "label {:?} -> {:?} via {:?} (score {:.2})",
                    label, hit.value, hit.direction, candidate.score
                );
                return Ok(hit);
            }
        }

        Err(LookupError::NoAlignedValue(label.to_string()))
    }

    fn value_right(&self, candidate: &LabelMatch, max_distance: f64) -> Option<KeyValueHit> {
        if let Some(value) = &candidate.inline {
            return Some(KeyValueHit {
                label: candidate.cell,
                value_cell: None,
                value: value.clone(),
                direction: Direction::Right,
            });
        }
        let id = self.find_right_cell(candidate.cell, max_distance)?;
        Some(self.hit(candidate.cell, id, Direction::Right))
    }

    fn value_below(&self, candidate: &LabelMatch, max_distance: f64) -> Option<KeyValueHit> {
        let id = self.find_below_cell(candidate.cell, max_distance)?;
        Some(self.hit(candidate.cell, id, Direction::Below))
    }

    fn hit(&self, label: CellId, value: CellId, direction: Direction) -> KeyValueHit {
        KeyValueHit {
            label,
            value_cell: Some(value),
            value: self.cell(value).text.trim().to_string(),
            direction,
        }
    }
}

/// Order by distance, then off-axis deviation, then id.
fn compare_candidates(a: &(f64, f64, CellId), b: &(f64, f64, CellId)) -> Ordering {
    a.0.total_cmp(&b.0)
        .then(a.1.total_cmp(&b.1))
        .then(a.2.cmp(&b.2))
}

fn fuzzy_match(cell: &Cell, label: &str, key: &str, similarity: f64) -> Option<LabelMatch> {
    if let Some(value) = inline_value(&cell.text, label) {
        return Some(LabelMatch {
            cell: cell.id,
            score: INLINE_SCORE,
            inline: Some(value),
        });
    }

    let cell_key = cell.label_key.as_str();
    if cell_key.is_empty() {
        return None;
    }

    let score = if cell_key.contains(key) {
        let ratio = key.chars().count() as f64 / cell_key.chars().count() as f64;
        (ratio >= MIN_CONTAINMENT).then_some(ratio)?
    } else {
        let distance = normalized_levenshtein(cell_key, key);
        (distance >= similarity).then_some(distance * LEVENSHTEIN_WEIGHT)?
    };

    Some(LabelMatch {
        cell: cell.id,
        score,
        inline: None,
    })
}
