//! Cell detection and spatial lookup.
//!
//! Fragments are coalesced into [`Cell`]s held in an arena ([`CellSet`]) and
//! indexed by one R-tree per page. Lookups return [`CellId`]s.

mod cells;
mod index;
mod lookup;
mod table;

pub use cells::{Cell, CellId, CellSet, Line};
pub use index::SpatialIndex;
pub use lookup::{Direction, KeyValueHit, LabelMatch};
