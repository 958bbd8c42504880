//! Core library for procurement PDF field extraction.
//!
//! This crate provides:
//! - PDF geometry extraction (positioned text fragments per page)
//! - Cell detection with a spatial index and label/value lookup
//! - Document type classification from weighted signatures
//! - Catalogue-driven field extraction with per-field fallback chains
//! - Value normalization (amounts, dates, choices, text)
//! - Precedence-based merging of the documents of one procurement case

pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod layout;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod pdf;
pub mod pipeline;

pub use classify::{Classification, DocumentClassifier, ScoredType};
pub use config::{ConfigSnapshot, ConfigStore, FieldCatalogue, FieldMappingEntry, MethodSpec};
pub use error::{ConfigError, DocumentError, LookupError, NormalizeError, ProcexError, Result};
pub use extract::{FieldExtractor, PreparedDocument};
pub use layout::{CellId, CellSet, Direction};
pub use merge::{CaseMerger, MergedField, MergedRecord};
pub use models::{ExtractionOutcome, FieldStatus, FieldValue, ProcexConfig};
pub use pdf::{BBox, DocumentGeometry, GeometrySource, PdfExtractor, TextFragment};
pub use pipeline::{CaseReport, DocumentInput, DocumentReport, InputSource, Pipeline};
