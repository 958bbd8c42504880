//! Data models shared across the pipeline.

pub mod config;
pub mod record;

pub use config::ProcexConfig;
pub use record::{ExtractionOutcome, FieldStatus, FieldValue, MethodKind, MethodMiss, MethodUsed, Strategy};
