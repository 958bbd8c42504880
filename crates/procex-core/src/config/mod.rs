//! Field mapping and signature catalogue.
//!
//! The catalogue is JSON of the form `{"version", "signatures", "fields"}`.
//! Validation reports every offending entry at once; a validated catalogue
//! is published to readers through [`ConfigStore`] snapshots.

mod loader;
mod model;
mod store;

pub use loader::FieldCatalogue;
pub use model::{
    FieldMappingEntry, FieldRules, FieldType, FixedParams, KeyValueParams, MethodSpec,
    MultilineParams, RegexParams, SignaturePattern, TableParams, TokenParams, TypeSignature,
    ANY_SOURCE,
};
pub use store::{ConfigSnapshot, ConfigStore};
