//! Error types for the procex-core library.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the procex library.
#[derive(Error, Debug)]
pub enum ProcexError {
    /// Document could not be turned into geometry.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that make a single document unreadable.
///
/// Fatal for that document only; a batch reports it and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// File could not be opened or parsed as PDF.
    #[error("document unreadable: {0}")]
    Unreadable(String),

    /// The PDF is encrypted and the empty password does not open it.
    #[error("document is encrypted")]
    Encrypted,

    /// The PDF has no pages.
    #[error("document has no pages")]
    Empty,

    /// Parsing did not finish within the caller's wall-clock budget.
    #[error("document exceeded its {0} ms budget")]
    BudgetExceeded(u64),
}

/// A single problem found while validating the catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Offending entry, e.g. `field[3] project_name` or `signature notice`.
    pub entry: String,
    /// What is wrong with it.
    pub problem: String,
}

impl ConfigIssue {
    pub fn new(entry: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entry, self.problem)
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The catalogue failed validation; every offending entry is listed.
    #[error("invalid configuration ({} issue(s)): {}", .0.len(), join_issues(.0))]
    Invalid(Vec<ConfigIssue>),

    /// The file is not valid JSON for the expected schema.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Issues carried by an `Invalid` error, empty otherwise.
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            ConfigError::Invalid(issues) => issues,
            _ => &[],
        }
    }
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Recoverable failure of one extraction method.
///
/// Never escapes the extraction engine: it becomes a named miss and the
/// next method in the chain runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No cell or line matches the label.
    #[error("label not found: {0}")]
    LabelNotFound(String),

    /// The label exists but nothing satisfies alignment and distance.
    #[error("no aligned value for label: {0}")]
    NoAlignedValue(String),

    /// A pattern-driven method found no match.
    #[error("no match for {0}")]
    PatternNotFound(String),

    /// The table anchor was found but no data row could be read.
    #[error("no data row under table anchor: {0}")]
    TableRowNotFound(String),
}

/// Rejection of a raw value by a normalizer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// Nothing left after cleaning.
    #[error("empty value")]
    Empty,

    /// No number could be read.
    #[error("not an amount: {0}")]
    NotAnAmount(String),

    /// Amount after unit scaling is zero or negative.
    #[error("amount must be positive, got {0}")]
    NonPositive(Decimal),

    /// None of the configured date formats matched.
    #[error("unrecognized date: {0}")]
    InvalidDate(String),

    /// Parsed date falls outside the accepted year range.
    #[error("year {year} outside {min}..={max}")]
    YearOutOfRange { year: i32, min: i32, max: i32 },

    /// Value does not map onto any enumerated choice.
    #[error("unknown choice: {0}")]
    UnknownChoice(String),

    /// Normalized text fails the configured pattern.
    #[error("value {0:?} does not match required pattern")]
    PatternMismatch(String),
}

/// Result type for the procex library.
pub type Result<T> = std::result::Result<T, ProcexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_lists_every_issue() {
        let err = ConfigError::Invalid(vec![
            ConfigIssue::new("field[0] a", "unknown method kind `guess`"),
            ConfigIssue::new("field[1] b", "source type `memo` has no signature"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 issue(s)"));
        assert!(msg.contains("field[0] a"));
        assert!(msg.contains("field[1] b"));
        assert_eq!(err.issues().len(), 2);
    }
}
