//! Runtime settings for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Main configuration for the procex pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProcexConfig {
    /// Cell detection and spatial lookup settings.
    pub layout: LayoutConfig,

    /// Document type classification settings.
    pub classifier: ClassifierConfig,

    /// Value normalization defaults.
    pub normalize: NormalizeConfig,

    /// Multi-document merge settings.
    pub merge: MergeConfig,

    /// Case and batch processing settings.
    pub pipeline: PipelineConfig,

    /// Path of the field/signature catalogue (JSON).
    pub catalogue: Option<PathBuf>,
}

/// Cell detection and directional lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Column alignment tolerance in points.
    pub tolerance_x: f64,

    /// Row alignment tolerance in points.
    pub tolerance_y: f64,

    /// Default search distance for right-hand values.
    pub max_distance_right: f64,

    /// Default search distance for values below a label.
    pub max_distance_below: f64,

    /// Largest horizontal gap bridged when coalescing fragments into a cell.
    pub coalesce_gap: f64,

    /// Vertical tolerance when rebuilding reading-order lines.
    pub line_tolerance: f64,

    /// Gap above which two cells on a line are separated by a tab.
    pub column_gap: f64,

    /// Minimum normalized Levenshtein similarity for fuzzy label matches.
    pub label_similarity: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            tolerance_x: 5.0,
            tolerance_y: 3.0,
            max_distance_right: 250.0,
            max_distance_below: 60.0,
            coalesce_gap: 1.5,
            line_tolerance: 3.0,
            column_gap: 12.0,
            label_similarity: 0.8,
        }
    }
}

/// Classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Number of leading pages scored (0 = whole document).
    pub max_pages: usize,
}

/// Normalizer defaults, overridable per field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Date formats tried in order when a field declares none.
    pub date_formats: Vec<String>,

    /// Earliest accepted year.
    pub min_year: i32,

    /// Latest accepted year.
    pub max_year: i32,

    /// Text truncation length when a field declares none.
    pub max_text_length: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            date_formats: vec![
                "%Y年%m月%d日".to_string(),
                "%Y-%m-%d".to_string(),
                "%Y/%m/%d".to_string(),
                "%Y.%m.%d".to_string(),
                "%Y%m%d".to_string(),
            ],
            min_year: 1900,
            max_year: 2100,
            max_text_length: 500,
        }
    }
}

/// Merge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Document roles from highest to lowest precedence.
    pub role_priority: Vec<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            role_priority: vec![
                "request".to_string(),
                "notice".to_string(),
                "candidate_publicity".to_string(),
                "result_publicity".to_string(),
            ],
        }
    }
}

/// Case/batch pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Wall-clock budget per document; `None` disables the watchdog.
    pub document_budget_ms: Option<u64>,

    /// Process independent documents on the rayon pool.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            document_budget_ms: None,
            parallel: true,
        }
    }
}

impl ProcexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Catalogue path, resolved against `base` when relative.
    pub fn catalogue_path(&self, base: Option<&Path>) -> Option<PathBuf> {
        let path = self.catalogue.as_ref()?;
        match base {
            Some(dir) if path.is_relative() => Some(dir.join(path)),
            _ => Some(path.clone()),
        }
    }
}
