//! Versioned configuration snapshots with atomic reload.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

use super::loader::FieldCatalogue;
use crate::error::ConfigError;
use crate::models::config::ProcexConfig;

/// Settings and catalogue as one immutable unit.
#[derive(Debug)]
pub struct ConfigSnapshot {
    /// Increases by one on every successful reload, starting at 1.
    pub version: u64,
    pub settings: ProcexConfig,
    pub catalogue: FieldCatalogue,
    pub loaded_at: DateTime<Utc>,
}

/// Holds the current snapshot. Readers clone the `Arc` and keep it for a
/// whole run; reloads swap in a new snapshot and never touch old ones.
#[derive(Debug)]
pub struct ConfigStore {
    current: RwLock<Arc<ConfigSnapshot>>,
}

impl ConfigStore {
    pub fn new(settings: ProcexConfig, catalogue: FieldCatalogue) -> Self {
        Self {
            current: RwLock::new(Arc::new(ConfigSnapshot {
                version: 1,
                settings,
                catalogue,
                loaded_at: Utc::now(),
            })),
        }
    }

    /// Load the catalogue from a file and wrap it with `settings`.
    pub fn open(settings: ProcexConfig, catalogue_path: &Path) -> Result<Self, ConfigError> {
        let catalogue = FieldCatalogue::from_file(catalogue_path)?;
        Ok(Self::new(settings, catalogue))
    }

    /// The snapshot current at the time of the call.
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Publish an already validated catalogue. Returns the new version.
    pub fn publish(&self, settings: ProcexConfig, catalogue: FieldCatalogue) -> u64 {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = current.version + 1;
        *current = Arc::new(ConfigSnapshot {
            version,
            settings,
            catalogue,
            loaded_at: Utc::now(),
        });
        info!("Published configuration version {}", version);
        version
    }

    /// Validate catalogue JSON and publish it. On failure the current
    /// snapshot stays in place and the error lists every issue.
    pub fn reload_str(&self, settings: ProcexConfig, catalogue_json: &str) -> Result<u64, ConfigError> {
        match FieldCatalogue::from_json_str(catalogue_json) {
            Ok(catalogue) => Ok(self.publish(settings, catalogue)),
            Err(e) => {
                warn!("Reload rejected, keeping version {}: {}", self.snapshot().version, e);
                Err(e)
            }
        }
    }

    /// Re-read a catalogue file and publish it.
    pub fn reload_file(&self, settings: ProcexConfig, catalogue_path: &Path) -> Result<u64, ConfigError> {
        match FieldCatalogue::from_file(catalogue_path) {
            Ok(catalogue) => Ok(self.publish(settings, catalogue)),
            Err(e) => {
                warn!("Reload rejected, keeping version {}: {}", self.snapshot().version, e);
                Err(e)
            }
        }
    }
}
