//! Trip Registry - discovery and cached feature extraction
//!
//! Trips live on disk as `<trips_root>/<driver_id>/<trip_id>/` with the three
//! sensor CSVs inside. Drivers and trips are listed in sorted order. Feature
//! records are extracted once per trip (capped at `max_windows`) and cached.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info};

use crate::acquisition::{self, InputError};
use crate::config::defaults::COACH_ID_PREFIX;
use crate::processing::{build_summary, classify, extract_trip};
use crate::types::{FeatureRecord, SeverityTier, WindowSeverity};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("window index {index} out of range (trip has {len} windows)")]
    InvalidIndex { index: usize, len: usize },

    #[error("'{0}' is a coach id, not a driver id")]
    InvalidDriver(String),

    #[error("invalid identifier '{0}'")]
    InvalidId(String),

    #[error("failed to list {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A window ready for inference: tier plus the frozen summary text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWindow {
    pub index: usize,
    pub severity: SeverityTier,
    pub summary: String,
}

type TripKey = (String, String);

pub struct TripRegistry {
    trips_root: PathBuf,
    max_windows: usize,
    cache: Mutex<HashMap<TripKey, Arc<Vec<FeatureRecord>>>>,
}

impl TripRegistry {
    pub fn new(trips_root: impl Into<PathBuf>, max_windows: usize) -> Self {
        let trips_root = trips_root.into();
        info!(root = %trips_root.display(), max_windows, "Trip registry ready");
        Self { trips_root, max_windows, cache: Mutex::new(HashMap::new()) }
    }

    pub fn trips_root(&self) -> &Path {
        &self.trips_root
    }

    pub fn max_windows(&self) -> usize {
        self.max_windows
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Driver directories, sorted. A missing root yields no drivers.
    pub fn list_drivers(&self) -> Result<Vec<String>, RegistryError> {
        list_subdirs(&self.trips_root)
    }

    /// Whether a driver directory exists.
    pub fn driver_exists(&self, driver_id: &str) -> bool {
        validate_id(driver_id).is_ok() && self.trips_root.join(driver_id).is_dir()
    }

    /// Trip directories of a driver, sorted.
    ///
    /// Coach ids are rejected; an unknown driver has no trips.
    pub fn list_trips(&self, driver_id: &str) -> Result<Vec<String>, RegistryError> {
        if driver_id.starts_with(COACH_ID_PREFIX) {
            return Err(RegistryError::InvalidDriver(driver_id.to_string()));
        }
        validate_id(driver_id)?;
        list_subdirs(&self.trips_root.join(driver_id))
    }

    // ========================================================================
    // Windows
    // ========================================================================

    /// Feature records of a trip; empty when the trip directory is absent.
    pub fn features(&self, driver_id: &str, trip_id: &str) -> Result<Arc<Vec<FeatureRecord>>, RegistryError> {
        validate_id(driver_id)?;
        validate_id(trip_id)?;
        let key = (driver_id.to_string(), trip_id.to_string());

        if let Some(hit) = self.cache.lock().ok().and_then(|c| c.get(&key).cloned()) {
            return Ok(hit);
        }

        let dir = self.trips_root.join(driver_id).join(trip_id);
        let records = if dir.is_dir() {
            let telemetry = acquisition::load_trip(&dir)?;
            extract_trip(&telemetry, Some(self.max_windows))
        } else {
            debug!(driver_id, trip_id, "Trip directory not found");
            Vec::new()
        };
        let records = Arc::new(records);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, Arc::clone(&records));
        }
        debug!(driver_id, trip_id, windows = records.len(), "Trip features extracted");
        Ok(records)
    }

    /// Indices of the trip's windows.
    pub fn list_windows(&self, driver_id: &str, trip_id: &str) -> Result<Vec<usize>, RegistryError> {
        Ok(self.features(driver_id, trip_id)?.iter().map(|f| f.index).collect())
    }

    /// Severity of every window, without inference.
    pub fn window_severities(&self, driver_id: &str, trip_id: &str) -> Result<Vec<WindowSeverity>, RegistryError> {
        Ok(self
            .features(driver_id, trip_id)?
            .iter()
            .map(|f| WindowSeverity { window_index: f.index, severity: classify(f) })
            .collect())
    }

    /// Every window classified and summarized.
    pub fn prepare_windows(&self, driver_id: &str, trip_id: &str) -> Result<Vec<PreparedWindow>, RegistryError> {
        Ok(self.features(driver_id, trip_id)?.iter().map(prepare).collect())
    }

    /// One window classified and summarized.
    pub fn prepare_window(&self, driver_id: &str, trip_id: &str, index: usize) -> Result<PreparedWindow, RegistryError> {
        let features = self.features(driver_id, trip_id)?;
        features
            .get(index)
            .map(prepare)
            .ok_or(RegistryError::InvalidIndex { index, len: features.len() })
    }

    /// Drop cached features, e.g. after new telemetry arrived.
    pub fn invalidate(&self, driver_id: &str, trip_id: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(&(driver_id.to_string(), trip_id.to_string()));
        }
    }
}

impl std::fmt::Debug for TripRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TripRegistry")
            .field("trips_root", &self.trips_root)
            .field("max_windows", &self.max_windows)
            .finish_non_exhaustive()
    }
}

fn prepare(f: &FeatureRecord) -> PreparedWindow {
    PreparedWindow { index: f.index, severity: classify(f), summary: build_summary(f) }
}

/// Ids name a single directory level.
fn validate_id(id: &str) -> Result<(), RegistryError> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(RegistryError::InvalidId(id.to_string()));
    }
    Ok(())
}

fn list_subdirs(dir: &Path) -> Result<Vec<String>, RegistryError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let io_err = |source| RegistryError::Io { path: dir.to_path_buf(), source };
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
