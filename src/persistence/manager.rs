//! Persistence Manager
//!
//! Owns the on-disk copy of the station store.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{AggError, Result};
use crate::store::{StationRecord, StationStore};

use super::{DATA_FILENAME, TEMP_FILENAME};

/// Writes and reloads the persisted station file
///
/// ## Concurrency:
/// - `write_lock` serializes whole-file rewrites; it is independent of the
///   store's shard locks
/// - The snapshot is taken after acquiring `write_lock`, so the last
///   writer always commits a snapshot that includes its own update
pub struct PersistenceManager {
    /// Committed file
    path: PathBuf,

    /// Scratch file renamed over `path`
    temp_path: PathBuf,

    /// Serializes write-then-replace
    write_lock: Mutex<()>,
}

impl PersistenceManager {
    /// Manager for the standard file names inside `data_dir`
    pub fn new(data_dir: &Path) -> Self {
        Self::with_paths(data_dir.join(DATA_FILENAME), data_dir.join(TEMP_FILENAME))
    }

    /// Manager for explicit final and temporary paths
    pub fn with_paths(path: impl Into<PathBuf>, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temp_path: temp_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Load persisted records
    ///
    /// A missing file yields no records. An unreadable or corrupt file is
    /// logged and also yields no records; it is never fatal.
    pub fn load(&self) -> Vec<StationRecord> {
        match self.try_load() {
            Ok(records) => records,
            Err(AggError::Io(ref e)) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No persisted data at {}, starting empty", self.path.display());
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable data file {}: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Load persisted records, surfacing every failure
    pub fn try_load(&self) -> Result<Vec<StationRecord>> {
        let bytes = fs::read(&self.path)?;
        let stations: BTreeMap<String, StationRecord> = serde_json::from_slice(&bytes)?;

        stations
            .into_iter()
            .map(|(key, record)| {
                if key == record.station_id {
                    Ok(record)
                } else {
                    Err(AggError::Persistence(format!(
                        "entry {:?} holds station {:?}",
                        key, record.station_id
                    )))
                }
            })
            .collect()
    }

    /// Rewrite the file from the current contents of `store`
    ///
    /// Steps:
    /// 1. Acquire the write lock and take a snapshot
    /// 2. Serialize to the temp file, flush and fsync
    /// 3. Rename the temp file over the final file
    /// 4. If the rename fails, delete the temp file
    pub fn persist(&self, store: &StationStore) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        let snapshot = store.snapshot();
        let stations: BTreeMap<&str, &StationRecord> = snapshot
            .iter()
            .map(|record| (record.station_id.as_str(), record.as_ref()))
            .collect();

        self.write_temp(&stations).map_err(|e| {
            AggError::Persistence(format!("writing {}: {}", self.temp_path.display(), e))
        })?;

        if let Err(e) = fs::rename(&self.temp_path, &self.path) {
            if let Err(cleanup) = fs::remove_file(&self.temp_path) {
                tracing::warn!(
                    "Failed to remove temp file {}: {}",
                    self.temp_path.display(),
                    cleanup
                );
            }
            return Err(AggError::Persistence(format!(
                "replacing {}: {}",
                self.path.display(),
                e
            )));
        }

        tracing::trace!("Persisted {} stations to {}", stations.len(), self.path.display());
        Ok(())
    }

    /// Final file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Temporary file path
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn write_temp(&self, stations: &BTreeMap<&str, &StationRecord>) -> Result<()> {
        let file = File::create(&self.temp_path)?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, stations)?;
        writer.flush()?;

        let file = writer
            .into_inner()
            .map_err(|e| AggError::Io(e.into_error()))?;
        file.sync_all()?;

        Ok(())
    }
}
