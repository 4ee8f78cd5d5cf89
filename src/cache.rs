//! Persistent version cache.
//!
//! Maps a core id to the version last processed and the record produced for
//! that version. The orchestrator asks [`VersionCache::classify`] before doing
//! any expensive work for a core.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::record::CoreRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: String,
    /// Stored as raw JSON so a record that no longer deserializes is detected
    /// at lookup time instead of failing the whole load.
    #[serde(default)]
    pub core: Option<serde_json::Value>,
}

/// What the orchestrator should do with a core.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheDecision {
    /// No prior entry.
    New,
    /// Same version as last run; reuse the stored record verbatim.
    Unchanged(CoreRecord),
    /// A prior entry exists but cannot be reused.
    Updated { previous_version: String },
}

#[derive(Debug, Default)]
pub struct VersionCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, CacheEntry>,
}

impl VersionCache {
    /// A cache that is never persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the cache file at `path`. A missing or unreadable file yields an empty cache.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, CacheEntry>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Cache file is corrupt, starting from an empty cache");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No cache file yet");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to read cache file, starting from an empty cache");
                BTreeMap::new()
            }
        };
        info!(path = %path.display(), entries = entries.len(), "Loaded version cache");
        Self {
            path: Some(path),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, core_id: &str) -> Option<&CacheEntry> {
        self.entries.get(core_id)
    }

    /// Decides between reuse and full processing for `core_id` at `version`.
    pub fn classify(&self, core_id: &str, version: &str) -> CacheDecision {
        let Some(entry) = self.lookup(core_id) else {
            return CacheDecision::New;
        };
        if entry.version != version {
            return CacheDecision::Updated {
                previous_version: entry.version.clone(),
            };
        }

        let record = entry
            .core
            .clone()
            .ok_or_else(|| "no stored record".to_string())
            .and_then(|value| {
                serde_json::from_value::<CoreRecord>(value).map_err(|e| e.to_string())
            });
        match record {
            Ok(record) if record.version == entry.version => CacheDecision::Unchanged(record),
            Ok(record) => {
                warn!(
                    core_id,
                    cached_version = %entry.version,
                    record_version = %record.version,
                    "Cache entry disagrees with its record, reprocessing"
                );
                CacheDecision::Updated {
                    previous_version: entry.version.clone(),
                }
            }
            Err(reason) => {
                warn!(core_id, reason = %reason, "Cache entry has no usable record, reprocessing");
                CacheDecision::Updated {
                    previous_version: entry.version.clone(),
                }
            }
        }
    }

    /// Records `record` as the output for `core_id` at `version`.
    pub fn store(
        &mut self,
        core_id: &str,
        version: &str,
        record: &CoreRecord,
    ) -> Result<(), CacheError> {
        if record.version != version {
            return Err(CacheError::VersionMismatch {
                core_id: core_id.to_string(),
                version: version.to_string(),
                record_version: record.version.clone(),
            });
        }
        let value = serde_json::to_value(record)?;
        self.entries.insert(
            core_id.to_string(),
            CacheEntry {
                version: version.to_string(),
                core: Some(value),
            },
        );
        Ok(())
    }

    /// Writes the cache back to its file, atomically. No-op for in-memory caches.
    pub fn save(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let json = serde_json::to_string_pretty(&self.entries)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        info!(path = %path.display(), entries = self.entries.len(), "Saved version cache");
        Ok(())
    }
}
