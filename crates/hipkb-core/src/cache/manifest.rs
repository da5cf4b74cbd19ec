//! Cache manifest: one JSON document describing every cached blob.
//!
//! The manifest is always rewritten atomically (temp file, sync, rename) so
//! readers never observe a manifest pointing at a half-written blob. Rows
//! whose file vanished across a crash are dropped at load time.

use crate::config::HipSource;
use crate::error::{HipError, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Manifest schema version.
const MANIFEST_VERSION: u32 = 1;

/// One cached archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Source URL or local path this entry was acquired from.
    pub source_url: String,
    pub source: HipSource,
    /// Where the bytes live now. For local-install entries this is the
    /// original on-disk path, not a copy.
    pub local_path: PathBuf,
    pub file_name: String,
    /// SHA-256 over the full file bytes, lowercase hex.
    pub sha256: String,
    pub size_bytes: u64,
    pub downloaded_at: DateTime<Utc>,
    #[serde(default)]
    pub systems: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// The persisted manifest document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheManifest {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
    pub last_updated: DateTime<Utc>,
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

impl CacheManifest {
    /// Load a manifest, tolerating a missing file and dropping rows whose
    /// blob no longer exists.
    pub fn load(path: &Path) -> Result<Self> {
        let mut manifest: CacheManifest = match read_json(path)? {
            Some(m) => m,
            None => return Ok(Self::default()),
        };

        let before = manifest.entries.len();
        manifest
            .entries
            .retain(|_, entry| entry.local_path.exists());
        let dropped = before - manifest.entries.len();
        if dropped > 0 {
            warn!(dropped, "dropped dangling manifest rows");
        }

        Ok(manifest)
    }

    /// Persist atomically: write temp, sync, rename over the target.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        write_json_atomic(path, self)
    }

    /// Sum of entry sizes.
    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size_bytes).sum()
    }

    /// Source id of the entry with the oldest acquisition time, excluding
    /// `protected` ids.
    pub fn oldest_entry<'a>(&'a self, protected: &[&str]) -> Option<(&'a String, &'a CacheEntry)> {
        self.entries
            .iter()
            .filter(|(id, _)| !protected.contains(&id.as_str()))
            .min_by_key(|(_, entry)| entry.downloaded_at)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut file = File::open(path).map_err(|e| HipError::io_with_path(e, path))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| HipError::io_with_path(e, path))?;

    let data: T = serde_json::from_str(&contents).map_err(|e| HipError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| HipError::io_with_path(e, parent))?;
        }
    }

    let temp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));

    let serialized = serde_json::to_string_pretty(data).map_err(|e| HipError::Json {
        message: format!("Failed to serialize {}: {}", path.display(), e),
        source: Some(e),
    })?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| HipError::io_with_path(e, &temp_path))?;
        file.write_all(serialized.as_bytes())
            .map_err(|e| HipError::io_with_path(e, &temp_path))?;
        file.sync_all()
            .map_err(|e| HipError::io_with_path(e, &temp_path))?;
    }

    fs::rename(&temp_path, path).map_err(|e| HipError::io_with_path(e, path))?;
    debug!("rewrote {}", path.display());
    Ok(())
}
