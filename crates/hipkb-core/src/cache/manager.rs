//! Cache acquisition and eviction.
//!
//! `acquire` is the single entry point: a manifest hit returns the cached
//! blob untouched; a miss downloads (or locates) the bytes, content-addresses
//! them by SHA-256, and records the entry. The blob always reaches disk
//! before the manifest does.

use super::hashing::sha256_bytes;
use super::manifest::{CacheEntry, CacheManifest};
use crate::config::{IngestConfig, NetworkConfig, PathsConfig};
use crate::error::{HipError, Result};
use crate::models::HipSourceSpec;
use chrono::Utc;
use futures::StreamExt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct CacheManager {
    cache_dir: PathBuf,
    max_bytes: u64,
    manifest_path: PathBuf,
    manifest: CacheManifest,
    http: reqwest::Client,
}

impl CacheManager {
    /// Open (or create) the cache at the configured directory.
    pub fn open(config: &IngestConfig) -> Result<Self> {
        fs::create_dir_all(&config.cache_dir)
            .map_err(|e| HipError::io_with_path(e, &config.cache_dir))?;

        let manifest_path = config.cache_dir.join(PathsConfig::MANIFEST_FILE_NAME);
        let manifest = CacheManifest::load(&manifest_path)?;

        let http = reqwest::Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| HipError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            cache_dir: config.cache_dir.clone(),
            max_bytes: config.cache_max_bytes,
            manifest_path,
            manifest,
            http,
        })
    }

    /// Acquire one source: manifest hit, local file, or remote download.
    ///
    /// Returns `None` on a miss (unreachable URL, non-2xx response, absent
    /// local file); nothing is cached in that case.
    pub async fn acquire(&mut self, spec: &HipSourceSpec) -> Result<Option<CacheEntry>> {
        if let Some(entry) = self.manifest.entries.get(&spec.url) {
            if entry.local_path.exists() {
                debug!(source = %spec.url, "cache hit");
                return Ok(Some(entry.clone()));
            }
        }

        let entry = if is_remote(&spec.url) {
            match self.fetch_remote(spec).await? {
                Some(entry) => entry,
                None => return Ok(None),
            }
        } else {
            match self.stat_local(spec)? {
                Some(entry) => entry,
                None => return Ok(None),
            }
        };

        let id = spec.url.clone();
        self.manifest.entries.insert(id.clone(), entry.clone());
        self.evict_to_budget(&[id.as_str()]);
        self.manifest.save(&self.manifest_path)?;

        Ok(Some(entry))
    }

    /// Record an externally discovered entry (local install scan).
    pub fn register(&mut self, entry: CacheEntry) -> Result<()> {
        self.manifest
            .entries
            .insert(entry.source_url.clone(), entry);
        self.manifest.save(&self.manifest_path)?;
        Ok(())
    }

    /// Evict oldest-first until the blob total fits the byte budget.
    ///
    /// Entries named in `protected` are never evicted; files outside the
    /// cache directory (local-install entries) lose their manifest row but
    /// are never deleted from disk.
    pub fn evict_to_budget(&mut self, protected: &[&str]) -> usize {
        let mut evicted = 0usize;
        while self.manifest.total_bytes() > self.max_bytes {
            let Some((id, entry)) = self.manifest.oldest_entry(protected) else {
                break;
            };
            let id = id.clone();
            let path = entry.local_path.clone();

            if path.starts_with(&self.cache_dir) {
                if let Err(e) = fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %path.display(), error = %e, "failed to delete evicted blob");
                    }
                }
            }
            self.manifest.entries.remove(&id);
            evicted += 1;
            debug!(source = %id, "evicted cache entry");
        }

        if evicted > 0 {
            info!(evicted, "evicted entries to stay under cache budget");
        }
        evicted
    }

    /// The in-memory manifest (reflects the last persisted state).
    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    async fn fetch_remote(&self, spec: &HipSourceSpec) -> Result<Option<CacheEntry>> {
        let response = match self.http.get(&spec.url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(source = %spec.url, error = %e, "fetch failed");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            warn!(source = %spec.url, status = %response.status(), "non-success response");
            return Ok(None);
        }

        let mut body: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| HipError::Network {
                message: format!("Failed to read body of {}: {}", spec.url, e),
                source: Some(e),
            })?;
            body.extend_from_slice(&chunk);
        }

        let sha256 = sha256_bytes(&body);
        let file_name = name_from_url(&spec.url);
        let blob_name = format!(
            "{}-{}",
            &sha256[..PathsConfig::BLOB_HASH_PREFIX_LEN],
            sanitize_file_name(&file_name)
        );
        let local_path = self.cache_dir.join(&blob_name);

        write_blob_atomic(&local_path, &body)?;
        info!(source = %spec.url, bytes = body.len(), blob = %blob_name, "cached archive");

        Ok(Some(CacheEntry {
            source_url: spec.url.clone(),
            source: spec.source,
            local_path,
            file_name,
            sha256,
            size_bytes: body.len() as u64,
            downloaded_at: Utc::now(),
            systems: spec.systems.clone(),
            description: spec.description.clone(),
        }))
    }

    /// A pre-staged local file is referenced in place, never copied.
    fn stat_local(&self, spec: &HipSourceSpec) -> Result<Option<CacheEntry>> {
        let path = PathBuf::from(&spec.url);
        if !path.is_file() {
            warn!(source = %spec.url, "local source missing");
            return Ok(None);
        }

        let sha256 = super::hashing::sha256_file(&path)?;
        let size_bytes = fs::metadata(&path)
            .map_err(|e| HipError::io_with_path(e, &path))?
            .len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive.hip".to_string());

        Ok(Some(CacheEntry {
            source_url: spec.url.clone(),
            source: spec.source,
            local_path: path,
            file_name,
            sha256,
            size_bytes,
            downloaded_at: Utc::now(),
            systems: spec.systems.clone(),
            description: spec.description.clone(),
        }))
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Last path segment of the URL, or a generic fallback.
fn name_from_url(raw: &str) -> String {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "archive.hip".to_string())
}

/// Replace anything outside `[A-Za-z0-9._-]` and cap the length.
fn sanitize_file_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    out.truncate(PathsConfig::BLOB_NAME_MAX_BYTES);
    out
}

/// Blob writes go through a temp file so the final name only ever names
/// complete content.
fn write_blob_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("part");
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| HipError::io_with_path(e, &temp_path))?;
        file.write_all(bytes)
            .map_err(|e| HipError::io_with_path(e, &temp_path))?;
        file.sync_all()
            .map_err(|e| HipError::io_with_path(e, &temp_path))?;
    }
    fs::rename(&temp_path, path).map_err(|e| HipError::io_with_path(e, path))?;
    Ok(())
}
