//! hipkb - Headless library for Houdini scene ingestion.
//!
//! This crate reads gzip-wrapped CPIO `.hip` archives, reconstructs the node
//! tree with parameters, flags, and connections, caches source archives
//! content-addressed by SHA-256, and aggregates per-parameter statistics in
//! a SQLite knowledge store.
//!
//! # Example
//!
//! ```rust,no_run
//! use hipkb_library::{HipKbApi, HipSource, HipSourceSpec, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> hipkb_library::Result<()> {
//!     let mut api = HipKbApi::open(IngestConfig::from_env())?;
//!
//!     let specs = vec![HipSourceSpec::new(
//!         "https://example.com/library/pyro/fireball.hip",
//!         HipSource::ContentLibrary,
//!     )];
//!     let summary = api.ingest_batch(&specs, None).await?;
//!     println!("parsed {} archives", summary.parsed);
//!
//!     for stat in api.stats("pyrosolver::2.0", None)? {
//!         println!("{}: {:?}", stat.param_name, stat.usage_range);
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod scene;
pub mod store;

// Re-export commonly used types
pub use archive::{is_text_entry, read_archive, ArchiveEntry};
pub use cache::{scan_local_installs, CacheEntry, CacheManager};
pub use config::{HipSource, IngestConfig};
pub use error::{ArchiveFormatError, HipError, Result};
pub use models::{
    ExtractionResult, HipFileRecord, HipSourceSpec, IngestSummary, ParamUsageStats, ParseStatus,
};
pub use scene::{parse, Connection, Node, NodeCategory, ParamValue, Parameter, Scene};
pub use store::KnowledgeStore;

use tracing::{info, warn};

/// Per-archive progress callback: `(done, total, identifier)`.
pub type ProgressFn = dyn Fn(usize, usize, &str) + Send + Sync;

/// Main entry point wiring the cache and the knowledge store together.
///
/// The pipeline is sequential: one archive is acquired, parsed, and
/// extracted to completion before the next begins, which keeps peak memory
/// at one decompressed archive and makes the batch spacing trivial.
pub struct HipKbApi {
    config: IngestConfig,
    cache: CacheManager,
    store: KnowledgeStore,
}

impl HipKbApi {
    /// Open the cache directory and knowledge store described by `config`.
    pub fn open(config: IngestConfig) -> Result<Self> {
        let cache = CacheManager::open(&config)?;
        let store = KnowledgeStore::open(KnowledgeStore::default_path(&config.cache_dir))?;
        Ok(Self {
            config,
            cache,
            store,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Parse a raw archive buffer into a [`Scene`].
    pub fn parse(&self, bytes: &[u8]) -> Result<Scene> {
        Ok(scene::parse(bytes)?)
    }

    /// Acquire one source into the cache. `None` is a miss.
    pub async fn acquire(&mut self, spec: &HipSourceSpec) -> Result<Option<CacheEntry>> {
        self.cache.acquire(spec).await
    }

    /// Persist a parsed scene for a cached archive.
    pub fn extract(&self, scene: &Scene, entry: &CacheEntry) -> Result<ExtractionResult> {
        self.store.extract(scene, entry)
    }

    /// Aggregate statistics for one node type, optionally one parameter.
    pub fn stats(
        &self,
        node_type: &str,
        param_name: Option<&str>,
    ) -> Result<Vec<ParamUsageStats>> {
        self.store.stats(node_type, param_name)
    }

    /// Discover `.hip` files shipped with local Houdini installs and track
    /// them in the manifest without copying.
    pub fn scan_local_installs(&mut self) -> Result<Vec<CacheEntry>> {
        let entries = scan_local_installs(&self.config)?;
        for entry in &entries {
            self.cache.register(entry.clone())?;
        }
        Ok(entries)
    }

    /// Parse and extract one cached archive, recording failures on its
    /// record instead of propagating them.
    pub async fn ingest_cached(&self, entry: &CacheEntry) -> Result<ExtractionResult> {
        let bytes = tokio::fs::read(&entry.local_path)
            .await
            .map_err(|e| HipError::io_with_path(e, &entry.local_path))?;

        match scene::parse(&bytes) {
            Ok(scene) => self.store.extract(&scene, entry),
            Err(e) => {
                warn!(source = %entry.source_url, error = %e, "archive format failure");
                self.store.record_failure(entry, &e.to_string())?;
                Err(e.into())
            }
        }
    }

    /// Ingest a batch of sources sequentially.
    ///
    /// Outcomes are independent per archive: a miss or a format failure is
    /// counted and the batch moves on. Archives whose hash was already
    /// extracted successfully are skipped without re-parsing.
    pub async fn ingest_batch(
        &mut self,
        specs: &[HipSourceSpec],
        progress: Option<&ProgressFn>,
    ) -> Result<IngestSummary> {
        let total = specs.len();
        let mut summary = IngestSummary::default();

        for (i, spec) in specs.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.rate_limit).await;
            }

            let entry = match self.cache.acquire(spec).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    warn!(source = %spec.url, "acquisition miss");
                    summary.failed += 1;
                    report(progress, i + 1, total, &spec.url);
                    continue;
                }
                Err(e) => {
                    warn!(source = %spec.url, error = %e, "acquisition error");
                    summary.failed += 1;
                    report(progress, i + 1, total, &spec.url);
                    continue;
                }
            };

            if self.store.is_extracted(&entry.sha256)? {
                summary.skipped += 1;
                report(progress, i + 1, total, &spec.url);
                continue;
            }

            match self.ingest_cached(&entry).await {
                Ok(result) => {
                    summary.parsed += 1;
                    summary.snapshot_rows += result.parameters;
                }
                Err(e) => {
                    if !e.is_format_failure() {
                        warn!(source = %spec.url, error = %e, "extraction failure");
                        let _ = self.store.record_failure(&entry, &e.to_string());
                    }
                    summary.failed += 1;
                }
            }
            report(progress, i + 1, total, &spec.url);
        }

        info!(
            parsed = summary.parsed,
            failed = summary.failed,
            skipped = summary.skipped,
            snapshots = summary.snapshot_rows,
            "batch complete"
        );
        Ok(summary)
    }
}

fn report(progress: Option<&ProgressFn>, done: usize, total: usize, identifier: &str) {
    if let Some(callback) = progress {
        callback(done, total, identifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> IngestConfig {
        IngestConfig {
            cache_dir: dir.path().join("cache"),
            cache_max_bytes: u64::MAX,
            rate_limit: Duration::from_millis(0),
            install_roots: vec![],
        }
    }

    #[test]
    fn test_api_open_creates_layout() {
        let dir = TempDir::new().unwrap();
        let api = HipKbApi::open(test_config(&dir)).unwrap();
        assert!(api.config().cache_dir.exists());
        assert!(KnowledgeStore::default_path(&api.config().cache_dir).exists());
    }

    #[tokio::test]
    async fn test_batch_with_missing_sources_records_failures() {
        let dir = TempDir::new().unwrap();
        let mut api = HipKbApi::open(test_config(&dir)).unwrap();

        let specs = vec![
            HipSourceSpec::new(
                dir.path().join("absent_a.hip").to_string_lossy(),
                HipSource::Examples,
            ),
            HipSourceSpec::new(
                dir.path().join("absent_b.hip").to_string_lossy(),
                HipSource::Examples,
            ),
        ];

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let progress = move |done: usize, total: usize, id: &str| {
            seen_clone.lock().unwrap().push((done, total, id.to_string()));
        };
        let summary = api.ingest_batch(&specs, Some(&progress)).await.unwrap();

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.parsed, 0);
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 1);
        assert_eq!(seen[1], (2, 2, specs[1].url.clone()));
    }
}
