//! Local Houdini-install scan.
//!
//! Shipped example scenes are referenced in place; nothing is copied into
//! the cache directory. Identity is still the SHA-256 of the bytes, so a
//! scanned file and its downloaded twin dedupe in the store.

use super::hashing::sha256_file;
use super::manifest::CacheEntry;
use crate::config::{HipSource, IngestConfig};
use crate::error::Result;
use chrono::Utc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Simulation-system tags and the path substrings that imply them.
const SYSTEM_HINTS: [(&str, &[&str]); 4] = [
    ("pyro", &["pyro", "fire", "smoke"]),
    ("rbd", &["rbd", "fracture", "bullet"]),
    ("flip", &["flip", "fluid", "ocean"]),
    ("vellum", &["vellum", "cloth", "hair"]),
];

/// Tag a scene with the simulation systems its path suggests.
pub fn infer_systems(path: &str) -> Vec<String> {
    let lower = path.to_lowercase();
    SYSTEM_HINTS
        .iter()
        .filter(|(_, hints)| hints.iter().any(|hint| lower.contains(hint)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

/// Enumerate `.hip` / `.hipnc` files under the configured install roots.
pub fn scan_local_installs(config: &IngestConfig) -> Result<Vec<CacheEntry>> {
    let mut found = Vec::new();

    for root in &config.install_roots {
        if !root.is_dir() {
            continue;
        }
        debug!(root = %root.display(), "scanning install root");

        for dir_entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !dir_entry.file_type().is_file() {
                continue;
            }
            let file_name = dir_entry.file_name().to_string_lossy().into_owned();
            if !(file_name.ends_with(".hip") || file_name.ends_with(".hipnc")) {
                continue;
            }

            let path = dir_entry.path();
            let sha256 = match sha256_file(path) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable scene");
                    continue;
                }
            };
            let size_bytes = dir_entry.metadata().map(|m| m.len()).unwrap_or(0);
            let path_text = path.to_string_lossy();

            found.push(CacheEntry {
                source_url: path_text.clone().into_owned(),
                source: HipSource::LocalInstall,
                local_path: path.to_path_buf(),
                file_name,
                sha256,
                size_bytes,
                downloaded_at: Utc::now(),
                systems: infer_systems(&path_text),
                description: None,
            });
        }
    }

    info!(count = found.len(), "local install scan complete");
    Ok(found)
}
