//! Centralized configuration for the hipkb library.
//!
//! Runtime knobs come from the environment; fixed protocol constants live in
//! const-holder structs.

use std::path::PathBuf;
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    /// Fixed User-Agent carried on every outbound request.
    pub const USER_AGENT: &'static str = "hipkb-builder/0.3";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    /// Spacing between successive remote acquisitions in a batch.
    pub const ACQUIRE_SPACING: Duration = Duration::from_millis(2000);
}

/// Shared directory and file-name configuration.
pub struct PathsConfig;

impl PathsConfig {
    pub const CACHE_DIR_NAME: &'static str = ".hipkb";
    pub const MANIFEST_FILE_NAME: &'static str = "manifest.json";
    pub const DB_FILE_NAME: &'static str = "knowledge.sqlite";
    /// Blob names are `<hash[0..12]>-<sanitized original name>`.
    pub const BLOB_HASH_PREFIX_LEN: usize = 12;
    pub const BLOB_NAME_MAX_BYTES: usize = 100;
}

/// Default cache budget: 2 GiB.
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Where an archive was obtained from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HipSource {
    ContentLibrary,
    Examples,
    LocalInstall,
    Community,
}

impl HipSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HipSource::ContentLibrary => "content_library",
            HipSource::Examples => "examples",
            HipSource::LocalInstall => "local_install",
            HipSource::Community => "community",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "content_library" => Some(HipSource::ContentLibrary),
            "examples" => Some(HipSource::Examples),
            "local_install" => Some(HipSource::LocalInstall),
            "community" => Some(HipSource::Community),
            _ => None,
        }
    }
}

impl Default for HipSource {
    fn default() -> Self {
        HipSource::Community
    }
}

impl std::fmt::Display for HipSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl serde::Serialize for HipSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for HipSource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        HipSource::from_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown source class: {s}")))
    }
}

/// Runtime configuration for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Directory holding the manifest, blobs, and the knowledge store.
    pub cache_dir: PathBuf,
    /// Byte budget for cached blobs; oldest entries are evicted past this.
    pub cache_max_bytes: u64,
    /// Spacing between successive remote acquisitions.
    pub rate_limit: Duration,
    /// Candidate roots for the local Houdini-install scan.
    pub install_roots: Vec<PathBuf>,
}

impl IngestConfig {
    /// Build a configuration from the environment.
    ///
    /// Recognized variables: `CACHE_DIR`, `CACHE_MAX_BYTES`,
    /// `HOUDINI_INSTALL_PATH`, `HOUDINI_VERSION_DIRS` (path list).
    pub fn from_env() -> Self {
        let cache_dir = std::env::var_os("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_cache_dir);

        let cache_max_bytes = std::env::var("CACHE_MAX_BYTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_CACHE_MAX_BYTES);

        let mut install_roots = Self::conventional_install_roots();
        if let Some(path) = std::env::var_os("HOUDINI_INSTALL_PATH") {
            install_roots.insert(0, PathBuf::from(path));
        }
        if let Some(list) = std::env::var_os("HOUDINI_VERSION_DIRS") {
            install_roots.extend(std::env::split_paths(&list));
        }

        Self {
            cache_dir,
            cache_max_bytes,
            rate_limit: NetworkConfig::ACQUIRE_SPACING,
            install_roots,
        }
    }

    /// User-scoped hidden cache directory, e.g. `~/.hipkb/cache`.
    pub fn default_cache_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(PathsConfig::CACHE_DIR_NAME)
            .join("cache")
    }

    /// Conventional Houdini install locations checked by the local scan.
    fn conventional_install_roots() -> Vec<PathBuf> {
        let mut roots = vec![
            PathBuf::from("/opt"),
            PathBuf::from("/Applications/Houdini"),
            PathBuf::from("C:\\Program Files\\Side Effects Software"),
        ];
        if let Some(home) = dirs::home_dir() {
            roots.push(home.join("houdini"));
        }
        roots
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            cache_dir: Self::default_cache_dir(),
            cache_max_bytes: DEFAULT_CACHE_MAX_BYTES,
            rate_limit: NetworkConfig::ACQUIRE_SPACING,
            install_roots: Self::conventional_install_roots(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_roundtrip() {
        for source in [
            HipSource::ContentLibrary,
            HipSource::Examples,
            HipSource::LocalInstall,
            HipSource::Community,
        ] {
            let s = source.as_str();
            let parsed = HipSource::from_str(s).expect("should parse");
            assert_eq!(source, parsed);
        }
    }

    #[test]
    fn test_source_serde_wire_form() {
        let json = serde_json::to_string(&HipSource::ContentLibrary).unwrap();
        assert_eq!(json, "\"content_library\"");
        let back: HipSource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, HipSource::ContentLibrary);
    }

    #[test]
    fn test_default_budget_is_two_gib() {
        assert_eq!(DEFAULT_CACHE_MAX_BYTES, 2_147_483_648);
        assert_eq!(IngestConfig::default().cache_max_bytes, DEFAULT_CACHE_MAX_BYTES);
    }

    #[test]
    fn test_acquire_spacing_is_fixed() {
        assert_eq!(NetworkConfig::ACQUIRE_SPACING, Duration::from_millis(2000));
    }
}
