//! Persisted records and response types shared across the pipeline.

use crate::config::HipSource;
use serde::{Deserialize, Serialize};

/// Parse lifecycle of a stored archive record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    Pending,
    Success,
    Error,
}

impl ParseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStatus::Pending => "pending",
            ParseStatus::Success => "success",
            ParseStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ParseStatus::Pending),
            "success" => Some(ParseStatus::Success),
            "error" => Some(ParseStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable identity of a previously parsed archive, keyed by SHA-256.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HipFileRecord {
    pub id: i64,
    pub file_name: String,
    pub file_hash: String,
    pub source: HipSource,
    pub source_url: Option<String>,
    pub houdini_version: Option<String>,
    pub description: Option<String>,
    pub systems: Vec<String>,
    pub node_count: i64,
    pub parsed_at: Option<String>,
    pub parse_status: String,
    pub parse_error: Option<String>,
}

/// Outcome of extracting one Scene into the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    /// Nodes seen in the scene.
    pub nodes: usize,
    /// Parameter snapshots written.
    pub parameters: usize,
    /// Snapshots with a non-default value.
    pub non_default: usize,
    /// Snapshots carrying an expression.
    pub expressions: usize,
    /// Non-fatal anomalies encountered while writing rows.
    pub errors: Vec<String>,
}

/// Batch ingestion outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    /// Archives parsed and extracted this run.
    pub parsed: usize,
    /// Archives that ended in a recorded failure.
    pub failed: usize,
    /// Archives skipped because an identical hash was already extracted.
    pub skipped: usize,
    /// Total snapshot rows written this run.
    pub snapshot_rows: usize,
}

/// Per-(node_type, param_name) aggregate over numeric snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamUsageStats {
    pub node_type: String,
    pub param_name: String,
    pub sample_count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Rows where the author changed the value away from the default.
    pub modified_count: usize,
    /// Trimmed interval `[min + 0.1·span, max − 0.1·span]`, clamped.
    pub usage_range: (f64, f64),
}

/// One remote archive to ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HipSourceSpec {
    /// Download URL (or local path for pre-staged files).
    pub url: String,
    pub source: HipSource,
    #[serde(default)]
    pub systems: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl HipSourceSpec {
    pub fn new(url: impl Into<String>, source: HipSource) -> Self {
        Self {
            url: url.into(),
            source,
            systems: Vec::new(),
            description: None,
        }
    }
}
