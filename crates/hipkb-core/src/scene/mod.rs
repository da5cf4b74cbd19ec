//! Scene reconstruction from HIP archive members.
//!
//! The stanza format inside a HIP file has no published grammar and varies
//! across Houdini releases, so the parser is lenient by design: malformed
//! constructs are dropped and a partial [`Scene`] is always produced. Only
//! the outer container can fail.

mod category;
mod header;
mod parser;
mod value;

pub use category::NodeCategory;
pub use value::ParamValue;

use crate::archive::{is_text_entry, read_archive, ArchiveEntry};
use crate::error::ArchiveFormatError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The result of parsing one archive. Transient, scoped to one parse call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Houdini version string; empty when the archive does not record one.
    pub hip_version: String,
    /// Save timestamp as recorded in the file; empty when absent.
    pub save_time: String,
    /// Freeform header metadata, last write wins.
    pub metadata: BTreeMap<String, String>,
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
}

/// One node reconstructed from a stanza entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Absolute path of the form `/seg1/seg2/...`.
    pub path: String,
    /// Type identifier, possibly carrying a `::version` suffix.
    pub node_type: String,
    pub category: NodeCategory,
    /// Local name: the last path segment.
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub flags: BTreeMap<String, bool>,
}

/// One parameter of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    pub value: ParamValue,
    pub is_default: bool,
    pub expression: Option<String>,
    pub channel_ref: Option<String>,
}

impl Parameter {
    /// Attach an expression; an expressed parameter is never at its default.
    pub fn set_expression(&mut self, expr: impl Into<String>) {
        self.expression = Some(expr.into());
        self.is_default = false;
    }
}

impl Default for Parameter {
    fn default() -> Self {
        Self {
            name: String::new(),
            value: ParamValue::Text(String::new()),
            is_default: true,
            expression: None,
            channel_ref: None,
        }
    }
}

/// A directed edge between two node connectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub from_path: String,
    pub from_output: u32,
    pub to_path: String,
    pub to_input: u32,
}

/// Parse a raw HIP buffer into a [`Scene`].
///
/// The only failure surface is the outer container; stanza-level damage is
/// absorbed into a partial result.
pub fn parse(bytes: &[u8]) -> Result<Scene, ArchiveFormatError> {
    let entries = read_archive(bytes)?;
    let text_entries: Vec<ArchiveEntry> =
        entries.into_iter().filter(is_text_entry).collect();
    Ok(parser::parse_entries(&text_entries))
}

/// Parse already-extracted text entries. Never fails.
pub fn parse_entries(entries: &[ArchiveEntry]) -> Scene {
    parser::parse_entries(entries)
}
