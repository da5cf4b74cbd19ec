//! Raw parameter value coercion.

use serde::{Deserialize, Serialize};

/// A coerced parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Float(f64),
    FloatList(Vec<f64>),
    Text(String),
}

impl ParamValue {
    /// Scalar view, when the value is a single float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Canonical text encoding used for persisted snapshots: floats via
    /// `to_string`, lists as JSON arrays, text as a JSON string.
    pub fn canonical_text(&self) -> String {
        match self {
            ParamValue::Float(f) => f.to_string(),
            ParamValue::FloatList(v) => {
                serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string())
            }
            ParamValue::Text(s) => {
                serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
            }
        }
    }
}

/// Coerce a raw stanza value string, trying float, float list, then text.
///
/// A float is accepted only when its canonical string form round-trips to
/// the trimmed input, so `1e5` or `0.30` stay textual rather than silently
/// renormalizing.
pub fn coerce(raw: &str) -> ParamValue {
    let trimmed = raw.trim();

    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() && f.to_string() == trimmed {
            return ParamValue::Float(f);
        }
    }

    if trimmed.chars().any(char::is_whitespace) {
        let floats: Option<Vec<f64>> = trimmed
            .split_whitespace()
            .map(|tok| tok.parse::<f64>().ok().filter(|f| f.is_finite()))
            .collect();
        if let Some(list) = floats {
            return ParamValue::FloatList(list);
        }
    }

    ParamValue::Text(strip_symmetric_quotes(trimmed).to_string())
}

/// Remove one leading and one trailing quote when they form a matched pair.
fn strip_symmetric_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}
