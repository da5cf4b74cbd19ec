//! Query-time aggregation over parameter snapshots.

use super::KnowledgeStore;
use crate::error::Result;
use crate::models::ParamUsageStats;
use regex::Regex;
use rusqlite::params;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Values that feed statistics: optional sign, digits, optional fraction.
static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+(?:\.\d+)?$").expect("numeric regex must compile"));

/// Fraction trimmed off each end of the observed span.
const USAGE_TRIM: f64 = 0.1;

/// Parameters need at least this many numeric samples to be reported.
const MIN_SAMPLES: usize = 2;

impl KnowledgeStore {
    /// Aggregate numeric snapshots for one node type, optionally narrowed to
    /// a single parameter name.
    ///
    /// Parameters with fewer than two usable samples are omitted; the
    /// reported usage range is the observed span trimmed by 10% at each end.
    pub fn stats(
        &self,
        node_type: &str,
        param_name: Option<&str>,
    ) -> Result<Vec<ParamUsageStats>> {
        let conn = self.lock_conn()?;

        let mut grouped: BTreeMap<String, Vec<(f64, bool)>> = BTreeMap::new();
        {
            let mut collect = |name: String, value: String, is_default: bool| {
                if NUMERIC_RE.is_match(value.trim()) {
                    if let Ok(parsed) = value.trim().parse::<f64>() {
                        grouped.entry(name).or_default().push((parsed, is_default));
                    }
                }
            };

            match param_name {
                Some(param) => {
                    let mut stmt = conn.prepare(
                        "SELECT param_name, param_value, is_default FROM param_snapshots
                         WHERE node_type = ?1 AND param_name = ?2",
                    )?;
                    let rows = stmt.query_map(params![node_type, param], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, bool>(2)?))
                    })?;
                    for row in rows {
                        let (name, value, is_default) = row?;
                        collect(name, value, is_default);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT param_name, param_value, is_default FROM param_snapshots
                         WHERE node_type = ?1",
                    )?;
                    let rows = stmt.query_map(params![node_type], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, bool>(2)?))
                    })?;
                    for row in rows {
                        let (name, value, is_default) = row?;
                        collect(name, value, is_default);
                    }
                }
            }
        }

        let stats = grouped
            .into_iter()
            .filter(|(_, samples)| samples.len() >= MIN_SAMPLES)
            .map(|(name, samples)| summarize(node_type, name, &samples))
            .collect();

        Ok(stats)
    }
}

fn summarize(node_type: &str, param_name: String, samples: &[(f64, bool)]) -> ParamUsageStats {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut modified_count = 0usize;

    for &(value, is_default) in samples {
        min = min.min(value);
        max = max.max(value);
        sum += value;
        if !is_default {
            modified_count += 1;
        }
    }

    let mean = sum / samples.len() as f64;
    let span = max - min;
    let usage_range = (
        (min + USAGE_TRIM * span).clamp(min, max),
        (max - USAGE_TRIM * span).clamp(min, max),
    );

    ParamUsageStats {
        node_type: node_type.to_string(),
        param_name,
        sample_count: samples.len(),
        min,
        max,
        mean,
        modified_count,
        usage_range,
    }
}
