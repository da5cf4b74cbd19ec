//! Scene → store extraction.
//!
//! Each archive is written inside a single transaction: upsert the file
//! record, drop its previous snapshots, insert the new ones. Replaying an
//! archive therefore replaces its snapshots as a unit.

use super::KnowledgeStore;
use crate::cache::CacheEntry;
use crate::error::Result;
use crate::models::{ExtractionResult, ParseStatus};
use crate::scene::Scene;
use chrono::Utc;
use rusqlite::params;
use tracing::{debug, warn};

impl KnowledgeStore {
    /// Persist a parsed scene for the archive behind `entry`.
    pub fn extract(&self, scene: &Scene, entry: &CacheEntry) -> Result<ExtractionResult> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let systems = serde_json::to_string(&entry.systems)?;
        let now = Utc::now().to_rfc3339();
        let version = if scene.hip_version.is_empty() {
            None
        } else {
            Some(scene.hip_version.as_str())
        };

        tx.execute(
            "
            INSERT INTO hip_files
                (file_name, file_hash, source, source_url, houdini_version, description,
                 systems, node_count, parsed_at, parse_status, parse_error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, NULL)
            ON CONFLICT(file_hash) DO UPDATE SET
                houdini_version = excluded.houdini_version,
                node_count = excluded.node_count,
                parsed_at = excluded.parsed_at,
                parse_status = excluded.parse_status,
                parse_error = NULL
            ",
            params![
                entry.file_name,
                entry.sha256,
                entry.source.as_str(),
                entry.source_url,
                version,
                entry.description,
                systems,
                scene.nodes.len() as i64,
                now,
                ParseStatus::Success.as_str(),
            ],
        )?;

        let hip_file_id: i64 = tx.query_row(
            "SELECT id FROM hip_files WHERE file_hash = ?1",
            params![entry.sha256],
            |row| row.get(0),
        )?;

        tx.execute(
            "DELETE FROM param_snapshots WHERE hip_file_id = ?1",
            params![hip_file_id],
        )?;

        let mut result = ExtractionResult {
            nodes: scene.nodes.len(),
            ..Default::default()
        };

        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO param_snapshots
                    (hip_file_id, node_type, node_path, param_name, param_value,
                     is_default, expression)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )?;

            for node in &scene.nodes {
                for param in &node.parameters {
                    let insert = stmt.execute(params![
                        hip_file_id,
                        node.node_type,
                        node.path,
                        param.name,
                        param.value.canonical_text(),
                        param.is_default,
                        param.expression,
                    ]);
                    match insert {
                        Ok(_) => {
                            result.parameters += 1;
                            if !param.is_default {
                                result.non_default += 1;
                            }
                            if param.expression.is_some() {
                                result.expressions += 1;
                            }
                        }
                        Err(e) => {
                            warn!(node = %node.path, param = %param.name, error = %e,
                                  "snapshot insert failed");
                            result.errors.push(format!("{}/{}: {}", node.path, param.name, e));
                        }
                    }
                }
            }
        }

        tx.commit()?;
        debug!(
            hash = %entry.sha256,
            nodes = result.nodes,
            snapshots = result.parameters,
            "extracted archive"
        );
        Ok(result)
    }

    /// Record a format failure for an archive; its snapshots are untouched.
    pub fn record_failure(&self, entry: &CacheEntry, message: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        let systems = serde_json::to_string(&entry.systems)?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "
            INSERT INTO hip_files
                (file_name, file_hash, source, source_url, description,
                 systems, parsed_at, parse_status, parse_error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(file_hash) DO UPDATE SET
                parsed_at = excluded.parsed_at,
                parse_status = excluded.parse_status,
                parse_error = excluded.parse_error
            ",
            params![
                entry.file_name,
                entry.sha256,
                entry.source.as_str(),
                entry.source_url,
                entry.description,
                systems,
                now,
                ParseStatus::Error.as_str(),
                message,
            ],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HipSource;
    use crate::scene::{self, Node, NodeCategory, ParamValue, Parameter};
    use std::collections::BTreeMap;

    fn test_entry(hash: &str) -> CacheEntry {
        CacheEntry {
            source_url: "https://example.com/scene.hip".into(),
            source: HipSource::ContentLibrary,
            local_path: "/tmp/scene.hip".into(),
            file_name: "scene.hip".into(),
            sha256: hash.into(),
            size_bytes: 123,
            downloaded_at: Utc::now(),
            systems: vec!["pyro".into()],
            description: None,
        }
    }

    fn test_scene() -> Scene {
        let param_default = Parameter {
            name: "dissipation".into(),
            value: ParamValue::Float(0.05),
            ..Default::default()
        };

        let mut param_expr = Parameter {
            name: "cooling_rate".into(),
            value: ParamValue::Float(0.3),
            ..Default::default()
        };
        param_expr.set_expression("$F * 0.01");

        Scene {
            hip_version: "20.5.332".into(),
            save_time: String::new(),
            metadata: BTreeMap::new(),
            nodes: vec![Node {
                path: "/obj/geo1/pyro1".into(),
                node_type: "pyrosolver::2.0".into(),
                category: NodeCategory::Dop,
                name: "pyro1".into(),
                parameters: vec![param_default, param_expr],
                flags: BTreeMap::new(),
            }],
            connections: vec![],
        }
    }

    #[test]
    fn test_extract_writes_record_and_snapshots() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let entry = test_entry(&"a".repeat(64));
        let scene = test_scene();

        let result = store.extract(&scene, &entry).unwrap();
        assert_eq!(result.nodes, 1);
        assert_eq!(result.parameters, 2);
        assert_eq!(result.non_default, 1);
        assert_eq!(result.expressions, 1);
        assert!(result.errors.is_empty());

        let record = store.get_record(&entry.sha256).unwrap().unwrap();
        assert_eq!(record.parse_status, "success");
        assert_eq!(record.node_count, 1);
        assert_eq!(record.houdini_version.as_deref(), Some("20.5.332"));
        assert_eq!(record.systems, vec!["pyro"]);
        assert!(store.is_extracted(&entry.sha256).unwrap());

        let rows = store.snapshots_for(&entry.sha256).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].param_name, "dissipation");
        assert_eq!(rows[0].param_value, "0.05");
        assert!(rows[0].is_default);
        assert_eq!(rows[1].expression.as_deref(), Some("$F * 0.01"));
    }

    #[test]
    fn test_re_extract_replaces_snapshots_as_a_unit() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let entry = test_entry(&"b".repeat(64));
        let scene = test_scene();

        store.extract(&scene, &entry).unwrap();
        let first = store.snapshots_for(&entry.sha256).unwrap();

        store.extract(&scene, &entry).unwrap();
        let second = store.snapshots_for(&entry.sha256).unwrap();

        // Identical bytes produce an identical snapshot multiset.
        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_record_failure_keeps_snapshots() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let entry = test_entry(&"c".repeat(64));

        store.extract(&test_scene(), &entry).unwrap();
        store
            .record_failure(&entry, "no CPIO magic found in archive head")
            .unwrap();

        let record = store.get_record(&entry.sha256).unwrap().unwrap();
        assert_eq!(record.parse_status, "error");
        assert_eq!(
            record.parse_error.as_deref(),
            Some("no CPIO magic found in archive head")
        );
        // Snapshots from the earlier success are untouched.
        assert_eq!(store.snapshots_for(&entry.sha256).unwrap().len(), 2);
        assert!(!store.is_extracted(&entry.sha256).unwrap());
    }

    #[test]
    fn test_empty_scene_extracts_cleanly() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let entry = test_entry(&"d".repeat(64));
        let result = store.extract(&scene::Scene::default(), &entry).unwrap();
        assert_eq!(result.nodes, 0);
        assert_eq!(result.parameters, 0);
        assert!(store.is_extracted(&entry.sha256).unwrap());
    }
}
