//! SQLite knowledge store for parsed archives and parameter snapshots.

mod extract;
mod stats;

use crate::config::HipSource;
use crate::error::{HipError, Result};
use crate::models::HipFileRecord;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Store of HIP file records and parameter snapshots.
///
/// Thread-safe via an internal mutex on the connection; every mutation runs
/// inside its own transaction so one archive's failure never leaks into the
/// next.
pub struct KnowledgeStore {
    conn: Arc<Mutex<Connection>>,
}

impl KnowledgeStore {
    /// Create or open the store at the given database path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| HipError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        Self::configure_connection(&conn)?;
        Self::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA busy_timeout=30000;
            PRAGMA synchronous=NORMAL;
            ",
        )?;
        Ok(())
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS hip_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_name TEXT NOT NULL,
                file_hash TEXT NOT NULL UNIQUE,
                source TEXT NOT NULL,
                source_url TEXT,
                houdini_version TEXT,
                description TEXT,
                systems TEXT NOT NULL DEFAULT '[]',
                node_count INTEGER NOT NULL DEFAULT 0,
                parsed_at TEXT,
                parse_status TEXT NOT NULL DEFAULT 'pending',
                parse_error TEXT
            );

            CREATE TABLE IF NOT EXISTS param_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hip_file_id INTEGER NOT NULL REFERENCES hip_files(id),
                node_type TEXT NOT NULL,
                node_path TEXT NOT NULL,
                param_name TEXT NOT NULL,
                param_value TEXT NOT NULL,
                is_default INTEGER NOT NULL,
                expression TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_node_type
                ON param_snapshots(node_type);
            CREATE INDEX IF NOT EXISTS idx_snapshots_param_name
                ON param_snapshots(param_name);
            ",
        )?;
        Ok(())
    }

    pub(crate) fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| HipError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    /// Fetch the record for an archive hash, if any.
    pub fn get_record(&self, file_hash: &str) -> Result<Option<HipFileRecord>> {
        let conn = self.lock_conn()?;

        let row = conn
            .query_row(
                "
                SELECT id, file_name, file_hash, source, source_url, houdini_version,
                       description, systems, node_count, parsed_at, parse_status, parse_error
                FROM hip_files WHERE file_hash = ?1
                ",
                params![file_hash],
                |row| {
                    let source_text: String = row.get(3)?;
                    let systems_text: String = row.get(7)?;
                    Ok(HipFileRecord {
                        id: row.get(0)?,
                        file_name: row.get(1)?,
                        file_hash: row.get(2)?,
                        source: HipSource::from_str(&source_text).unwrap_or_default(),
                        source_url: row.get(4)?,
                        houdini_version: row.get(5)?,
                        description: row.get(6)?,
                        systems: serde_json::from_str(&systems_text).unwrap_or_default(),
                        node_count: row.get(8)?,
                        parsed_at: row.get(9)?,
                        parse_status: row.get(10)?,
                        parse_error: row.get(11)?,
                    })
                },
            )
            .optional()?;

        Ok(row)
    }

    /// Whether an identical archive was already extracted successfully.
    ///
    /// Checked before re-parsing so an unchanged archive is a no-op.
    pub fn is_extracted(&self, file_hash: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT parse_status FROM hip_files WHERE file_hash = ?1",
                params![file_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.as_deref() == Some("success"))
    }

    /// Snapshot rows for one archive, in document order. Used by tests and
    /// re-parse auditing.
    pub fn snapshots_for(&self, file_hash: &str) -> Result<Vec<SnapshotRow>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "
            SELECT s.node_path, s.param_name, s.param_value, s.is_default, s.expression
            FROM param_snapshots s
            JOIN hip_files f ON f.id = s.hip_file_id
            WHERE f.file_hash = ?1
            ORDER BY s.id
            ",
        )?;
        let rows = stmt
            .query_map(params![file_hash], |row| {
                Ok(SnapshotRow {
                    node_path: row.get(0)?,
                    param_name: row.get(1)?,
                    param_value: row.get(2)?,
                    is_default: row.get(3)?,
                    expression: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Database location helper for a cache directory.
    pub fn default_path(cache_dir: &Path) -> PathBuf {
        cache_dir.join(crate::config::PathsConfig::DB_FILE_NAME)
    }
}

/// One persisted parameter snapshot, as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotRow {
    pub node_path: String,
    pub param_name: String,
    pub param_value: String,
    pub is_default: bool,
    pub expression: Option<String>,
}
