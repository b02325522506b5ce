//! SQLite-backed segment index.
//!
//! Opens an existing table read-only and computes distances in Rust. Vectors
//! are stored as BLOBs of little-endian `f32`.

use super::{check_limit, rank, DistanceMetric, SearchResult, SegmentRecord, VectorIndex};
use crate::error::{HarkError, Result};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const REQUIRED_COLUMNS: [&str; 4] = ["id", "vector", "text", "audio_file"];

/// Read-only segment index stored in a SQLite table.
pub struct SqliteSegmentIndex {
    conn: Arc<Mutex<Connection>>,
    table: String,
    metric: DistanceMetric,
}

fn unavailable(e: rusqlite::Error) -> HarkError {
    HarkError::IndexUnavailable(e.to_string())
}

impl SqliteSegmentIndex {
    /// Open `table` in the database at `path`.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path, table: &str, metric: DistanceMetric) -> Result<Self> {
        if !path.is_file() {
            return Err(HarkError::IndexUnavailable(format!(
                "database file not found: {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(unavailable)?;

        Self::from_connection(conn, table, metric)
    }

    /// Wrap an already-open connection, validating the table layout.
    pub fn from_connection(conn: Connection, table: &str, metric: DistanceMetric) -> Result<Self> {
        validate_table_name(table)?;

        // Also the first real read, so a corrupt file fails here.
        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .map_err(unavailable)?;

        if exists == 0 {
            return Err(HarkError::IndexNotFound(table.to_string()));
        }

        let columns: Vec<String> = {
            let mut stmt = conn
                .prepare(&format!("PRAGMA table_info({})", table))
                .map_err(unavailable)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(1))
                .map_err(unavailable)?;
            let columns = rows
                .collect::<std::result::Result<Vec<String>, _>>()
                .map_err(unavailable)?;
            columns
        };

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !columns.iter().any(|have| have.eq_ignore_ascii_case(c)))
            .collect();

        if !missing.is_empty() {
            return Err(HarkError::IndexUnavailable(format!(
                "table '{}' is missing columns: {}",
                table,
                missing.join(", ")
            )));
        }

        info!("Opened segment table '{}' ({} metric)", table, metric);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: table.to_string(),
            metric,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        lock(&self.conn)
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return None;
        }

        Some(
            bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }

    fn decode_vector(id: &str, bytes: &[u8]) -> Result<Vec<f32>> {
        Self::bytes_to_embedding(bytes).ok_or_else(|| {
            HarkError::IndexUnavailable(format!(
                "segment '{}' has a malformed vector ({} bytes)",
                id,
                bytes.len()
            ))
        })
    }

    fn decode_row(row: &Row<'_>) -> rusqlite::Result<(String, Vec<u8>, String, String)> {
        let id = match row.get::<_, Value>(0)? {
            Value::Text(s) => s,
            Value::Integer(i) => i.to_string(),
            other => {
                return Err(rusqlite::Error::InvalidColumnType(
                    0,
                    "id".to_string(),
                    other.data_type(),
                ))
            }
        };
        Ok((id, row.get(1)?, row.get(2)?, row.get(3)?))
    }

    fn load_segments(conn: &Connection, table: &str) -> Result<Vec<SegmentRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, vector, text, audio_file FROM {} ORDER BY rowid",
                table
            ))
            .map_err(unavailable)?;

        let rows = stmt.query_map([], Self::decode_row).map_err(unavailable)?;

        let mut segments = Vec::new();
        for row in rows {
            let (id, bytes, text, audio_file) = row.map_err(unavailable)?;
            let vector = Self::decode_vector(&id, &bytes)?;
            segments.push(SegmentRecord {
                id,
                vector,
                text,
                audio_file,
            });
        }

        Ok(segments)
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| HarkError::IndexUnavailable(format!("Failed to acquire lock: {}", e)))
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(HarkError::InvalidArgument(format!(
            "invalid table name: '{}'",
            table
        )))
    }
}

#[async_trait]
impl VectorIndex for SqliteSegmentIndex {
    #[instrument(skip(self, vector), fields(table = %self.table))]
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        check_limit(limit)?;

        let conn = Arc::clone(&self.conn);
        let table = self.table.clone();
        let metric = self.metric;
        let query = vector.to_vec();

        // Full scan is blocking; keep it off the async workers.
        tokio::task::spawn_blocking(move || -> Result<Vec<SearchResult>> {
            let segments = {
                let conn = lock(&conn)?;
                Self::load_segments(&conn, &table)?
            };
            let scanned = segments.len();
            let results = rank(segments, &query, limit, metric)?;

            debug!("Scanned {} segments, returning {}", scanned, results.len());
            Ok(results)
        })
        .await
        .map_err(|e| HarkError::IndexUnavailable(format!("Search task failed: {}", e)))?
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                row.get(0)
            })
            .map_err(unavailable)?;
        Ok(count as usize)
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            &format!("SELECT id, vector, text, audio_file FROM {} ORDER BY rowid LIMIT 1", self.table),
            [],
            |row| {
                let (id, bytes, _, _) = Self::decode_row(row)?;
                Ok((id, bytes))
            },
        );

        match result {
            Ok((id, bytes)) => Ok(Some(Self::decode_vector(&id, &bytes)?.len())),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(unavailable(e)),
        }
    }

    fn name(&self) -> &str {
        &self.table
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}
