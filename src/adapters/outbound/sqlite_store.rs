//! SQLite Store
//!
//! Persists profiles, historical metrics, the active selection, and
//! quality flags in a single database file. The store owns its
//! schema and is safe to reopen.

use crate::domain::entities::{EndpointProfile, HistoricalMetrics};
use crate::domain::ports::{AffiliationStore, MetricsStore, ProfileStore, SelectionSink};
use crate::domain::value_objects::{ConnectionKind, QualityFlag};
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

const ACTIVE_KEY: &str = "active_proxy";

/// SQLite-backed store.
///
/// One connection guarded by a mutex: the selector writes
/// sequentially, so contention is not a concern, and every metrics
/// update is a single statement and therefore atomic.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                 id    TEXT PRIMARY KEY,
                 label TEXT NOT NULL,
                 kind  TEXT NOT NULL,
                 host  TEXT NOT NULL,
                 port  TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS metrics (
                 id                  TEXT PRIMARY KEY,
                 avg_rtt_ms          INTEGER NOT NULL,
                 avg_jitter_ms       INTEGER NOT NULL,
                 avg_throughput_kbps INTEGER NOT NULL,
                 success_count       INTEGER NOT NULL,
                 failure_count       INTEGER NOT NULL,
                 last_update_ms      INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS kv (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )?;
        Ok(())
    }

    fn row_to_profile(row: &Row) -> rusqlite::Result<EndpointProfile> {
        Ok(EndpointProfile {
            label: row.get(0)?,
            kind: ConnectionKind::from_str(&row.get::<_, String>(1)?),
            host: row.get(2)?,
            port: row.get(3)?,
        })
    }

    fn row_to_metrics(row: &Row) -> rusqlite::Result<HistoricalMetrics> {
        Ok(HistoricalMetrics {
            avg_rtt_ms: row.get(0)?,
            avg_jitter_ms: row.get(1)?,
            avg_throughput_kbps: row.get(2)?,
            success_count: row.get::<_, i64>(3)? as u64,
            failure_count: row.get::<_, i64>(4)? as u64,
            last_update_ms: row.get(5)?,
        })
    }

    fn kv_get(&self, key: &str) -> Option<String> {
        self.conn
            .lock()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .ok()
            .flatten()
    }

    fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// The identifier last promoted, if any.
    pub fn active(&self) -> Option<String> {
        self.kv_get(ACTIVE_KEY)
    }
}

impl ProfileStore for SqliteStore {
    fn lookup(&self, id: &str) -> Option<EndpointProfile> {
        self.conn
            .lock()
            .query_row(
                "SELECT label, kind, host, port FROM profiles WHERE id = ?1",
                params![id],
                Self::row_to_profile,
            )
            .optional()
            .ok()
            .flatten()
    }

    fn write(&self, id: &str, profile: EndpointProfile) -> Result<String> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO profiles (id, label, kind, host, port)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                profile.label,
                profile.kind.as_str(),
                profile.host,
                profile.port
            ],
        )?;
        Ok(id.to_string())
    }

    fn candidate_ids(&self) -> Vec<String> {
        let conn = self.conn.lock();
        let mut stmt = match conn.prepare("SELECT id FROM profiles ORDER BY id") {
            Ok(stmt) => stmt,
            Err(e) => {
                tracing::error!("listing profiles failed: {}", e);
                return Vec::new();
            }
        };
        stmt.query_map([], |row| row.get(0))
            .and_then(|rows| rows.collect())
            .unwrap_or_default()
    }
}

impl MetricsStore for SqliteStore {
    fn load_metrics(&self, id: &str) -> Option<HistoricalMetrics> {
        self.conn
            .lock()
            .query_row(
                "SELECT avg_rtt_ms, avg_jitter_ms, avg_throughput_kbps,
                        success_count, failure_count, last_update_ms
                 FROM metrics WHERE id = ?1",
                params![id],
                Self::row_to_metrics,
            )
            .optional()
            .ok()
            .flatten()
    }

    fn save_metrics(&self, id: &str, metrics: &HistoricalMetrics) -> Result<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO metrics
                 (id, avg_rtt_ms, avg_jitter_ms, avg_throughput_kbps,
                  success_count, failure_count, last_update_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                metrics.avg_rtt_ms,
                metrics.avg_jitter_ms,
                metrics.avg_throughput_kbps,
                metrics.success_count as i64,
                metrics.failure_count as i64,
                metrics.last_update_ms
            ],
        )?;
        Ok(())
    }
}

impl SelectionSink for SqliteStore {
    fn set_active(&self, id: &str) -> Result<()> {
        self.kv_set(ACTIVE_KEY, id)
    }
}

impl AffiliationStore for SqliteStore {
    fn quality(&self, id: &str) -> Option<QualityFlag> {
        self.kv_get(&format!("quality:{}", id))
            .and_then(|v| QualityFlag::from_str(&v))
    }

    fn set_quality(&self, id: &str, flag: QualityFlag) {
        if let Err(e) = self.kv_set(&format!("quality:{}", id), flag.as_str()) {
            tracing::error!("recording quality flag for {} failed: {:#}", id, e);
        }
    }
}
