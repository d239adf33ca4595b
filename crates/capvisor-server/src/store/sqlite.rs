// SPDX-License-Identifier: Apache-2.0

use super::{StoreError, UserRecord};
use capvisor_api::GenerationLogEntry;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  email TEXT UNIQUE NOT NULL,
  password_hash TEXT NOT NULL,
  created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE TABLE IF NOT EXISTS generation_logs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id INTEGER REFERENCES users(id),
  params TEXT,
  topic TEXT,
  stream TEXT,
  created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_generation_logs_created_at ON generation_logs(created_at);
";

/// Users and the shared generation history, in one SQLite file. Statements run on the
/// blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError(format!("open {}: {e}", path.display())))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            op(&guard)
        })
        .await
        .map_err(|e| StoreError(format!("store task: {e}")))?
    }

    pub async fn ensure_tables(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| Ok(conn.execute_batch(SCHEMA)?)).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, email, password_hash FROM users WHERE email = ?1",
                    params![email],
                    |row| {
                        Ok(UserRecord {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            password_hash: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    /// Inserts a user unless the email exists; returns whether a row was written.
    pub async fn insert_user(&self, email: &str, password_hash: &str) -> Result<bool, StoreError> {
        let (email, password_hash) = (email.to_string(), password_hash.to_string());
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO users(email, password_hash) VALUES (?1, ?2)",
                params![email, password_hash],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    pub async fn append_generation_log<P, T, S>(
        &self,
        user_id: i64,
        params: &P,
        topic: &T,
        stream: &S,
    ) -> Result<i64, StoreError>
    where
        P: Serialize + ?Sized,
        T: Serialize + ?Sized,
        S: Serialize + ?Sized,
    {
        let encode = |what: &str, v: Result<String, serde_json::Error>| {
            v.map_err(|e| StoreError(format!("encode {what}: {e}")))
        };
        let params_json = encode("params", serde_json::to_string(params))?;
        let topic_json = encode("topic", serde_json::to_string(topic))?;
        let stream_json = encode("stream", serde_json::to_string(stream))?;
        let id = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO generation_logs(user_id, params, topic, stream) VALUES (?1, ?2, ?3, ?4)",
                    params![user_id, params_json, topic_json, stream_json],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        info!(log_id = id, user_id, "generation log appended");
        Ok(id)
    }

    /// Most recent generations across all users, newest first.
    pub async fn recent_logs(&self, limit: usize) -> Result<Vec<GenerationLogEntry>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, params, topic, stream, created_at FROM generation_logs \
                 ORDER BY created_at DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(GenerationLogEntry {
                    id: row.get(0)?,
                    params: decode_column(row.get(1)?),
                    topic: decode_column(row.get(2)?),
                    stream: decode_column(row.get(3)?),
                    created_at: row.get(4)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }
}

fn decode_column(raw: Option<String>) -> Value {
    raw.map_or(Value::Null, |text| {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    })
}
