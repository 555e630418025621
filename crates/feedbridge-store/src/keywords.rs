use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::db::init_db;
use crate::error::Result;

/// Keyword → reply value map consulted by keyword alerts.
///
/// Async so network-backed stores fit behind the same seam; the SQLite
/// implementation answers immediately.
#[async_trait]
pub trait KeywordStore: Send + Sync {
    async fn get_all(&self) -> Result<HashMap<String, String>>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Insert only when `key` is absent. Returns whether a row was written.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool>;
    /// Returns whether a row was removed.
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn list_keys(&self) -> Result<BTreeSet<String>>;
}

pub struct SqliteKeywordStore {
    db: Mutex<Connection>,
}

impl SqliteKeywordStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl KeywordStore for SqliteKeywordStore {
    async fn get_all(&self) -> Result<HashMap<String, String>> {
        let db = self.db.lock().expect("keyword store mutex poisoned");
        let mut stmt = db.prepare("SELECT name, value FROM keywords")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().expect("keyword store mutex poisoned");
        Ok(db
            .query_row(
                "SELECT value FROM keywords WHERE name = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?)
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let db = self.db.lock().expect("keyword store mutex poisoned");
        let now = chrono::Utc::now().to_rfc3339();
        let n = db.execute(
            "INSERT OR IGNORE INTO keywords (name, value, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, now],
        )?;
        if n > 0 {
            info!(keyword = %key, "keyword registered");
        }
        Ok(n > 0)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let db = self.db.lock().expect("keyword store mutex poisoned");
        let n = db.execute("DELETE FROM keywords WHERE name = ?1", [key])?;
        if n > 0 {
            info!(keyword = %key, "keyword removed");
        }
        Ok(n > 0)
    }

    async fn list_keys(&self) -> Result<BTreeSet<String>> {
        let db = self.db.lock().expect("keyword store mutex poisoned");
        let mut stmt = db.prepare("SELECT name FROM keywords")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}
