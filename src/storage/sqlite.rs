//! SQLite storage backend
//!
//! Trades write overhead for indexed filtering and cheap counts. Filters
//! compile to parameterized SQL; `created_at` is stored as epoch
//! milliseconds so range filters and retention deletes are exact.

use super::Storage;
use crate::error::{ActivityError, Result};
use crate::query::LogQuery;
use crate::types::{Behaviour, Level, LogEntry, Payload};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS activity_log (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    owner           TEXT    NOT NULL,
    action_type     TEXT    NOT NULL,
    object_type     TEXT    NOT NULL DEFAULT '',
    behaviour       INTEGER NOT NULL,
    level           TEXT    NOT NULL,
    user_id         INTEGER NOT NULL DEFAULT 0,
    object_id       INTEGER NOT NULL DEFAULT 0,
    message         TEXT    NOT NULL,
    data            TEXT    NOT NULL,
    request_id      TEXT    NOT NULL DEFAULT '',
    request_context TEXT    NOT NULL DEFAULT '',
    created_at      INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_activity_created_at ON activity_log (created_at);
CREATE INDEX IF NOT EXISTS idx_activity_owner ON activity_log (owner, action_type);
CREATE INDEX IF NOT EXISTS idx_activity_request ON activity_log (request_id);
";

const COLUMNS: &str = "id, owner, action_type, object_type, behaviour, level, user_id, \
                       object_id, message, data, request_id, request_context, created_at";

/// Relational backend over a single SQLite connection
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (and migrate) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().map_err(|e| {
            ActivityError::storage("sqlite", format!("connection lock poisoned: {}", e))
        })?;
        f(&mut conn)
    }
}

/// Build `WHERE ...` and its parameters from a query
fn where_clause(query: &LogQuery) -> (String, Vec<Value>) {
    let mut sql = String::from(" WHERE 1=1");
    let mut params: Vec<Value> = Vec::new();

    let mut push_in = |sql: &mut String, column: &str, values: Vec<Value>| {
        if values.is_empty() {
            return;
        }
        sql.push_str(&format!(" AND {} IN (", column));
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            params.push(value);
        }
        sql.push(')');
    };

    push_in(
        &mut sql,
        "owner",
        query.owners.iter().cloned().map(Value::Text).collect(),
    );
    push_in(
        &mut sql,
        "action_type",
        query.action_types.iter().cloned().map(Value::Text).collect(),
    );
    push_in(
        &mut sql,
        "object_type",
        query.object_types.iter().cloned().map(Value::Text).collect(),
    );
    push_in(
        &mut sql,
        "behaviour",
        query
            .behaviours
            .iter()
            .map(|b| Value::Integer(b.code() as i64))
            .collect(),
    );
    push_in(
        &mut sql,
        "level",
        query
            .levels
            .iter()
            .map(|l| Value::Text(l.as_str().to_string()))
            .collect(),
    );

    if let Some(user_id) = query.user_id {
        sql.push_str(" AND user_id = ?");
        params.push(Value::Integer(user_id as i64));
    }
    if let Some(ref request_id) = query.request_id {
        sql.push_str(" AND request_id = ?");
        params.push(Value::Text(request_id.clone()));
    }
    if let Some(from) = query.date_from {
        sql.push_str(" AND created_at >= ?");
        params.push(Value::Integer(from.timestamp_millis()));
    }
    if let Some(to) = query.date_to {
        sql.push_str(" AND created_at <= ?");
        params.push(Value::Integer(to.timestamp_millis()));
    }

    (sql, params)
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
    let id: i64 = row.get(0)?;
    let data: String = row.get(9)?;
    let data: Payload = serde_json::from_str(&data).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let millis: i64 = row.get(12)?;
    let created_at = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(12, millis)
    })?;
    let level: String = row.get(5)?;

    Ok(LogEntry {
        log_id: Some(id.to_string()),
        owner: row.get(1)?,
        action_type: row.get(2)?,
        object_type: row.get(3)?,
        behaviour: Behaviour::from_code(row.get(4)?),
        level: Level::from_input(&level),
        user_id: row.get::<_, i64>(6)? as u64,
        object_id: row.get::<_, i64>(7)? as u64,
        message: row.get(8)?,
        data,
        request_id: row.get(10)?,
        request_context: row.get(11)?,
        created_at,
    })
}

impl Storage for SqliteStorage {
    fn insert(&self, entries: &[LogEntry]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO activity_log (owner, action_type, object_type, behaviour, level, \
                     user_id, object_id, message, data, request_id, request_context, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                )?;
                for entry in entries {
                    let data = serde_json::to_string(&entry.data)?;
                    stmt.execute(params![
                        entry.owner,
                        entry.action_type,
                        entry.object_type,
                        entry.behaviour.code() as i64,
                        entry.level.as_str(),
                        entry.user_id as i64,
                        entry.object_id as i64,
                        entry.message,
                        data,
                        entry.request_id,
                        entry.request_context,
                        entry.created_at.timestamp_millis(),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn query(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        let (where_sql, mut params) = where_clause(query);
        let order = query.order.as_sql();
        let sql = format!(
            "SELECT {} FROM activity_log{} ORDER BY created_at {}, id {} LIMIT ? OFFSET ?",
            COLUMNS, where_sql, order, order
        );
        params.push(Value::Integer(
            query.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)).unwrap_or(-1),
        ));
        // A negative OFFSET reads as 0 in SQLite
        params.push(Value::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), row_to_entry)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
    }

    fn count(&self, query: &LogQuery) -> Result<u64> {
        let (where_sql, params) = where_clause(query);
        let sql = format!("SELECT COUNT(*) FROM activity_log{}", where_sql);
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row(&sql, rusqlite::params_from_iter(params), |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM activity_log WHERE created_at < ?1",
                params![cutoff.timestamp_millis()],
            )?;
            Ok(deleted as u64)
        })
    }

    fn name(&self) -> &str {
        "sqlite"
    }

    fn owners(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT owner FROM activity_log ORDER BY owner")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut owners = Vec::new();
            for row in rows {
                owners.push(row?);
            }
            Ok(owners)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Order;
    use chrono::Duration;

    fn entry_at(owner: &str, behaviour: Behaviour, created_at: DateTime<Utc>) -> LogEntry {
        LogEntry {
            log_id: None,
            owner: owner.to_string(),
            action_type: "save".to_string(),
            object_type: "post".to_string(),
            behaviour,
            level: Level::Editor,
            user_id: 11,
            object_id: 22,
            message: format!("{} did something", owner),
            data: Payload::new(serde_json::json!({"nested": {"ok": true}})),
            request_id: "feedfacecafebeef".to_string(),
            request_context: "cli cleanup".to_string(),
            created_at,
        }
    }

    #[test]
    fn test_roundtrip_exact() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let entry = entry_at("a", Behaviour::Warning, crate::types::now());
        storage.insert(std::slice::from_ref(&entry)).unwrap();

        let all = storage.query(&LogQuery::new()).unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].same_record(&entry));
        assert_eq!(all[0].log_id.as_deref(), Some("1"));
    }

    #[test]
    fn test_set_filters_compile_to_in() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = crate::types::now();
        storage
            .insert(&[
                entry_at("a", Behaviour::Error, now),
                entry_at("b", Behaviour::Success, now),
                entry_at("c", Behaviour::Warning, now),
            ])
            .unwrap();

        let q = LogQuery::new().owners(["a", "b"]);
        assert_eq!(storage.count(&q).unwrap(), 2);

        let q = LogQuery::new()
            .behaviour(Behaviour::Error)
            .behaviour(Behaviour::Warning);
        let mut owners: Vec<String> = storage.query(&q).unwrap().into_iter().map(|e| e.owner).collect();
        owners.sort();
        assert_eq!(owners, vec!["a", "c"]);
    }

    #[test]
    fn test_order_and_pagination() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let base = crate::types::now();
        let batch: Vec<LogEntry> = (0..25)
            .map(|i| entry_at(&format!("e{:02}", i + 1), Behaviour::Success, base + Duration::seconds(i)))
            .collect();
        storage.insert(&batch).unwrap();

        let page = storage
            .query(&LogQuery::new().order(Order::Asc).page(2, 10))
            .unwrap();
        let owners: Vec<&str> = page.iter().map(|e| e.owner.as_str()).collect();
        assert_eq!(owners.first(), Some(&"e11"));
        assert_eq!(owners.last(), Some(&"e20"));

        let newest = storage.query(&LogQuery::new().limit(1)).unwrap();
        assert_eq!(newest[0].owner, "e25");
    }

    #[test]
    fn test_delete_before_keeps_boundary() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let cutoff = crate::types::now();
        storage
            .insert(&[
                entry_at("old", Behaviour::Success, cutoff - Duration::milliseconds(1)),
                entry_at("edge", Behaviour::Success, cutoff),
            ])
            .unwrap();

        assert_eq!(storage.delete_before(cutoff).unwrap(), 1);
        let left = storage.query(&LogQuery::new()).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].owner, "edge");
    }

    #[test]
    fn test_open_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("activity.db");
        let storage = SqliteStorage::open(&path).unwrap();
        storage
            .insert(&[entry_at("a", Behaviour::Success, crate::types::now())])
            .unwrap();
        assert!(path.exists());

        // Reopen sees persisted rows
        drop(storage);
        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(reopened.count(&LogQuery::new()).unwrap(), 1);
    }

    #[test]
    fn test_distinct_owners() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = crate::types::now();
        storage
            .insert(&[
                entry_at("shop", Behaviour::Success, now),
                entry_at("cms", Behaviour::Error, now),
                entry_at("shop", Behaviour::Warning, now),
            ])
            .unwrap();
        assert_eq!(storage.owners().unwrap(), vec!["cms", "shop"]);
    }
}
