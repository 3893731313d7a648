#![forbid(unsafe_code)]

use super::StoreError;
use rusqlite::{Connection, params};
use sm_core::ROOT_ID;

const SCHEMA_SQL: &str = r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          name TEXT PRIMARY KEY,
          value INTEGER NOT NULL
        );

        -- Authoritative tree. `position` is dense per parent, starting at 0.
        CREATE TABLE IF NOT EXISTS nodes (
          id TEXT PRIMARY KEY,
          parent_id TEXT,
          position INTEGER NOT NULL,
          title TEXT NOT NULL,
          url TEXT,
          date_added_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_parent_position
          ON nodes(parent_id, position);

        CREATE TABLE IF NOT EXISTS kv (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );
"#;

/// Top-level containers seeded on first open, in display order.
const TOP_LEVEL: &[(&str, &str)] = &[
    ("1", "Bookmarks Bar"),
    ("2", "Other Bookmarks"),
    ("3", "Mobile Bookmarks"),
];

pub(super) const NODE_ID_COUNTER: &str = "node_id";

pub(super) fn install(conn: &Connection, now_ms: i64) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO nodes(id, parent_id, position, title, url, date_added_ms) \
         VALUES (?1, NULL, 0, '', NULL, ?2)",
        params![ROOT_ID, now_ms],
    )?;
    for (position, (id, title)) in TOP_LEVEL.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO nodes(id, parent_id, position, title, url, date_added_ms) \
             VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![id, ROOT_ID, super::to_sqlite_i64(position)?, title, now_ms],
        )?;
    }
    conn.execute(
        "INSERT OR IGNORE INTO counters(name, value) VALUES (?1, ?2)",
        params![NODE_ID_COUNTER, super::to_sqlite_i64(TOP_LEVEL.len())?],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", "v1"],
    )?;

    Ok(())
}
