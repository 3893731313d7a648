#![forbid(unsafe_code)]

mod error;
mod kv;
mod overlay;
mod schema;
mod tree;

pub use error::StoreError;
pub use overlay::*;

use rusqlite::Connection;
use sm_core::ChangeEvent;
use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::Duration;

const DB_FILE_NAME: &str = "shelfmark.db";

/// SQLite-backed host store: the authoritative bookmark tree plus a key-value table.
///
/// Two handles may be opened on the same directory (one per collaborator role); WAL and the
/// busy timeout keep them from tripping over each other.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    tree_sinks: Vec<Sender<ChangeEvent>>,
    kv_sinks: Vec<Sender<ChangeEvent>>,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;

        schema::install(&conn, now_ms())?;
        tracing::debug!(path = %db_path.display(), "opened sqlite store");

        Ok(Self {
            conn,
            tree_sinks: Vec::new(),
            kv_sinks: Vec::new(),
        })
    }

    /// Fans `event` out to the sinks registered for its kind; sinks whose receiver is gone are
    /// dropped.
    fn notify(&mut self, event: ChangeEvent) {
        let sinks = match event {
            ChangeEvent::Tree(_) => &mut self.tree_sinks,
            ChangeEvent::Storage(_) => &mut self.kv_sinks,
        };
        sinks.retain(|sink| sink.send(event.clone()).is_ok());
    }
}

fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}

fn from_sqlite_usize(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
