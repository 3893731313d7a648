#![forbid(unsafe_code)]

use super::{SqliteStore, StoreError, now_ms};
use rusqlite::{OptionalExtension, params};
use sm_core::ports::PersistenceStore;
use sm_core::{ChangeEvent, ShelfError, StorageChange};
use std::sync::mpsc::Sender;

impl SqliteStore {
    fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM kv WHERE key=?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }

    fn kv_set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if key.trim().is_empty() {
            return Err(StoreError::InvalidInput("key must not be empty"));
        }
        let tx = self.conn.transaction()?;
        let old_value = tx
            .query_row("SELECT value FROM kv WHERE key=?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        tx.execute(
            "INSERT INTO kv(key, value, updated_at_ms) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at_ms=excluded.updated_at_ms",
            params![key, value, now_ms()],
        )?;
        tx.commit()?;

        if old_value.as_deref() == Some(value) {
            return Ok(());
        }
        self.notify(ChangeEvent::Storage(StorageChange {
            key: key.to_string(),
            old_value,
            new_value: Some(value.to_string()),
        }));
        Ok(())
    }

    fn kv_remove(&mut self, key: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let old_value = tx
            .query_row("SELECT value FROM kv WHERE key=?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        tx.execute("DELETE FROM kv WHERE key=?1", params![key])?;
        tx.commit()?;

        if old_value.is_none() {
            return Ok(());
        }
        self.notify(ChangeEvent::Storage(StorageChange {
            key: key.to_string(),
            old_value,
            new_value: None,
        }));
        Ok(())
    }
}

impl PersistenceStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, ShelfError> {
        Ok(self.kv_get(key)?)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ShelfError> {
        Ok(self.kv_set(key, value)?)
    }

    fn remove(&mut self, key: &str) -> Result<(), ShelfError> {
        Ok(self.kv_remove(key)?)
    }

    fn subscribe(&mut self, sink: Sender<ChangeEvent>) {
        self.kv_sinks.push(sink);
    }
}
