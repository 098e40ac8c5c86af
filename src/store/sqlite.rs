//! SQLite-backed record list storage.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::StoreAdapter;
use crate::record::AttributeRecord;

/// Schema for the record list table.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS record_lists (
    list_key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    written_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Durable storage implementation over a single SQLite table.
///
/// Each resource type's record list is stored as one serialized JSON row,
/// keyed by the resource name.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open or create the store at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    Self::open_at(&path)
  }

  /// Open or create the store at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("storable").join("records.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(())
  }
}

impl StoreAdapter for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<Vec<AttributeRecord>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data: Option<Vec<u8>> = conn
      .query_row(
        "SELECT data FROM record_lists WHERE list_key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query record list: {}", e))?;

    match data {
      Some(data) => {
        let records: Vec<AttributeRecord> = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize record list '{}': {}", key, e))?;
        Ok(Some(records))
      }
      None => Ok(None),
    }
  }

  fn set(&self, key: &str, records: &[AttributeRecord]) -> Result<()> {
    let data =
      serde_json::to_vec(records).map_err(|e| eyre!("Failed to serialize record list: {}", e))?;

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO record_lists (list_key, data, written_at)
         VALUES (?, ?, datetime('now'))",
        params![key, data],
      )
      .map_err(|e| eyre!("Failed to store record list: {}", e))?;

    Ok(())
  }
}
