//! Persistent key-value storage for attribute record lists.
//!
//! A resource type persists its full record list under one key (the resource
//! name). Adapters only need to honor that get/set contract; everything else
//! (identity resolution, ordering, rewrites) lives above them.

mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::HashMap;
use std::sync::Mutex;

use color_eyre::Result;

use crate::record::AttributeRecord;

/// Trait for record-list storage backends.
pub trait StoreAdapter: Send + Sync {
  /// Load the full record list stored under `key`, if any.
  fn get(&self, key: &str) -> Result<Option<Vec<AttributeRecord>>>;

  /// Replace the record list stored under `key`.
  fn set(&self, key: &str, records: &[AttributeRecord]) -> Result<()>;
}

/// In-memory storage. Used in tests and for ephemeral mirrors.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, Vec<AttributeRecord>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl StoreAdapter for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<Vec<AttributeRecord>>> {
    let entries = self
      .entries
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner);
    Ok(entries.get(key).cloned())
  }

  fn set(&self, key: &str, records: &[AttributeRecord]) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner);
    entries.insert(key.to_string(), records.to_vec());
    Ok(())
  }
}
