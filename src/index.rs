//! The authoritative in-memory record list for a resource type.
//!
//! One index exists per resource type and is shared by every model instance
//! and resource handle derived from it. All reads resolve against the
//! in-memory list; every structural change rewrites the full list to the
//! store adapter under the type's storage key.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use color_eyre::Result;
use serde_json::Value;
use tracing::debug;

use crate::collection::Collection;
use crate::model::ModelInstance;
use crate::record::AttributeRecord;
use crate::store::StoreAdapter;

type AfterReadHook = Box<dyn Fn(&RecordIndex) + Send + Sync>;
type AfterRetrieveHook = Box<dyn Fn(&mut ModelInstance) + Send + Sync>;

/// Behavioral extension points for a resource type. Both default to no-ops.
#[derive(Default)]
pub struct ResourceHooks {
  pub(crate) after_read: Option<AfterReadHook>,
  pub(crate) after_retrieve: Option<AfterRetrieveHook>,
}

impl ResourceHooks {
  pub fn new() -> Self {
    Self::default()
  }

  /// Run after each `read()` has replaced the in-memory list.
  pub fn on_after_read(mut self, hook: impl Fn(&RecordIndex) + Send + Sync + 'static) -> Self {
    self.after_read = Some(Box::new(hook));
    self
  }

  /// Run after each instance built via `create_model_instance`.
  pub fn on_after_retrieve(
    mut self,
    hook: impl Fn(&mut ModelInstance) + Send + Sync + 'static,
  ) -> Self {
    self.after_retrieve = Some(Box::new(hook));
    self
  }
}

struct IndexInner {
  key: String,
  store: Arc<dyn StoreAdapter>,
  records: Mutex<Vec<AttributeRecord>>,
  initialized: Mutex<bool>,
  hooks: ResourceHooks,
}

/// Handle to a resource type's record index. Clones share the same list.
#[derive(Clone)]
pub struct RecordIndex {
  inner: Arc<IndexInner>,
}

impl RecordIndex {
  pub fn new(key: impl Into<String>, store: Arc<dyn StoreAdapter>, hooks: ResourceHooks) -> Self {
    Self {
      inner: Arc::new(IndexInner {
        key: key.into(),
        store,
        records: Mutex::new(Vec::new()),
        initialized: Mutex::new(false),
        hooks,
      }),
    }
  }

  /// The storage key this index persists under (the resource name).
  pub fn storage_key(&self) -> &str {
    &self.inner.key
  }

  /// One-time local initialization.
  ///
  /// Seeds the store with an empty list when the key is absent, then loads
  /// whatever the store holds. Subsequent calls are no-ops.
  pub fn local_init(&self) -> Result<()> {
    {
      let mut initialized = lock(&self.inner.initialized);
      if *initialized {
        return Ok(());
      }

      if self.inner.store.get(&self.inner.key)?.is_none() {
        self.inner.store.set(&self.inner.key, &[])?;
      }

      *initialized = true;
    }

    self.read()
  }

  /// Replace the in-memory list from the store, then run the after-read hook.
  pub fn read(&self) -> Result<()> {
    let loaded = self.inner.store.get(&self.inner.key)?.unwrap_or_default();
    debug!(key = %self.inner.key, records = loaded.len(), "loaded record list");

    *lock(&self.inner.records) = loaded;

    if let Some(hook) = &self.inner.hooks.after_read {
      hook(self);
    }

    Ok(())
  }

  /// Persist the full in-memory list verbatim. Never incremental.
  pub fn write(&self) -> Result<()> {
    let records = lock(&self.inner.records);
    debug!(key = %self.inner.key, records = records.len(), "writing record list");
    self.inner.store.set(&self.inner.key, &records)
  }

  /// A copy of the current in-memory record list.
  pub fn attributes_list(&self) -> Vec<AttributeRecord> {
    lock(&self.inner.records).clone()
  }

  /// First record whose `localId` equals the given value, as a fresh instance.
  pub fn local_find(&self, local_id: &str) -> Option<ModelInstance> {
    let found = lock(&self.inner.records)
      .iter()
      .find(|r| r.local_id() == Some(local_id))
      .cloned();
    found.map(|r| self.create_model_instance(&r))
  }

  /// First record whose `objectId` equals the given value, as a fresh instance.
  pub fn local_find_by_id(&self, id: &Value) -> Option<ModelInstance> {
    let found = lock(&self.inner.records)
      .iter()
      .find(|r| r.object_id() == Some(id))
      .cloned();
    found.map(|r| self.create_model_instance(&r))
  }

  /// Build a live instance from a deep copy of the given attributes.
  ///
  /// The `date` field is coerced to its canonical form and the after-retrieve
  /// hook runs before the instance is returned.
  pub fn create_model_instance(&self, attributes: &AttributeRecord) -> ModelInstance {
    let mut attrs = attributes.clone();
    attrs.coerce_date();

    let mut model = ModelInstance::new(self.clone(), attrs);
    if let Some(hook) = &self.inner.hooks.after_retrieve {
      hook(&mut model);
    }
    model
  }

  /// Build a collection of instances, one per record in `list` (or the
  /// current in-memory list). Instances never alias the stored records.
  pub fn collection_from_attributes_list(
    &self,
    list: Option<&[AttributeRecord]>,
  ) -> Collection<ModelInstance> {
    let owned;
    let records: &[AttributeRecord] = match list {
      Some(list) => list,
      None => {
        owned = self.attributes_list();
        &owned
      }
    };

    let mut collection = Collection::new();
    for attributes in records {
      collection.add(self.create_model_instance(attributes));
    }
    collection
  }

  /// Lock the record list for a read-modify-write sequence.
  ///
  /// Callers that mutate must persist via `persist_locked` before releasing
  /// the guard, so overlapping completions cannot interleave a stale write.
  pub(crate) fn records_guard(&self) -> MutexGuard<'_, Vec<AttributeRecord>> {
    lock(&self.inner.records)
  }

  /// Persist a list snapshot while the caller still holds the records guard.
  pub(crate) fn persist_locked(&self, records: &[AttributeRecord]) -> Result<()> {
    self.inner.store.set(&self.inner.key, records)
  }
}

impl PartialEq for RecordIndex {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl fmt::Debug for RecordIndex {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RecordIndex")
      .field("key", &self.inner.key)
      .finish_non_exhaustive()
  }
}

// A poisoned lock only means another caller panicked mid-operation; the list
// itself is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
