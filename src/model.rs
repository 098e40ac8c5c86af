//! Live model objects bound to one attribute record.

use color_eyre::Result;
use serde_json::Value;
use uuid::Uuid;

use crate::collection::ValueKeyed;
use crate::index::RecordIndex;
use crate::record::{AttributeRecord, ACL, ID, LOCAL_ID, OBJECT_ID, VALUE};

/// A live object over one attribute record.
///
/// Instances are always constructed through their type's [`RecordIndex`] and
/// keep a handle to it for identity resolution, navigation and persistence.
/// Several instances may exist for the same underlying record; dropping an
/// instance never touches the record — only [`destroy_local`](Self::destroy_local)
/// does.
#[derive(Debug, Clone)]
pub struct ModelInstance {
  attrs: AttributeRecord,
  index: RecordIndex,
}

impl ModelInstance {
  pub(crate) fn new(index: RecordIndex, attrs: AttributeRecord) -> Self {
    Self { attrs, index }
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.attrs.get(name)
  }

  pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
    self.attrs.set(name, value);
  }

  pub fn attributes(&self) -> &AttributeRecord {
    &self.attrs
  }

  /// The server-assigned identifier, if any. Null counts as absent.
  pub fn id(&self) -> Option<&Value> {
    self.attrs.get(ID).filter(|v| !v.is_null())
  }

  /// The client-generated identifier, if any.
  pub fn local_id(&self) -> Option<&str> {
    self.attrs.local_id()
  }

  /// The index this instance resolves against.
  pub fn index(&self) -> &RecordIndex {
    &self.index
  }

  /// The matching record in the index's list, as a copy.
  ///
  /// A record matches when its `objectId` equals this instance's id, or its
  /// `localId` equals this instance's localId — objectId is checked first,
  /// first matching record wins.
  pub fn local_find_raw_equivalent(&self) -> Option<AttributeRecord> {
    let records = self.index.records_guard();
    position_of_equivalent(&records, &self.attrs).map(|pos| records[pos].clone())
  }

  /// The matching record wrapped in a fresh instance.
  pub fn local_find_equivalent(&self) -> Option<ModelInstance> {
    let equivalent = self.local_find_raw_equivalent()?;
    Some(self.index.create_model_instance(&equivalent))
  }

  /// Merge the matching record's fields over this instance's.
  pub fn local_fetch(&mut self) -> &mut Self {
    if let Some(equivalent) = self.local_find_equivalent() {
      self.attrs.merge(equivalent.attributes());
    }
    self
  }

  /// Position of this instance's equivalent record within the index's list.
  pub fn local_index(&self) -> Option<usize> {
    let records = self.index.records_guard();
    position_of_equivalent(&records, &self.attrs)
  }

  /// The instance one position toward the front of the list, if any.
  pub fn next(&self) -> Option<ModelInstance> {
    let neighbor = {
      let records = self.index.records_guard();
      let pos = position_of_equivalent(&records, &self.attrs)?;
      if pos > 0 {
        Some(records[pos - 1].clone())
      } else {
        None
      }
    };
    neighbor.map(|r| self.index.create_model_instance(&r))
  }

  /// The instance one position toward the end of the list, if any.
  pub fn prev(&self) -> Option<ModelInstance> {
    let neighbor = {
      let records = self.index.records_guard();
      let pos = position_of_equivalent(&records, &self.attrs)?;
      records.get(pos + 1).cloned()
    };
    neighbor.map(|r| self.index.create_model_instance(&r))
  }

  /// Persist this instance into the index's list.
  ///
  /// Supplied attributes are merged onto the instance first. An existing
  /// equivalent record is overwritten in place; otherwise the instance gets a
  /// fresh localId and its exported attributes are appended. Either way the
  /// full list is rewritten to the store before the lock is released.
  pub fn save_local(&mut self, attributes: Option<AttributeRecord>) -> Result<()> {
    if let Some(extra) = attributes {
      self.attrs.merge(&extra);
    }

    let index = self.index.clone();
    let mut records = index.records_guard();

    match position_of_equivalent(&records, &self.attrs) {
      Some(pos) => {
        let exported = self.attributes_for_local();
        records[pos].merge(&exported);
      }
      None => {
        self.attrs.set(LOCAL_ID, Uuid::new_v4().to_string());
        records.push(self.attributes_for_local());
      }
    }

    index.persist_locked(&records)
  }

  /// Remove this instance's equivalent record and rewrite the list.
  pub fn destroy_local(&self) -> Result<()> {
    let index = self.index.clone();
    let mut records = index.records_guard();

    if let Some(pos) = position_of_equivalent(&records, &self.attrs) {
      records.remove(pos);
    }

    index.persist_locked(&records)
  }

  /// This instance's persistable fields as a flat record.
  ///
  /// Tagged with `objectId` from the instance id when present; access-control
  /// metadata is stripped.
  pub fn attributes_for_local(&self) -> AttributeRecord {
    let mut exported = self.attrs.clone();
    if let Some(id) = self.id() {
      exported.set(OBJECT_ID, id.clone());
    }
    exported.remove(ACL);
    exported
  }
}

/// First record matching the given instance attributes; objectId before
/// localId per record.
pub(crate) fn position_of_equivalent(
  records: &[AttributeRecord],
  attrs: &AttributeRecord,
) -> Option<usize> {
  let id = attrs.get(ID).filter(|v| !v.is_null());
  let local_id = attrs.local_id();

  records.iter().position(|record| {
    if let (Some(record_id), Some(id)) = (record.object_id(), id) {
      if record_id == id {
        return true;
      }
    }
    matches!((record.local_id(), local_id), (Some(a), Some(b)) if a == b)
  })
}

impl PartialEq for ModelInstance {
  fn eq(&self, other: &Self) -> bool {
    self.index == other.index && self.attrs == other.attrs
  }
}

impl ValueKeyed for ModelInstance {
  fn value_key(&self) -> String {
    match self.attrs.get(VALUE) {
      Some(Value::String(s)) => s.clone(),
      Some(v) => v.to_string(),
      None => String::new(),
    }
  }
}
