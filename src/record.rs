//! Flat attribute records, the persisted representation of one model's fields.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-assigned identifier, present once a record is known to the remote store.
pub const OBJECT_ID: &str = "objectId";
/// Client-generated identifier, assigned on first local save.
pub const LOCAL_ID: &str = "localId";
/// Identifier field on a live instance (as returned by the remote API).
pub const ID: &str = "id";
/// Optional temporal field, normalized to RFC 3339 when instances are built.
pub const DATE: &str = "date";
/// Default key read by the `*_value` collection operations.
pub const VALUE: &str = "value";
/// Access-control metadata. Transient, stripped before persisting.
pub const ACL: &str = "ACL";

/// A flat field-name to value mapping. Plain data, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeRecord {
  fields: Map<String, Value>,
}

impl AttributeRecord {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_fields(fields: Map<String, Value>) -> Self {
    Self { fields }
  }

  /// Build a record from a JSON value. Returns None for anything but an object.
  pub fn from_value(value: Value) -> Option<Self> {
    match value {
      Value::Object(fields) => Some(Self { fields }),
      _ => None,
    }
  }

  pub fn get(&self, name: &str) -> Option<&Value> {
    self.fields.get(name)
  }

  pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
    self.fields.insert(name.into(), value.into());
  }

  pub fn remove(&mut self, name: &str) -> Option<Value> {
    self.fields.remove(name)
  }

  /// The server-assigned identifier, if any. Null counts as absent.
  pub fn object_id(&self) -> Option<&Value> {
    self.fields.get(OBJECT_ID).filter(|v| !v.is_null())
  }

  /// The client-generated identifier, if any.
  pub fn local_id(&self) -> Option<&str> {
    self.fields.get(LOCAL_ID).and_then(Value::as_str)
  }

  /// Overwrite this record's fields with `other`'s. Fields only present here survive.
  pub fn merge(&mut self, other: &AttributeRecord) {
    for (name, value) in &other.fields {
      self.fields.insert(name.clone(), value.clone());
    }
  }

  /// Normalize the `date` field to a canonical RFC 3339 string.
  ///
  /// Accepts RFC 3339 strings and millisecond timestamps; anything else is
  /// left untouched.
  pub fn coerce_date(&mut self) {
    let coerced = match self.fields.get(DATE) {
      Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc)),
      Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
      _ => None,
    };

    if let Some(dt) = coerced {
      self.fields.insert(
        DATE.to_string(),
        Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
      );
    }
  }

  /// The `date` field as a typed timestamp, if present and well-formed.
  pub fn date(&self) -> Option<DateTime<Utc>> {
    self
      .fields
      .get(DATE)
      .and_then(Value::as_str)
      .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
      .map(|dt| dt.with_timezone(&Utc))
  }

  pub fn fields(&self) -> &Map<String, Value> {
    &self.fields
  }

  pub fn into_fields(self) -> Map<String, Value> {
    self.fields
  }

  pub fn len(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }
}

impl From<Map<String, Value>> for AttributeRecord {
  fn from(fields: Map<String, Value>) -> Self {
    Self { fields }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn record(value: Value) -> AttributeRecord {
    AttributeRecord::from_value(value).expect("object literal")
  }

  #[test]
  fn test_merge_overwrites_matching_fields_only() {
    let mut base = record(json!({"name": "x", "kind": "note"}));
    base.merge(&record(json!({"name": "y", "extra": 1})));

    assert_eq!(base.get("name"), Some(&json!("y")));
    assert_eq!(base.get("kind"), Some(&json!("note")));
    assert_eq!(base.get("extra"), Some(&json!(1)));
  }

  #[test]
  fn test_object_id_ignores_null() {
    let rec = record(json!({"objectId": null}));
    assert_eq!(rec.object_id(), None);

    let rec = record(json!({"objectId": 42}));
    assert_eq!(rec.object_id(), Some(&json!(42)));
  }

  #[test]
  fn test_coerce_date_from_millis() {
    let mut rec = record(json!({"date": 0}));
    rec.coerce_date();
    assert_eq!(rec.get("date"), Some(&json!("1970-01-01T00:00:00.000Z")));
    assert_eq!(rec.date().map(|dt| dt.timestamp()), Some(0));
  }

  #[test]
  fn test_coerce_date_normalizes_offsets() {
    let mut rec = record(json!({"date": "2024-03-01T12:00:00+02:00"}));
    rec.coerce_date();
    assert_eq!(rec.get("date"), Some(&json!("2024-03-01T10:00:00.000Z")));
  }

  #[test]
  fn test_coerce_date_leaves_garbage_alone() {
    let mut rec = record(json!({"date": "not a date"}));
    rec.coerce_date();
    assert_eq!(rec.get("date"), Some(&json!("not a date")));
    assert_eq!(rec.date(), None);
  }

  #[test]
  fn test_serde_round_trip_is_transparent() {
    let rec = record(json!({"name": "x", "count": 3}));
    let text = serde_json::to_string(&rec).expect("serialize");
    assert_eq!(text, r#"{"count":3,"name":"x"}"#);

    let back: AttributeRecord = serde_json::from_str(&text).expect("deserialize");
    assert_eq!(back, rec);
  }
}
