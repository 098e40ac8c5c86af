//! Resource types: remote actions and the local mirror behind one handle.
//!
//! A resource type is defined once from its configuration and is cache-ready
//! from that moment on: definition runs the one-time local initialization, so
//! callers never sequence it themselves.

mod http;
mod transport;

pub use http::HttpTransport;
pub use transport::{
  default_actions, ActionDef, ActionRequest, ActionResponse, BoxFuture, Method, RemoteTransport,
  ResultShape,
};

use std::collections::HashMap;
use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::collection::Collection;
use crate::index::{RecordIndex, ResourceHooks};
use crate::model::{position_of_equivalent, ModelInstance};
use crate::record::{AttributeRecord, LOCAL_ID};
use crate::store::StoreAdapter;

/// Options accepted per resource type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOptions {
  /// Strip trailing slashes from expanded action URLs.
  #[serde(default = "default_strip")]
  pub strip_trailing_slashes: bool,
}

fn default_strip() -> bool {
  true
}

impl Default for ResourceOptions {
  fn default() -> Self {
    Self {
      strip_trailing_slashes: true,
    }
  }
}

/// Declarative description of one resource type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
  /// Resource name; doubles as the local storage key.
  pub name: String,
  /// URL template with `:param` segments.
  pub url: String,
  #[serde(default)]
  pub param_defaults: Map<String, Value>,
  /// Caller actions, merged over the default CRUD set.
  #[serde(default)]
  pub actions: HashMap<String, ActionDef>,
  #[serde(default)]
  pub options: ResourceOptions,
}

impl ResourceConfig {
  pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      url: url.into(),
      param_defaults: Map::new(),
      actions: HashMap::new(),
      options: ResourceOptions::default(),
    }
  }

  pub fn from_yaml(text: &str) -> Result<Self> {
    serde_yaml::from_str(text).map_err(|e| eyre!("Failed to parse resource config: {}", e))
  }
}

/// Result of a remote action, already wrapped for local consumption.
#[derive(Debug)]
pub enum ActionOutcome {
  One(ModelInstance),
  Many(Collection<ModelInstance>),
  Empty,
}

impl ActionOutcome {
  pub fn one(self) -> Option<ModelInstance> {
    match self {
      ActionOutcome::One(model) => Some(model),
      _ => None,
    }
  }

  pub fn many(self) -> Option<Collection<ModelInstance>> {
    match self {
      ActionOutcome::Many(collection) => Some(collection),
      _ => None,
    }
  }
}

/// A resource type: remote CRUD actions plus the write-through local mirror.
///
/// Cloning is cheap and every clone shares the same record index.
#[derive(Clone)]
pub struct Resource {
  name: String,
  url: String,
  param_defaults: Map<String, Value>,
  actions: HashMap<String, ActionDef>,
  options: ResourceOptions,
  transport: Arc<dyn RemoteTransport>,
  index: RecordIndex,
}

impl Resource {
  /// Define a resource type and run its one-time local initialization.
  pub fn define(
    config: ResourceConfig,
    transport: Arc<dyn RemoteTransport>,
    store: Arc<dyn StoreAdapter>,
  ) -> Result<Self> {
    Self::define_with_hooks(config, transport, store, ResourceHooks::default())
  }

  /// Like [`define`](Self::define), with behavioral hook overrides.
  pub fn define_with_hooks(
    config: ResourceConfig,
    transport: Arc<dyn RemoteTransport>,
    store: Arc<dyn StoreAdapter>,
    hooks: ResourceHooks,
  ) -> Result<Self> {
    let mut actions = default_actions();
    actions.extend(config.actions);

    let index = RecordIndex::new(config.name.clone(), store, hooks);

    let resource = Self {
      name: config.name,
      url: config.url,
      param_defaults: config.param_defaults,
      actions,
      options: config.options,
      transport,
      index,
    };

    resource.local_init()?;
    Ok(resource)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn index(&self) -> &RecordIndex {
    &self.index
  }

  /// Invoke a declared remote action.
  ///
  /// Parameters merge in order: resource defaults, action defaults, call
  /// parameters. Array results come back as collections whose instances are
  /// built through the index; transport failures propagate unchanged.
  pub async fn call(
    &self,
    action: &str,
    params: Map<String, Value>,
    body: Option<Value>,
  ) -> Result<ActionOutcome> {
    let def = self
      .actions
      .get(action)
      .ok_or_else(|| eyre!("Unknown action '{}' on resource '{}'", action, self.name))?;

    let mut merged = self.param_defaults.clone();
    for (name, value) in &def.params {
      merged.insert(name.clone(), value.clone());
    }
    for (name, value) in params {
      merged.insert(name, value);
    }

    let request = ActionRequest {
      name: action.to_string(),
      method: def.method,
      url: def.url.clone().unwrap_or_else(|| self.url.clone()),
      params: merged,
      body,
      shape: def.shape,
      strip_trailing_slashes: self.options.strip_trailing_slashes,
    };

    let response = self.transport.execute(request).await?;

    match response {
      ActionResponse::One(value) => {
        let record = AttributeRecord::from_value(value)
          .ok_or_else(|| eyre!("Action '{}' returned a non-object result", action))?;
        Ok(ActionOutcome::One(self.index.create_model_instance(&record)))
      }
      ActionResponse::Many(values) => {
        let mut collection = Collection::new();
        for value in values {
          let record = AttributeRecord::from_value(value)
            .ok_or_else(|| eyre!("Action '{}' returned a non-object element", action))?;
          collection.add(self.index.create_model_instance(&record));
        }
        Ok(ActionOutcome::Many(collection))
      }
      ActionResponse::Empty => Ok(ActionOutcome::Empty),
    }
  }

  /// Fetch one instance via the default `get` action.
  pub async fn get(&self, params: Map<String, Value>) -> Result<ModelInstance> {
    self
      .call("get", params, None)
      .await?
      .one()
      .ok_or_else(|| eyre!("Action 'get' did not return a single result"))
  }

  /// Fetch a collection via the default `query` action.
  pub async fn query(&self, params: Map<String, Value>) -> Result<Collection<ModelInstance>> {
    self
      .call("query", params, None)
      .await?
      .many()
      .ok_or_else(|| eyre!("Action 'query' did not return a collection"))
  }

  /// Persist remotely via the default `save` action.
  pub async fn save(&self, body: Value, params: Map<String, Value>) -> Result<ModelInstance> {
    self
      .call("save", params, Some(body))
      .await?
      .one()
      .ok_or_else(|| eyre!("Action 'save' did not return a single result"))
  }

  /// Delete remotely via the default `remove` action.
  pub async fn remove(&self, params: Map<String, Value>) -> Result<()> {
    self.call("remove", params, None).await?;
    Ok(())
  }

  // Local surface, delegated to the type's record index.

  pub fn local_init(&self) -> Result<()> {
    self.index.local_init()
  }

  pub fn read(&self) -> Result<()> {
    self.index.read()
  }

  pub fn write(&self) -> Result<()> {
    self.index.write()
  }

  pub fn attributes_list(&self) -> Vec<AttributeRecord> {
    self.index.attributes_list()
  }

  pub fn local_find(&self, local_id: &str) -> Option<ModelInstance> {
    self.index.local_find(local_id)
  }

  pub fn local_find_by_id(&self, id: &Value) -> Option<ModelInstance> {
    self.index.local_find_by_id(id)
  }

  pub fn create_model_instance(&self, attributes: &AttributeRecord) -> ModelInstance {
    self.index.create_model_instance(attributes)
  }

  pub fn collection_from_attributes_list(
    &self,
    list: Option<&[AttributeRecord]>,
  ) -> Collection<ModelInstance> {
    self.index.collection_from_attributes_list(list)
  }

  /// Mirror a collection into the local index in one pass.
  ///
  /// Each member upserts by identity — an existing equivalent record is
  /// overwritten in place, anything else is appended under a fresh localId —
  /// followed by a single full-list write.
  pub fn sync_to_local(&self, collection: &Collection<ModelInstance>) -> Result<()> {
    let index = self.index.clone();
    let mut records = index.records_guard();

    for model in collection {
      let mut exported = model.attributes_for_local();
      match position_of_equivalent(&records, model.attributes()) {
        Some(pos) => {
          records[pos].merge(&exported);
        }
        None => {
          if exported.local_id().is_none() {
            exported.set(LOCAL_ID, Uuid::new_v4().to_string());
          }
          records.push(exported);
        }
      }
    }

    index.persist_locked(&records)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;
  use serde_json::json;
  use std::collections::VecDeque;
  use std::sync::Mutex;

  /// Transport that replays scripted responses and records what it saw.
  #[derive(Default)]
  struct MockTransport {
    responses: Mutex<VecDeque<Result<ActionResponse>>>,
    seen: Mutex<Vec<ActionRequest>>,
  }

  impl MockTransport {
    fn scripted(responses: Vec<Result<ActionResponse>>) -> Arc<Self> {
      Arc::new(Self {
        responses: Mutex::new(responses.into()),
        seen: Mutex::new(Vec::new()),
      })
    }

    fn last_request(&self) -> ActionRequest {
      self.seen.lock().unwrap().last().expect("a request").clone()
    }
  }

  impl RemoteTransport for MockTransport {
    fn execute(&self, request: ActionRequest) -> BoxFuture<ActionResponse> {
      self.seen.lock().unwrap().push(request);
      let response = self
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(Ok(ActionResponse::Empty));
      Box::pin(futures::future::ready(response))
    }
  }

  fn config() -> ResourceConfig {
    ResourceConfig::new("notes", "https://api.example.com/notes/:id")
  }

  fn record(value: Value) -> AttributeRecord {
    AttributeRecord::from_value(value).expect("object literal")
  }

  #[test]
  fn test_define_initializes_local_state() {
    let store = Arc::new(MemoryStore::new());
    let resource =
      Resource::define(config(), MockTransport::scripted(vec![]), Arc::clone(&store) as Arc<dyn StoreAdapter>)
        .expect("define");

    assert_eq!(resource.attributes_list(), vec![]);
    // The store key was seeded at definition time.
    assert_eq!(store.get("notes").expect("get"), Some(vec![]));
  }

  #[test]
  fn test_define_preserves_existing_records() {
    let store = Arc::new(MemoryStore::new());
    store
      .set("notes", &[record(json!({"name": "kept", "localId": "a"}))])
      .expect("seed");

    let resource = Resource::define(
      config(),
      MockTransport::scripted(vec![]),
      Arc::clone(&store) as Arc<dyn StoreAdapter>,
    )
    .expect("define");

    assert_eq!(resource.attributes_list().len(), 1);
    assert!(resource.local_find("a").is_some());
  }

  #[tokio::test]
  async fn test_query_wraps_array_results() {
    let transport = MockTransport::scripted(vec![Ok(ActionResponse::Many(vec![
      json!({"id": 1, "name": "x"}),
      json!({"id": 2, "name": "y"}),
    ]))]);
    let resource =
      Resource::define(config(), Arc::clone(&transport) as Arc<dyn RemoteTransport>, Arc::new(MemoryStore::new()))
        .expect("define");

    let collection = resource.query(Map::new()).await.expect("query");

    assert_eq!(collection.count(), 2);
    assert_eq!(
      collection.first().expect("first").get("name"),
      Some(&json!("x"))
    );
  }

  #[tokio::test]
  async fn test_failed_action_propagates_error() {
    let transport = MockTransport::scripted(vec![Err(eyre!("connection reset"))]);
    let resource =
      Resource::define(config(), Arc::clone(&transport) as Arc<dyn RemoteTransport>, Arc::new(MemoryStore::new()))
        .expect("define");

    let err = resource.query(Map::new()).await.expect_err("failure");
    assert!(err.to_string().contains("connection reset"));
  }

  #[tokio::test]
  async fn test_unknown_action_is_an_error() {
    let resource = Resource::define(
      config(),
      MockTransport::scripted(vec![]),
      Arc::new(MemoryStore::new()),
    )
    .expect("define");

    let err = resource
      .call("publish", Map::new(), None)
      .await
      .expect_err("unknown");
    assert!(err.to_string().contains("publish"));
  }

  #[tokio::test]
  async fn test_param_merge_order() {
    let transport = MockTransport::scripted(vec![Ok(ActionResponse::Many(vec![]))]);

    let mut config = config();
    config.param_defaults.insert("page".into(), json!(1));
    config.param_defaults.insert("lang".into(), json!("en"));
    config.actions.insert(
      "query".into(),
      ActionDef::new(Method::Get)
        .with_shape(ResultShape::Many)
        .with_param("page", 2),
    );

    let resource = Resource::define(
      config,
      Arc::clone(&transport) as Arc<dyn RemoteTransport>,
      Arc::new(MemoryStore::new()),
    )
    .expect("define");

    let mut params = Map::new();
    params.insert("lang".into(), json!("de"));
    resource.query(params).await.expect("query");

    let request = transport.last_request();
    // action default beats resource default, call parameter beats both
    assert_eq!(request.params.get("page"), Some(&json!(2)));
    assert_eq!(request.params.get("lang"), Some(&json!("de")));
  }

  #[tokio::test]
  async fn test_custom_action_url_override() {
    let transport = MockTransport::scripted(vec![Ok(ActionResponse::Many(vec![]))]);

    let mut config = config();
    config.actions.insert(
      "history".into(),
      ActionDef::new(Method::Get)
        .with_url("https://api.example.com/notes/:id/history")
        .with_shape(ResultShape::Many),
    );

    let resource = Resource::define(
      config,
      Arc::clone(&transport) as Arc<dyn RemoteTransport>,
      Arc::new(MemoryStore::new()),
    )
    .expect("define");

    resource
      .call("history", Map::new(), None)
      .await
      .expect("call");

    assert_eq!(
      transport.last_request().url,
      "https://api.example.com/notes/:id/history"
    );
  }

  #[tokio::test]
  async fn test_sync_to_local_upserts_by_identity() {
    let store = Arc::new(MemoryStore::new());
    store
      .set(
        "notes",
        &[record(json!({"name": "stale", "objectId": 1, "localId": "a"}))],
      )
      .expect("seed");

    let transport = MockTransport::scripted(vec![Ok(ActionResponse::Many(vec![
      json!({"id": 1, "name": "fresh"}),
      json!({"id": 2, "name": "new"}),
    ]))]);
    let resource = Resource::define(
      config(),
      Arc::clone(&transport) as Arc<dyn RemoteTransport>,
      Arc::clone(&store) as Arc<dyn StoreAdapter>,
    )
    .expect("define");

    let collection = resource.query(Map::new()).await.expect("query");
    resource.sync_to_local(&collection).expect("sync");

    let list = resource.attributes_list();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].get("name"), Some(&json!("fresh")));
    assert_eq!(list[0].local_id(), Some("a"));
    assert_eq!(list[1].object_id(), Some(&json!(2)));
    assert!(list[1].local_id().is_some());

    // Syncing the same collection again changes nothing structurally.
    resource.sync_to_local(&collection).expect("second sync");
    assert_eq!(resource.attributes_list().len(), 2);

    let stored = store.get("notes").expect("get").expect("present");
    assert_eq!(stored.len(), 2);
  }

  #[tokio::test]
  async fn test_offline_mirror_end_to_end() {
    let _ = tracing_subscriber::fmt()
      .with_env_filter("storable=debug")
      .try_init();

    let store = Arc::new(MemoryStore::new());
    let transport = MockTransport::scripted(vec![Ok(ActionResponse::Many(vec![
      json!({"id": 1, "name": "first", "date": 0}),
      json!({"id": 2, "name": "second"}),
    ]))]);

    let resource = Resource::define(
      config(),
      Arc::clone(&transport) as Arc<dyn RemoteTransport>,
      Arc::clone(&store) as Arc<dyn StoreAdapter>,
    )
    .expect("define");

    // Remote query, mirrored locally.
    let notes = resource.query(Map::new()).await.expect("query");
    assert_eq!(
      notes.first().expect("first").get("date"),
      Some(&json!("1970-01-01T00:00:00.000Z"))
    );
    resource.sync_to_local(&notes).expect("sync");

    // Offline: edit against the mirror.
    let mut note = resource.local_find_by_id(&json!(1)).expect("cached");
    note.set("starred", true);
    note.save_local(None).expect("save");

    // A second handle sees the edit after re-reading from the store.
    let other = resource.clone();
    other.read().expect("read");
    let list = other.attributes_list();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].get("starred"), Some(&json!(true)));

    // Navigation follows the mirror's list order.
    let second = other.local_find_by_id(&json!(2)).expect("second");
    assert_eq!(
      second.next().expect("next").get("name"),
      Some(&json!("first"))
    );
    assert!(second.prev().is_none());
  }

  #[test]
  fn test_config_parses_from_yaml() {
    let config = ResourceConfig::from_yaml(
      r#"
name: notes
url: "https://api.example.com/notes/:id"
param_defaults:
  lang: en
actions:
  history:
    method: GET
    url: "https://api.example.com/notes/:id/history"
    shape: many
"#,
    )
    .expect("parse");

    assert_eq!(config.name, "notes");
    assert_eq!(config.param_defaults.get("lang"), Some(&json!("en")));
    assert_eq!(config.actions["history"].shape, ResultShape::Many);
    assert!(config.options.strip_trailing_slashes);
  }
}
