//! Transport contract for remote resource actions.
//!
//! Actions are declared up front as data: name, method, URL override, extra
//! parameter defaults and the shape of the result. The transport decodes
//! every response against that declared shape, so callers always receive a
//! tagged result instead of inspecting runtime values.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use color_eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A boxed future resolving to a transport result.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// HTTP method of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

/// Declared shape of an action's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
  /// One object.
  #[default]
  One,
  /// An array of objects, wrapped into a collection by the resource.
  Many,
  /// No payload expected (deletes and the like).
  Empty,
}

/// One remote action definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
  pub method: Method,
  /// Overrides the resource-level URL template when set.
  #[serde(default)]
  pub url: Option<String>,
  /// Extra parameter defaults, merged over the resource-level ones.
  #[serde(default)]
  pub params: Map<String, Value>,
  #[serde(default)]
  pub shape: ResultShape,
}

impl ActionDef {
  pub fn new(method: Method) -> Self {
    Self {
      method,
      url: None,
      params: Map::new(),
      shape: ResultShape::default(),
    }
  }

  pub fn with_url(mut self, url: impl Into<String>) -> Self {
    self.url = Some(url.into());
    self
  }

  pub fn with_shape(mut self, shape: ResultShape) -> Self {
    self.shape = shape;
    self
  }

  pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.params.insert(name.into(), value.into());
    self
  }
}

/// A fully resolved request handed to the transport.
#[derive(Debug, Clone)]
pub struct ActionRequest {
  pub name: String,
  pub method: Method,
  /// URL template, pre-expansion. `:param` segments are filled from `params`.
  pub url: String,
  pub params: Map<String, Value>,
  pub body: Option<Value>,
  pub shape: ResultShape,
  pub strip_trailing_slashes: bool,
}

/// Raw action result, decoded per the declared shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResponse {
  One(Value),
  Many(Vec<Value>),
  Empty,
}

/// Trait for remote transports.
///
/// Implementations own the wire protocol; failures propagate unchanged to
/// the caller's completion signal.
pub trait RemoteTransport: Send + Sync {
  fn execute(&self, request: ActionRequest) -> BoxFuture<ActionResponse>;
}

/// The default action set every resource type starts from.
pub fn default_actions() -> HashMap<String, ActionDef> {
  HashMap::from([
    ("get".to_string(), ActionDef::new(Method::Get)),
    ("save".to_string(), ActionDef::new(Method::Post)),
    (
      "query".to_string(),
      ActionDef::new(Method::Get).with_shape(ResultShape::Many),
    ),
    (
      "remove".to_string(),
      ActionDef::new(Method::Delete).with_shape(ResultShape::Empty),
    ),
    (
      "delete".to_string(),
      ActionDef::new(Method::Delete).with_shape(ResultShape::Empty),
    ),
  ])
}
