//! HTTP transport with `:param` URL templates.

use color_eyre::{eyre::eyre, Result};
use serde_json::{Map, Value};
use url::Url;

use super::transport::{ActionRequest, ActionResponse, BoxFuture, Method, RemoteTransport, ResultShape};

/// Remote transport over plain JSON-speaking HTTP endpoints.
///
/// URL templates carry `:param` segments filled from the merged action
/// parameters; parameters left over after expansion become query parameters.
#[derive(Clone, Default)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> Self {
    Self::default()
  }

  /// Use a preconfigured client (auth headers, timeouts).
  pub fn with_client(client: reqwest::Client) -> Self {
    Self { client }
  }
}

impl RemoteTransport for HttpTransport {
  fn execute(&self, request: ActionRequest) -> BoxFuture<ActionResponse> {
    let client = self.client.clone();

    Box::pin(async move {
      let url = expand_template(&request.url, &request.params, request.strip_trailing_slashes)?;

      let mut builder = match request.method {
        Method::Get => client.get(url),
        Method::Post => client.post(url),
        Method::Put => client.put(url),
        Method::Patch => client.patch(url),
        Method::Delete => client.delete(url),
      };

      if let Some(body) = &request.body {
        builder = builder.json(body);
      }

      let response = builder
        .send()
        .await
        .map_err(|e| eyre!("Failed to execute action '{}': {}", request.name, e))?
        .error_for_status()
        .map_err(|e| eyre!("Action '{}' rejected: {}", request.name, e))?;

      match request.shape {
        ResultShape::Empty => Ok(ActionResponse::Empty),
        ResultShape::One => {
          let value: Value = response
            .json()
            .await
            .map_err(|e| eyre!("Failed to decode action '{}' response: {}", request.name, e))?;
          if value.is_array() {
            return Err(eyre!(
              "Action '{}' returned an array where a single result was declared",
              request.name
            ));
          }
          Ok(ActionResponse::One(value))
        }
        ResultShape::Many => {
          let value: Value = response
            .json()
            .await
            .map_err(|e| eyre!("Failed to decode action '{}' response: {}", request.name, e))?;
          match value {
            Value::Array(items) => Ok(ActionResponse::Many(items)),
            _ => Err(eyre!(
              "Action '{}' returned a single result where an array was declared",
              request.name
            )),
          }
        }
      }
    })
  }
}

/// Expand a `:param` URL template against the given parameters.
///
/// Template parameters absent from `params` expand to nothing and their
/// leftover slashes are collapsed. Parameters not consumed by the template
/// become query parameters.
fn expand_template(
  template: &str,
  params: &Map<String, Value>,
  strip_trailing_slashes: bool,
) -> Result<Url> {
  let mut expanded = String::with_capacity(template.len());
  let mut consumed: Vec<&str> = Vec::new();

  let mut remaining = template;
  loop {
    match remaining.find(':') {
      None => {
        expanded.push_str(remaining);
        break;
      }
      Some(pos) => {
        expanded.push_str(&remaining[..pos]);
        let after = &remaining[pos + 1..];

        if after.bytes().next().map(is_param_start).unwrap_or(false) {
          let name_len = after.bytes().take_while(|b| is_param_char(*b)).count();
          let name = &after[..name_len];
          if let Some(value) = params.get(name).and_then(param_to_string) {
            expanded.push_str(&value);
          }
          consumed.push(name);
          remaining = &after[name_len..];
        } else {
          // a bare colon (scheme separator, port)
          expanded.push(':');
          remaining = after;
        }
      }
    }
  }

  let cleaned = collapse_empty_segments(&expanded, strip_trailing_slashes);

  let mut url =
    Url::parse(&cleaned).map_err(|e| eyre!("Invalid action URL '{}': {}", cleaned, e))?;

  {
    let mut query = url.query_pairs_mut();
    for (name, value) in params {
      if consumed.contains(&name.as_str()) {
        continue;
      }
      if let Some(value) = param_to_string(value) {
        query.append_pair(name, &value);
      }
    }
  }

  // query_pairs_mut leaves an empty `?` behind when nothing was appended
  if url.query() == Some("") {
    url.set_query(None);
  }

  Ok(url)
}

fn is_param_start(byte: u8) -> bool {
  byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_param_char(byte: u8) -> bool {
  byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Scalar parameters participate in URLs; anything else is skipped.
fn param_to_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

/// Collapse the double slashes left behind by unfilled template parameters,
/// preserving the scheme separator.
fn collapse_empty_segments(raw: &str, strip_trailing_slashes: bool) -> String {
  let (scheme, rest) = match raw.split_once("://") {
    Some((scheme, rest)) => (Some(scheme), rest),
    None => (None, raw),
  };

  let mut collapsed = String::with_capacity(rest.len());
  let mut prev_slash = false;
  for c in rest.chars() {
    if c == '/' {
      if prev_slash {
        continue;
      }
      prev_slash = true;
    } else {
      prev_slash = false;
    }
    collapsed.push(c);
  }

  if strip_trailing_slashes {
    while collapsed.ends_with('/') {
      collapsed.pop();
    }
  }

  match scheme {
    Some(scheme) => format!("{}://{}", scheme, collapsed),
    None => collapsed,
  }
}
