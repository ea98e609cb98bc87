//! Request transport for the REST API.
//!
//! Everything above this layer talks to a [`Transport`]; [`HttpTransport`] is
//! the blocking reqwest implementation used by a real session.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::client::ClientOptions;
use crate::error::{Error, Result};

/// Metadata of a completed response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMeta {
  pub status: u16,
  pub request_id: Option<String>,
}

/// Synchronous JSON request collaborator.
///
/// Paths are relative to the API root (e.g. `v1/pages/<id>`). Failures are
/// returned as-is; nothing at this layer retries.
pub trait Transport: Send + Sync {
  fn get(&self, path: &str) -> Result<(ResponseMeta, Value)>;

  fn post(&self, path: &str, payload: &Value) -> Result<(ResponseMeta, Value)>;

  fn patch(&self, path: &str, payload: &Value) -> Result<(ResponseMeta, Value)>;
}

/// Blocking HTTP transport with bearer authentication
#[derive(Debug)]
pub struct HttpTransport {
  client: Client,
  base_url: String,
}

impl HttpTransport {
  pub fn new(options: &ClientOptions) -> Result<Self> {
    let token = options
      .auth_token
      .as_deref()
      .ok_or_else(|| Error::Config("an integration token is required".to_string()))?;

    let mut headers = HeaderMap::new();
    let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
      .map_err(|e| Error::Config(format!("invalid token: {}", e)))?;
    headers.insert(AUTHORIZATION, bearer);
    let version = HeaderValue::from_str(&options.notion_version)
      .map_err(|e| Error::Config(format!("invalid API version: {}", e)))?;
    headers.insert("notion-version", version);

    let client = Client::builder()
      .default_headers(headers)
      .timeout(options.timeout.unwrap_or(Duration::from_secs(30)))
      .build()?;

    let mut base_url = options.base_url.clone();
    if !base_url.ends_with('/') {
      base_url.push('/');
    }

    Ok(Self { client, base_url })
  }

  fn send(&self, method: Method, path: &str, payload: Option<&Value>) -> Result<(ResponseMeta, Value)> {
    let url = format!("{}{}", self.base_url, path.trim_start_matches('/'));
    debug!(%method, path, "sending request");

    let mut request = self.client.request(method, &url);
    if let Some(body) = payload {
      request = request.json(body);
    }
    let response = request.send()?;

    let meta = ResponseMeta {
      status: response.status().as_u16(),
      request_id: response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string),
    };
    let success = response.status().is_success();
    let text = response.text()?;
    debug!(status = meta.status, path, bytes = text.len(), "received response");

    if !success {
      let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
      return Err(api_error(meta.status, &body));
    }
    let body: Value = serde_json::from_str(&text)?;
    Ok((meta, body))
  }
}

impl Transport for HttpTransport {
  fn get(&self, path: &str) -> Result<(ResponseMeta, Value)> {
    self.send(Method::GET, path, None)
  }

  fn post(&self, path: &str, payload: &Value) -> Result<(ResponseMeta, Value)> {
    self.send(Method::POST, path, Some(payload))
  }

  fn patch(&self, path: &str, payload: &Value) -> Result<(ResponseMeta, Value)> {
    self.send(Method::PATCH, path, Some(payload))
  }
}

/// Error body shape: `{"object": "error", "status": 400, "code": "...", "message": "..."}`
fn api_error(status: u16, body: &Value) -> Error {
  if let Value::String(raw) = body {
    return Error::Api {
      status,
      code: String::new(),
      message: raw.clone(),
    };
  }
  let field = |key: &str| {
    body
      .get(key)
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_string()
  };
  Error::Api {
    status,
    code: field("code"),
    message: field("message"),
  }
}
