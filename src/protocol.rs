//! Wire constants and types shared with the Notion REST API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/";

/// API version sent with every request
pub const NOTION_VERSION: &str = "2022-02-22";

/// Endpoint prefix for database resources
pub const DATABASES_PATH: &str = "v1/databases";

/// Endpoint prefix for page resources
pub const PAGES_PATH: &str = "v1/pages";

/// Largest page size the query endpoint accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Kind tag carried in the `object` field of every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
  Database,
  Page,
  Block,
  User,
}

impl ObjectKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Database => "database",
      Self::Page => "page",
      Self::Block => "block",
      Self::User => "user",
    }
  }
}

impl TryFrom<&str> for ObjectKind {
  type Error = ();
  fn try_from(v: &str) -> std::result::Result<Self, Self::Error> {
    match v {
      "database" => Ok(Self::Database),
      "page" => Ok(Self::Page),
      "block" => Ok(Self::Block),
      "user" => Ok(Self::User),
      _ => Err(()),
    }
  }
}

impl fmt::Display for ObjectKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

fn id_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{12}")
      .expect("id pattern is a valid regex")
  })
}

/// Globally unique id of a remote object.
///
/// Accepts the dashed UUID form the API returns, the compact 32-hex form shown
/// in share links, or a whole Notion URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
  pub fn new(uuid: Uuid) -> Self {
    Self(uuid)
  }

  pub fn parse(input: &str) -> Result<Self> {
    let trimmed = input.trim();
    if let Ok(uuid) = Uuid::parse_str(trimmed) {
      return Ok(Self(uuid));
    }

    // Share links put view ids in the query string; only the path names the object.
    let path = trimmed.split(&['?', '#'][..]).next().unwrap_or_default();
    id_pattern()
      .find_iter(path)
      .last()
      .and_then(|m| Uuid::parse_str(m.as_str()).ok())
      .map(Self)
      .ok_or_else(|| Error::InvalidId(input.to_string()))
  }

  pub fn as_uuid(&self) -> &Uuid {
    &self.0
  }

  /// Dash-less form used in the query endpoint path.
  pub fn compact(&self) -> String {
    self.0.simple().to_string()
  }
}

impl fmt::Display for ObjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.hyphenated())
  }
}

impl FromStr for ObjectId {
  type Err = Error;
  fn from_str(s: &str) -> Result<Self> {
    Self::parse(s)
  }
}

/// One batch returned by `POST v1/databases/{id}/query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
  #[serde(default = "list_object")]
  pub object: String,
  pub results: Vec<serde_json::Value>,
  #[serde(default)]
  pub next_cursor: Option<String>,
  #[serde(default)]
  pub has_more: bool,
}

fn list_object() -> String {
  "list".to_string()
}
