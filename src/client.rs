//! Session handle and configuration.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::IdentityCache;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::page::Page;
use crate::protocol::{ObjectId, ObjectKind, DATABASES_PATH, DEFAULT_BASE_URL, NOTION_VERSION, PAGES_PATH};
use crate::transport::{HttpTransport, Transport};

/// Session configuration
#[derive(Debug, Clone)]
pub struct ClientOptions {
  pub base_url: String,
  pub auth_token: Option<String>,
  pub notion_version: String,
  pub timeout: Option<Duration>,
}

impl Default for ClientOptions {
  fn default() -> Self {
    Self::new(DEFAULT_BASE_URL)
  }
}

impl ClientOptions {
  pub fn new(base_url: &str) -> Self {
    Self {
      base_url: base_url.to_string(),
      auth_token: None,
      notion_version: NOTION_VERSION.to_string(),
      timeout: None,
    }
  }

  pub fn with_auth(mut self, token: &str) -> Self {
    self.auth_token = Some(token.to_string());
    self
  }

  pub fn with_notion_version(mut self, version: &str) -> Self {
    self.notion_version = version.to_string();
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  /// Reads `NOTION_TOKEN`, and optionally `NOTION_BASE_URL` and `NOTION_VERSION`.
  pub fn from_env() -> Result<Self> {
    let token = env::var("NOTION_TOKEN")
      .map_err(|_| Error::Config("NOTION_TOKEN is not set".to_string()))?;
    let mut options = match env::var("NOTION_BASE_URL") {
      Ok(url) => Self::new(&url),
      Err(_) => Self::default(),
    };
    if let Ok(version) = env::var("NOTION_VERSION") {
      options = options.with_notion_version(&version);
    }
    Ok(options.with_auth(&token))
  }
}

/// Notion session
///
/// Cloning is cheap; clones share the transport and the identity cache, so a
/// page fetched through one clone is the same object when fetched through another.
#[derive(Clone)]
pub struct Notion {
  transport: Arc<dyn Transport>,
  cache: Arc<IdentityCache>,
}

impl std::fmt::Debug for Notion {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Notion")
      .field("cached_objects", &self.cache.len())
      .finish()
  }
}

impl Notion {
  /// Session against the public API with an integration token.
  pub fn new(token: &str) -> Result<Self> {
    Self::with_options(ClientOptions::default().with_auth(token))
  }

  pub fn with_options(options: ClientOptions) -> Result<Self> {
    let transport = HttpTransport::new(&options)?;
    Ok(Self::with_transport(Arc::new(transport)))
  }

  /// Session over any transport, with a fresh identity cache.
  pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
    Self::from_parts(transport, Arc::new(IdentityCache::new()))
  }

  pub fn from_parts(transport: Arc<dyn Transport>, cache: Arc<IdentityCache>) -> Self {
    Self { transport, cache }
  }

  pub fn cache(&self) -> &Arc<IdentityCache> {
    &self.cache
  }

  pub(crate) fn transport(&self) -> &dyn Transport {
    self.transport.as_ref()
  }

  /// Fetches a database by id or URL.
  pub fn get_database(&self, id: &str) -> Result<Database> {
    let id = ObjectId::parse(id)?;
    let (_, record) = self.transport.get(&format!("{}/{}", DATABASES_PATH, id))?;
    let entry = self.cache.register(ObjectKind::Database, record)?;
    Ok(Database::from_entry(self.clone(), entry))
  }

  /// Fetches a page by id or URL.
  pub fn get_page(&self, id: &str) -> Result<Page> {
    let id = ObjectId::parse(id)?;
    let (_, record) = self.transport.get(&format!("{}/{}", PAGES_PATH, id))?;
    let entry = self.cache.register(ObjectKind::Page, record)?;
    Ok(Page::from_entry(self.clone(), entry))
  }
}
