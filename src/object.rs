//! Shared behavior of databases and pages.
//!
//! A remote object is a thin [`Handle`]: the session plus the cache entry for
//! its id. Reads go through the entry's current snapshot. Writes are checked
//! against the object's field table and, when allowed, sent to the server; the
//! response is merged into the entry, so every handle for the id sees it.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::access::{self, Access, Compound, FieldDef};
use crate::cache::{Entry, Snapshot};
use crate::client::Notion;
use crate::error::Result;
use crate::protocol::{ObjectId, ObjectKind};

/// Session and cache entry of one remote object
#[derive(Debug, Clone)]
pub struct Handle {
  client: Notion,
  entry: Arc<Entry>,
}

impl Handle {
  pub(crate) fn new(client: Notion, entry: Arc<Entry>) -> Self {
    Self { client, entry }
  }

  pub fn client(&self) -> &Notion {
    &self.client
  }

  pub fn entry(&self) -> &Arc<Entry> {
    &self.entry
  }

  pub fn snapshot(&self) -> Arc<Snapshot> {
    self.entry.load()
  }

  /// Sends `PATCH {endpoint}/{id}` and merges the response into this entry.
  ///
  /// No field table check happens here: callers decide what may be written.
  pub(crate) fn update(
    &self,
    kind: ObjectKind,
    endpoint: &str,
    name: &str,
    contents: Value,
  ) -> Result<Arc<Snapshot>> {
    let mut payload = Map::new();
    payload.insert(name.to_string(), contents);
    let path = format!("{}/{}", endpoint, self.entry.id());
    let (_, body) = self.client.transport().patch(&path, &Value::Object(payload))?;
    self.client.cache().apply_to(&self.entry, kind, body)
  }

  /// Re-reads the object and merges the full record into this entry.
  pub(crate) fn refresh(&self, kind: ObjectKind, endpoint: &str) -> Result<Arc<Snapshot>> {
    let path = format!("{}/{}", endpoint, self.entry.id());
    let (_, body) = self.client.transport().get(&path)?;
    self.client.cache().apply_to(&self.entry, kind, body)
  }
}

pub trait RemoteObject {
  const KIND: ObjectKind;
  /// Collection path of this kind, e.g. `v1/pages`
  const ENDPOINT: &'static str;
  const FIELDS: &'static [FieldDef];

  fn handle(&self) -> &Handle;

  fn id(&self) -> ObjectId {
    self.handle().entry().id()
  }

  fn snapshot(&self) -> Arc<Snapshot> {
    self.handle().snapshot()
  }

  fn version(&self) -> u64 {
    self.snapshot().version()
  }

  /// Current value of a field.
  fn get(&self, name: &str) -> Option<Value> {
    self.snapshot().get(name).cloned()
  }

  /// Dictionary or list field as a container, mutable only if declared so.
  fn compound(&self, name: &str) -> Option<Compound> {
    let value = self.get(name)?;
    if value.is_object() || value.is_array() {
      Some(Compound::for_field(access::lookup(Self::FIELDS, name), value))
    } else {
      None
    }
  }

  fn access(&self, name: &str) -> Access {
    access::access_of(Self::FIELDS, name)
  }

  /// Assigns a field on the server. Read-only fields fail without a request;
  /// read-write fields always issue one PATCH, even for an unchanged value.
  fn set(&self, name: &str, value: Value) -> Result<()> {
    access::check_assignable(Self::KIND.as_str(), Self::FIELDS, name)?;
    self.handle().update(Self::KIND, Self::ENDPOINT, name, value)?;
    Ok(())
  }

  /// Writes back a container obtained from [`compound`](Self::compound).
  fn set_compound(&self, name: &str, compound: Compound) -> Result<()> {
    self.set(name, compound.into_value())
  }

  fn refresh(&self) -> Result<()> {
    self.handle().refresh(Self::KIND, Self::ENDPOINT)?;
    Ok(())
  }

  /// Whether both handles share one cache entry.
  fn same_object(&self, other: &Self) -> bool
  where
    Self: Sized,
  {
    Arc::ptr_eq(self.handle().entry(), other.handle().entry())
  }
}
