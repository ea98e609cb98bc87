//! Page objects and their property values.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::access::FieldDef;
use crate::cache::Entry;
use crate::client::Notion;
use crate::error::{Error, Result};
use crate::object::{Handle, RemoteObject};
use crate::property::PropertyType;
use crate::protocol::{ObjectId, ObjectKind, PAGES_PATH};

const PAGE_FIELDS: &[FieldDef] = &[
  FieldDef::read_only("object"),
  FieldDef::read_only("id"),
  FieldDef::read_only("created_time"),
  FieldDef::read_only("last_edited_time"),
  FieldDef::read_only("created_by"),
  FieldDef::read_only("last_edited_by"),
  FieldDef::read_only("parent"),
  FieldDef::read_only("url"),
  FieldDef::read_only("properties"),
  FieldDef::read_write("icon"),
  FieldDef::read_write("cover"),
  FieldDef::read_write("archived"),
];

/// Page object
#[derive(Debug, Clone)]
pub struct Page {
  handle: Handle,
}

impl RemoteObject for Page {
  const KIND: ObjectKind = ObjectKind::Page;
  const ENDPOINT: &'static str = PAGES_PATH;
  const FIELDS: &'static [FieldDef] = PAGE_FIELDS;

  fn handle(&self) -> &Handle {
    &self.handle
  }
}

impl Page {
  pub(crate) fn from_entry(client: Notion, entry: Arc<Entry>) -> Self {
    Self {
      handle: Handle::new(client, entry),
    }
  }

  pub fn client(&self) -> &Notion {
    self.handle.client()
  }

  /// Id of the database this page belongs to, if any.
  pub fn parent_database(&self) -> Option<ObjectId> {
    self
      .get("parent")?
      .get("database_id")
      .and_then(Value::as_str)
      .and_then(|id| ObjectId::parse(id).ok())
  }

  pub fn is_archived(&self) -> bool {
    self.get("archived").and_then(|v| v.as_bool()).unwrap_or(false)
  }

  pub fn archive(&self) -> Result<()> {
    self.set("archived", Value::Bool(true))
  }

  /// Raw property object as returned by the server.
  pub fn raw_property(&self, name: &str) -> Option<Value> {
    self.snapshot().get("properties")?.get(name).cloned()
  }

  pub fn property_type(&self, name: &str) -> Option<PropertyType> {
    let raw = self.raw_property(name)?;
    raw.get("type").and_then(Value::as_str).map(PropertyType::from_name)
  }

  /// Simplified value of one property.
  pub fn property(&self, name: &str) -> Option<Value> {
    let raw = self.raw_property(name)?;
    let kind = PropertyType::from_name(raw.get("type").and_then(Value::as_str).unwrap_or_default());
    Some(kind.extract(&raw))
  }

  /// Simplified values of all properties, by name.
  pub fn properties(&self) -> Map<String, Value> {
    let snapshot = self.snapshot();
    let Some(properties) = snapshot.get("properties").and_then(Value::as_object) else {
      return Map::new();
    };
    properties
      .iter()
      .map(|(name, raw)| {
        let kind = PropertyType::from_name(raw.get("type").and_then(Value::as_str).unwrap_or_default());
        (name.clone(), kind.extract(raw))
      })
      .collect()
  }

  /// Plain text of the title property.
  pub fn title(&self) -> String {
    let snapshot = self.snapshot();
    snapshot
      .get("properties")
      .and_then(Value::as_object)
      .and_then(|props| {
        props
          .values()
          .find(|raw| raw.get("type").and_then(Value::as_str) == Some("title"))
      })
      .map(|raw| PropertyType::Title.extract(raw))
      .and_then(|v| v.as_str().map(str::to_string))
      .unwrap_or_default()
  }

  /// Sets one property value through `PATCH v1/pages/{id}`.
  ///
  /// The value is checked against the property's type first; nothing is sent
  /// if the property is unknown, computed, or given the wrong kind of value.
  pub fn set_property(&self, name: &str, value: &Value) -> Result<()> {
    let kind = self
      .property_type(name)
      .ok_or_else(|| Error::Validation(format!("page {} has no property `{}`", self.id(), name)))?;
    let mut properties = Map::new();
    properties.insert(name.to_string(), kind.to_property(name, value)?);
    self
      .handle
      .update(Self::KIND, Self::ENDPOINT, "properties", Value::Object(properties))?;
    Ok(())
  }
}
