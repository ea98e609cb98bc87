//! Database objects: schema, queries, page creation and tabular views.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::access::FieldDef;
use crate::cache::Entry;
use crate::client::Notion;
use crate::error::{Error, Result};
use crate::object::{Handle, RemoteObject};
use crate::page::Page;
use crate::pagination::QueriedPages;
use crate::property::{plain_text, FormulaType, PropertyType};
use crate::protocol::{ObjectKind, DATABASES_PATH, PAGES_PATH};
use crate::query::QueryBuilder;

const DATABASE_FIELDS: &[FieldDef] = &[
  FieldDef::read_only("object"),
  FieldDef::read_only("id"),
  FieldDef::read_only("created_time"),
  FieldDef::read_only("last_edited_time"),
  FieldDef::read_only("created_by"),
  FieldDef::read_only("last_edited_by"),
  FieldDef::read_only("parent"),
  FieldDef::read_only("url"),
  FieldDef::read_only("properties"),
  FieldDef::read_write("title").with_mutable_container(),
  FieldDef::read_write("icon"),
  FieldDef::read_write("cover"),
];

/// Column declaration of a database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
  pub id: String,
  pub name: String,
  pub kind: PropertyType,
  /// Result type of a formula column, when the schema states it
  pub formula: Option<FormulaType>,
}

impl PropertyDef {
  pub fn new(id: &str, name: &str, kind: PropertyType) -> Self {
    Self {
      id: id.to_string(),
      name: name.to_string(),
      kind,
      formula: None,
    }
  }

  pub fn with_formula(mut self, result: FormulaType) -> Self {
    self.formula = Some(result);
    self
  }
}

/// Columns of a database, in the order the server lists them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseSchema {
  properties: Vec<PropertyDef>,
}

impl DatabaseSchema {
  pub fn from_defs(properties: Vec<PropertyDef>) -> Self {
    Self { properties }
  }

  /// Reads the `properties` object of a database record.
  pub fn from_properties(properties: &Value) -> Result<Self> {
    let map = properties.as_object().ok_or_else(|| Error::SchemaAssertion {
      expected: "properties object".to_string(),
      found: properties.to_string(),
    })?;

    let properties = map
      .iter()
      .map(|(name, def)| {
        let kind = PropertyType::from_name(def.get("type").and_then(Value::as_str).unwrap_or_default());
        let formula = match kind {
          PropertyType::Formula => def
            .pointer("/formula/type")
            .and_then(Value::as_str)
            .and_then(FormulaType::from_name),
          _ => None,
        };
        PropertyDef {
          id: def.get("id").and_then(Value::as_str).unwrap_or(name.as_str()).to_string(),
          name: name.clone(),
          kind,
          formula,
        }
      })
      .collect();
    Ok(Self { properties })
  }

  pub fn get(&self, name: &str) -> Option<&PropertyDef> {
    self.properties.iter().find(|p| p.name == name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &PropertyDef> {
    self.properties.iter()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.properties.iter().map(|p| p.name.as_str())
  }

  /// The column holding page titles.
  pub fn title_property(&self) -> Option<&PropertyDef> {
    self.properties.iter().find(|p| p.kind == PropertyType::Title)
  }

  pub fn len(&self) -> usize {
    self.properties.len()
  }

  pub fn is_empty(&self) -> bool {
    self.properties.is_empty()
  }
}

/// Database object
#[derive(Debug, Clone)]
pub struct Database {
  handle: Handle,
}

impl RemoteObject for Database {
  const KIND: ObjectKind = ObjectKind::Database;
  const ENDPOINT: &'static str = DATABASES_PATH;
  const FIELDS: &'static [FieldDef] = DATABASE_FIELDS;

  fn handle(&self) -> &Handle {
    &self.handle
  }
}

impl Database {
  pub(crate) fn from_entry(client: Notion, entry: Arc<Entry>) -> Self {
    Self {
      handle: Handle::new(client, entry),
    }
  }

  pub fn client(&self) -> &Notion {
    self.handle.client()
  }

  pub fn schema(&self) -> Result<DatabaseSchema> {
    let snapshot = self.snapshot();
    let properties = snapshot.get("properties").ok_or_else(|| Error::SchemaAssertion {
      expected: "database with properties".to_string(),
      found: format!("database {} without properties", snapshot.id()),
    })?;
    DatabaseSchema::from_properties(properties)
  }

  /// Plain text of the database title.
  pub fn title(&self) -> String {
    self.get("title").map(|t| plain_text(&t)).unwrap_or_default()
  }

  pub fn set_title(&self, title: &str) -> Result<()> {
    self.set("title", json!([{ "type": "text", "text": { "content": title } }]))
  }

  pub fn query_path(&self) -> String {
    format!("{}/{}/query", DATABASES_PATH, self.id().compact())
  }

  pub fn query_builder(&self) -> QueryBuilder<'_> {
    QueryBuilder::new(self)
  }

  /// Compiles `expression` and issues the first query request.
  pub fn query(&self, expression: &str) -> Result<QueriedPages> {
    self.query_builder().filter(expression).run()
  }

  /// Every page of the database.
  pub fn pages(&self) -> Result<QueriedPages> {
    self.query_builder().run()
  }

  /// Creates a page in this database.
  ///
  /// `properties` maps column names to plain values (`"text"`, `2`, `true`,
  /// `["tag"]`, `"2022-03-25"`). Every entry is checked against the schema
  /// before anything is sent: the column must exist, be writable and accept
  /// the value.
  pub fn create_page(&self, properties: &Value) -> Result<Page> {
    let input = properties
      .as_object()
      .ok_or_else(|| Error::Validation(format!("page properties must be an object, got {}", properties)))?;
    let schema = self.schema()?;

    let mut wire = Map::new();
    for (name, value) in input {
      let def = schema.get(name).ok_or_else(|| {
        Error::Validation(format!("`{}` is not a property of database {}", name, self.id()))
      })?;
      if !def.kind.is_writable() {
        return Err(Error::Validation(format!(
          "`{}` ({}) is computed by the server and cannot be set",
          name, def.kind
        )));
      }
      if !def.kind.accepts(value) {
        return Err(Error::Validation(format!(
          "`{}` ({}) does not accept {}",
          name, def.kind, value
        )));
      }
      wire.insert(name.clone(), def.kind.to_property(name, value)?);
    }

    let payload = json!({
      "parent": { "database_id": self.id().to_string() },
      "properties": wire,
    });
    let (_, record) = self.client().transport().post(PAGES_PATH, &payload)?;
    let entry = self.client().cache().register(ObjectKind::Page, record)?;
    debug!(database = %self.id(), page = %entry.id(), "created page");
    Ok(Page::from_entry(self.client().clone(), entry))
  }

  /// Simplified values of each page, restricted to `columns` (all columns
  /// when empty), in column order. A column named twice appears once.
  pub fn rows(&self, pages: &[Page], columns: &[&str]) -> Result<Vec<Map<String, Value>>> {
    let columns = self.columns(columns)?;
    Ok(
      pages
        .iter()
        .map(|page| {
          let values = page.properties();
          columns
            .iter()
            .map(|c| (c.clone(), values.get(c).cloned().unwrap_or(Value::Null)))
            .collect()
        })
        .collect(),
    )
  }

  /// Value rows in the order of `columns`, led by a header row when
  /// `header` is set. No pages give an empty table, header included.
  pub fn table(&self, pages: &[Page], columns: &[&str], header: bool) -> Result<Vec<Vec<Value>>> {
    let names = self.columns(columns)?;
    if pages.is_empty() {
      return Ok(Vec::new());
    }
    let mut table = Vec::with_capacity(pages.len() + 1);
    if header {
      table.push(names.iter().map(|n| Value::String(n.clone())).collect());
    }
    for page in pages {
      let values = page.properties();
      table.push(names.iter().map(|n| values.get(n).cloned().unwrap_or(Value::Null)).collect());
    }
    Ok(table)
  }

  fn columns(&self, requested: &[&str]) -> Result<Vec<String>> {
    let schema = self.schema()?;
    if requested.is_empty() {
      return Ok(schema.names().map(str::to_string).collect());
    }
    requested
      .iter()
      .map(|name| match schema.get(name) {
        Some(def) => Ok(def.name.clone()),
        None => Err(Error::Validation(format!("`{}` is not a property of this database", name))),
      })
      .collect()
  }
}
