//! Property types of database columns and page values.
//!
//! A [`PropertyType`] knows how a column is named on the wire, whether page
//! values of that type can be written, which JSON inputs it accepts, how to
//! convert an input into the API's value shape, and how to read a page value
//! back as a plain JSON value.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::protocol::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
  Title,
  RichText,
  Number,
  Select,
  MultiSelect,
  Date,
  People,
  Files,
  Checkbox,
  Url,
  Email,
  PhoneNumber,
  Formula,
  Relation,
  Rollup,
  CreatedTime,
  CreatedBy,
  LastEditedTime,
  LastEditedBy,
  Unsupported,
}

/// Groups of types that share filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Family {
  Text,
  Number,
  Checkbox,
  Select,
  MultiSelect,
  Date,
  Person,
  Relation,
  Files,
  Computed,
}

/// Result type of a formula column; formula filters are written against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaType {
  String,
  Number,
  Boolean,
  Date,
}

impl FormulaType {
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "string" => Some(Self::String),
      "number" => Some(Self::Number),
      "boolean" => Some(Self::Boolean),
      "date" => Some(Self::Date),
      _ => None,
    }
  }

  /// Condition key nested under `"formula"` in a filter.
  pub fn filter_key(&self) -> &'static str {
    match self {
      Self::String => "string",
      Self::Number => "number",
      Self::Boolean => "checkbox",
      Self::Date => "date",
    }
  }

  pub(crate) fn family(&self) -> Family {
    match self {
      Self::String => Family::Text,
      Self::Number => Family::Number,
      Self::Boolean => Family::Checkbox,
      Self::Date => Family::Date,
    }
  }
}

impl PropertyType {
  pub fn from_name(name: &str) -> Self {
    match name {
      "title" => Self::Title,
      "rich_text" => Self::RichText,
      "number" => Self::Number,
      "select" => Self::Select,
      "multi_select" => Self::MultiSelect,
      "date" => Self::Date,
      "people" => Self::People,
      "files" => Self::Files,
      "checkbox" => Self::Checkbox,
      "url" => Self::Url,
      "email" => Self::Email,
      "phone_number" => Self::PhoneNumber,
      "formula" => Self::Formula,
      "relation" => Self::Relation,
      "rollup" => Self::Rollup,
      "created_time" => Self::CreatedTime,
      "created_by" => Self::CreatedBy,
      "last_edited_time" => Self::LastEditedTime,
      "last_edited_by" => Self::LastEditedBy,
      _ => Self::Unsupported,
    }
  }

  /// Wire name; also the type key of a filter condition.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Title => "title",
      Self::RichText => "rich_text",
      Self::Number => "number",
      Self::Select => "select",
      Self::MultiSelect => "multi_select",
      Self::Date => "date",
      Self::People => "people",
      Self::Files => "files",
      Self::Checkbox => "checkbox",
      Self::Url => "url",
      Self::Email => "email",
      Self::PhoneNumber => "phone_number",
      Self::Formula => "formula",
      Self::Relation => "relation",
      Self::Rollup => "rollup",
      Self::CreatedTime => "created_time",
      Self::CreatedBy => "created_by",
      Self::LastEditedTime => "last_edited_time",
      Self::LastEditedBy => "last_edited_by",
      Self::Unsupported => "unsupported",
    }
  }

  pub(crate) fn family(&self) -> Family {
    match self {
      Self::Title | Self::RichText | Self::Url | Self::Email | Self::PhoneNumber => Family::Text,
      Self::Number => Family::Number,
      Self::Checkbox => Family::Checkbox,
      Self::Select => Family::Select,
      Self::MultiSelect => Family::MultiSelect,
      Self::Date | Self::CreatedTime | Self::LastEditedTime => Family::Date,
      Self::People | Self::CreatedBy | Self::LastEditedBy => Family::Person,
      Self::Relation => Family::Relation,
      Self::Files => Family::Files,
      Self::Formula | Self::Rollup | Self::Unsupported => Family::Computed,
    }
  }

  /// Whether page values of this type can be set by a client.
  pub fn is_writable(&self) -> bool {
    !matches!(
      self,
      Self::Formula
        | Self::Rollup
        | Self::CreatedTime
        | Self::CreatedBy
        | Self::LastEditedTime
        | Self::LastEditedBy
        | Self::Unsupported
    )
  }

  /// Whether `value` has a JSON shape this type takes as input.
  pub fn accepts(&self, value: &Value) -> bool {
    match self {
      Self::Title | Self::RichText => value.is_string(),
      Self::Url | Self::Email | Self::PhoneNumber | Self::Select | Self::Date => {
        value.is_string() || value.is_null()
      }
      Self::Number => value.is_number() || value.is_null(),
      Self::Checkbox => value.is_boolean(),
      Self::MultiSelect | Self::People | Self::Relation | Self::Files => string_list(value).is_some(),
      _ => false,
    }
  }

  /// Converts an accepted input into the API's value shape.
  pub fn to_wire(&self, name: &str, value: &Value) -> Result<Value> {
    if !self.is_writable() {
      return Err(Error::Validation(format!("`{}` ({}) is not writable", name, self)));
    }
    if !self.accepts(value) {
      return Err(Error::Validation(format!(
        "`{}` ({}) does not accept {}",
        name, self, value
      )));
    }

    let wire = match self {
      Self::Title | Self::RichText => json!([{
        "type": "text",
        "text": { "content": value },
      }]),
      Self::Number | Self::Checkbox | Self::Url | Self::Email | Self::PhoneNumber => value.clone(),
      Self::Select if value.is_null() => Value::Null,
      Self::Select => json!({ "name": value }),
      Self::Date => match value.as_str() {
        None => Value::Null,
        Some(date) if is_iso_date(date) => json!({ "start": date }),
        Some(date) => {
          return Err(Error::Validation(format!(
            "`{}` expects an ISO 8601 date, got {:?}",
            name, date
          )))
        }
      },
      Self::MultiSelect => list(value, |s| Ok(json!({ "name": s })))?,
      Self::People => list(value, |s| Ok(json!({ "object": "user", "id": parse_id(name, s)? })))?,
      Self::Relation => list(value, |s| Ok(json!({ "id": parse_id(name, s)? })))?,
      Self::Files => list(value, |s| {
        Ok(json!({ "name": s, "type": "external", "external": { "url": s } }))
      })?,
      _ => Value::Null,
    };
    Ok(wire)
  }

  /// Page property value as sent in a `properties` object: `{"<type>": <wire>}`.
  pub fn to_property(&self, name: &str, value: &Value) -> Result<Value> {
    let wire = self.to_wire(name, value)?;
    let mut property = serde_json::Map::new();
    property.insert(self.as_str().to_string(), wire);
    Ok(Value::Object(property))
  }

  /// Reads a page property (`{"id": .., "type": .., "<type>": ..}`) as a plain value.
  pub fn extract(&self, property: &Value) -> Value {
    let inner = property.get(self.as_str()).unwrap_or(&Value::Null);
    match self {
      Self::Title | Self::RichText => Value::String(plain_text(inner)),
      Self::Number
      | Self::Checkbox
      | Self::Url
      | Self::Email
      | Self::PhoneNumber
      | Self::CreatedTime
      | Self::LastEditedTime => inner.clone(),
      Self::Select => inner.get("name").cloned().unwrap_or(Value::Null),
      Self::MultiSelect | Self::Files => pluck(inner, "name"),
      Self::People | Self::Relation => pluck(inner, "id"),
      Self::Date => inner.get("start").cloned().unwrap_or(Value::Null),
      Self::CreatedBy | Self::LastEditedBy => inner.get("id").cloned().unwrap_or(Value::Null),
      Self::Formula | Self::Rollup => inner
        .get("type")
        .and_then(Value::as_str)
        .and_then(|kind| inner.get(kind))
        .cloned()
        .unwrap_or(Value::Null),
      Self::Unsupported => property.clone(),
    }
  }
}

impl fmt::Display for PropertyType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Concatenated `plain_text` of a rich text array.
pub fn plain_text(rich_text: &Value) -> String {
  rich_text
    .as_array()
    .map(|parts| {
      parts
        .iter()
        .filter_map(|p| p.get("plain_text").and_then(Value::as_str))
        .collect()
    })
    .unwrap_or_default()
}

/// Date, local date-time or offset date-time in ISO 8601 form.
pub(crate) fn is_iso_date(input: &str) -> bool {
  NaiveDate::parse_from_str(input, "%Y-%m-%d").is_ok()
    || DateTime::parse_from_rfc3339(input).is_ok()
    || NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S").is_ok()
    || NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M").is_ok()
}

fn string_list(value: &Value) -> Option<Vec<&str>> {
  match value {
    Value::String(s) => Some(vec![s.as_str()]),
    Value::Array(items) => items.iter().map(Value::as_str).collect(),
    _ => None,
  }
}

fn list(value: &Value, item: impl Fn(&str) -> Result<Value>) -> Result<Value> {
  string_list(value)
    .unwrap_or_default()
    .into_iter()
    .map(item)
    .collect::<Result<Vec<_>>>()
    .map(Value::Array)
}

fn pluck(items: &Value, key: &str) -> Value {
  Value::Array(
    items
      .as_array()
      .map(|a| a.iter().filter_map(|i| i.get(key).cloned()).collect())
      .unwrap_or_default(),
  )
}

fn parse_id(name: &str, raw: &str) -> Result<String> {
  ObjectId::parse(raw)
    .map(|id| id.to_string())
    .map_err(|_| Error::Validation(format!("`{}` expects object ids, got {:?}", name, raw)))
}
