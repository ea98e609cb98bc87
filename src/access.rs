//! Field write capabilities for remote objects.
//!
//! Every object kind declares a static table of [`FieldDef`]s. A field is either
//! read-only (set once, from a server record) or read-write (assignable, but
//! only through the update protocol). Fields the server returns that are not in
//! the table are treated as read-only.
//!
//! Dictionary and list values are handed out as [`Compound`] containers, which
//! refuse in-place edits unless their field declares a mutable container.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Write capability of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  ReadOnly,
  ReadWrite,
}

/// Whether a composite value may be edited in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
  Frozen,
  Mutable,
}

/// Class-level definition of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
  pub name: &'static str,
  pub access: Access,
  pub container: Container,
}

impl FieldDef {
  pub const fn read_only(name: &'static str) -> Self {
    Self {
      name,
      access: Access::ReadOnly,
      container: Container::Frozen,
    }
  }

  pub const fn read_write(name: &'static str) -> Self {
    Self {
      name,
      access: Access::ReadWrite,
      container: Container::Frozen,
    }
  }

  pub const fn with_mutable_container(mut self) -> Self {
    self.container = Container::Mutable;
    self
  }
}

pub fn lookup<'a>(fields: &'a [FieldDef], name: &str) -> Option<&'a FieldDef> {
  fields.iter().find(|f| f.name == name)
}

pub fn access_of(fields: &[FieldDef], name: &str) -> Access {
  lookup(fields, name).map_or(Access::ReadOnly, |f| f.access)
}

/// Fails unless `name` is a read-write field of the table.
pub fn check_assignable(owner: &str, fields: &[FieldDef], name: &str) -> Result<()> {
  match access_of(fields, name) {
    Access::ReadWrite => Ok(()),
    Access::ReadOnly => Err(Error::PropertyAccess(format!(
      "`{}` is a read-only field of {}",
      name, owner
    ))),
  }
}

/// A dictionary or list value with an explicit mutability flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Compound {
  value: Value,
  mutable: bool,
}

impl Compound {
  pub fn frozen(value: Value) -> Self {
    Self { value, mutable: false }
  }

  pub fn mutable(value: Value) -> Self {
    Self { value, mutable: true }
  }

  pub(crate) fn for_field(def: Option<&FieldDef>, value: Value) -> Self {
    match def.map(|d| d.container) {
      Some(Container::Mutable) => Self::mutable(value),
      _ => Self::frozen(value),
    }
  }

  pub fn is_mutable(&self) -> bool {
    self.mutable
  }

  pub fn value(&self) -> &Value {
    &self.value
  }

  pub fn into_value(self) -> Value {
    self.value
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.value.as_object().and_then(|m| m.get(key))
  }

  pub fn at(&self, index: usize) -> Option<&Value> {
    self.value.as_array().and_then(|a| a.get(index))
  }

  pub fn len(&self) -> usize {
    match &self.value {
      Value::Object(m) => m.len(),
      Value::Array(a) => a.len(),
      _ => 0,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<Option<Value>> {
    Ok(self.object_mut()?.insert(key.into(), value))
  }

  pub fn remove(&mut self, key: &str) -> Result<Option<Value>> {
    Ok(self.object_mut()?.remove(key))
  }

  pub fn push(&mut self, value: Value) -> Result<()> {
    self.array_mut()?.push(value);
    Ok(())
  }

  pub fn set_at(&mut self, index: usize, value: Value) -> Result<()> {
    let array = self.array_mut()?;
    let len = array.len();
    let slot = array
      .get_mut(index)
      .ok_or_else(|| Error::PropertyAccess(format!("index {} out of bounds for length {}", index, len)))?;
    *slot = value;
    Ok(())
  }

  pub fn clear(&mut self) -> Result<()> {
    self.ensure_mutable()?;
    match &mut self.value {
      Value::Object(m) => m.clear(),
      Value::Array(a) => a.clear(),
      _ => {}
    }
    Ok(())
  }

  fn ensure_mutable(&self) -> Result<()> {
    if self.mutable {
      Ok(())
    } else {
      Err(Error::PropertyAccess("container is immutable".to_string()))
    }
  }

  fn object_mut(&mut self) -> Result<&mut Map<String, Value>> {
    self.ensure_mutable()?;
    self
      .value
      .as_object_mut()
      .ok_or_else(|| Error::PropertyAccess("container is not a dictionary".to_string()))
  }

  fn array_mut(&mut self) -> Result<&mut Vec<Value>> {
    self.ensure_mutable()?;
    self
      .value
      .as_array_mut()
      .ok_or_else(|| Error::PropertyAccess("container is not a list".to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  const FIELDS: &[FieldDef] = &[
    FieldDef::read_only("id"),
    FieldDef::read_write("icon"),
    FieldDef::read_write("title").with_mutable_container(),
  ];

  #[test]
  fn test_unlisted_fields_are_read_only() {
    assert_eq!(access_of(FIELDS, "icon"), Access::ReadWrite);
    assert_eq!(access_of(FIELDS, "id"), Access::ReadOnly);
    assert_eq!(access_of(FIELDS, "whatever"), Access::ReadOnly);
  }

  #[test]
  fn test_check_assignable() {
    assert!(check_assignable("page", FIELDS, "icon").is_ok());
    let err = check_assignable("page", FIELDS, "id").unwrap_err();
    assert!(matches!(err, Error::PropertyAccess(msg) if msg.contains("`id`")));
  }

  #[test]
  fn test_frozen_container_rejects_edits() {
    let mut dict = Compound::frozen(json!({"a": 1}));
    assert!(matches!(dict.insert("b", json!(2)), Err(Error::PropertyAccess(_))));
    assert!(matches!(dict.remove("a"), Err(Error::PropertyAccess(_))));
    assert_eq!(dict.get("a"), Some(&json!(1)));

    let mut list = Compound::frozen(json!([1, 2]));
    assert!(list.push(json!(3)).is_err());
    assert!(list.set_at(0, json!(9)).is_err());
    assert!(list.clear().is_err());
    assert_eq!(list.len(), 2);
  }

  #[test]
  fn test_mutable_container_allows_edits() {
    let mut list = Compound::mutable(json!([{"plain_text": "a"}]));
    list.push(json!({"plain_text": "b"})).unwrap();
    list.set_at(0, json!({"plain_text": "z"})).unwrap();
    assert_eq!(list.value(), &json!([{"plain_text": "z"}, {"plain_text": "b"}]));
    assert!(list.set_at(5, json!(null)).is_err());
  }

  #[test]
  fn test_for_field_follows_declaration() {
    let title = lookup(FIELDS, "title");
    assert!(Compound::for_field(title, json!([])).is_mutable());
    assert!(!Compound::for_field(lookup(FIELDS, "icon"), json!({})).is_mutable());
    assert!(!Compound::for_field(None, json!({})).is_mutable());
  }
}
