//! Identity cache and update protocol.
//!
//! The cache maps a remote id to a shared [`Entry`]. Every handle for that id
//! holds the same `Arc<Entry>`, so a targeted update is observed through all of
//! them. An entry stores an immutable, versioned [`Snapshot`]; updates build a
//! new snapshot and swap it in under the entry's write lock, so readers see
//! either the old state or the new one, never a mix.
//!
//! Two construction paths exist:
//!
//! - [`IdentityCache::register`] (fresh fetch): builds a new entry and makes it
//!   the registered one for its id. Nothing carries over from an earlier entry.
//! - [`IdentityCache::apply`] (targeted update): replaces the contents of the
//!   registered entry, copying forward every field the new record omits.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{ObjectId, ObjectKind};

/// Immutable state of a remote object at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    id: ObjectId,
    kind: ObjectKind,
    version: u64,
    fields: Map<String, Value>,
}

impl Snapshot {
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Starts at 0 and increments on every targeted update.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Shared slot holding the current snapshot of one object
#[derive(Debug)]
pub struct Entry {
    state: RwLock<Arc<Snapshot>>,
}

impl Entry {
    fn new(snapshot: Snapshot) -> Self {
        Self {
            state: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<Snapshot> {
        read(&self.state).clone()
    }

    pub fn id(&self) -> ObjectId {
        *read(&self.state).id()
    }
}

/// Registry of live objects, one per session.
///
/// Entries are never evicted implicitly; [`forget`](Self::forget) and
/// [`clear`](Self::clear) drop registrations without invalidating handles
/// that are already held.
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: RwLock<HashMap<ObjectId, Arc<Entry>>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a fresh entry from a full record and registers it under the
    /// record's id, replacing any previous registration.
    pub fn register(&self, expected: ObjectKind, record: Value) -> Result<Arc<Entry>> {
        let fields = into_fields(record)?;
        match fields.get("object").and_then(Value::as_str) {
            Some(_) => check_kind(expected, &fields)?,
            None => {
                return Err(Error::SchemaAssertion {
                    expected: expected.to_string(),
                    found: "record without an `object` tag".to_string(),
                })
            }
        }
        let id = record_id(&fields)?
            .ok_or_else(|| Error::InvalidId(format!("{} record has no id", expected)))?;

        let entry = Arc::new(Entry::new(Snapshot {
            id,
            kind: expected,
            version: 0,
            fields,
        }));
        let replaced = write(&self.entries).insert(id, entry.clone()).is_some();
        debug!(%id, kind = %expected, replaced, "registered object");
        Ok(entry)
    }

    /// Applies a (possibly partial) record to the entry registered under
    /// `target`, preserving the entry's identity.
    pub fn apply(&self, target: &ObjectId, expected: ObjectKind, record: Value) -> Result<Arc<Entry>> {
        let entry = self.entry(target).ok_or_else(|| {
            Error::InvalidId(format!("{} is not held by the identity cache", target))
        })?;
        self.apply_to(&entry, expected, record)?;
        Ok(entry)
    }

    /// Targeted update of a specific entry. The entry becomes the registered
    /// one for its id if the registry points elsewhere.
    pub(crate) fn apply_to(
        &self,
        entry: &Arc<Entry>,
        expected: ObjectKind,
        record: Value,
    ) -> Result<Arc<Snapshot>> {
        let mut fields = into_fields(record)?;
        check_kind(expected, &fields)?;
        let new_id = record_id(&fields)?;

        let updated = {
            let mut state = write(&entry.state);
            let old = state.clone();
            if old.kind != expected {
                return Err(Error::SchemaAssertion {
                    expected: expected.to_string(),
                    found: old.kind.to_string(),
                });
            }
            if let Some(id) = new_id {
                if id != old.id {
                    return Err(Error::SchemaAssertion {
                        expected: format!("{} {}", expected, old.id),
                        found: format!("{} {}", expected, id),
                    });
                }
            }

            let mut carried = 0usize;
            for (name, value) in old.fields.iter() {
                if !fields.contains_key(name) {
                    fields.insert(name.clone(), value.clone());
                    carried += 1;
                }
            }

            let snapshot = Arc::new(Snapshot {
                id: old.id,
                kind: old.kind,
                version: old.version + 1,
                fields,
            });
            *state = snapshot.clone();
            debug!(id = %old.id, version = snapshot.version, carried, "applied update");
            snapshot
        };

        let mut entries = write(&self.entries);
        let registered = entries.entry(updated.id).or_insert_with(|| entry.clone());
        if !Arc::ptr_eq(registered, entry) {
            *registered = entry.clone();
        }
        Ok(updated)
    }

    pub fn entry(&self, id: &ObjectId) -> Option<Arc<Entry>> {
        read(&self.entries).get(id).cloned()
    }

    /// Current snapshot registered under `id`.
    pub fn current(&self, id: &ObjectId) -> Option<Arc<Snapshot>> {
        self.entry(id).map(|e| e.load())
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        read(&self.entries).contains_key(id)
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.entries).is_empty()
    }

    /// Drops the registration for `id`. Returns whether one existed.
    pub fn forget(&self, id: &ObjectId) -> bool {
        write(&self.entries).remove(id).is_some()
    }

    pub fn clear(&self) {
        write(&self.entries).clear();
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn into_fields(record: Value) -> Result<Map<String, Value>> {
    match record {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::SchemaAssertion {
            expected: "JSON object".to_string(),
            found: json_type(&other).to_string(),
        }),
    }
}

/// A present `object` tag must name the expected kind.
fn check_kind(expected: ObjectKind, fields: &Map<String, Value>) -> Result<()> {
    match fields.get("object") {
        None => Ok(()),
        Some(Value::String(tag)) if tag == expected.as_str() => Ok(()),
        Some(Value::String(tag)) => Err(Error::SchemaAssertion {
            expected: expected.to_string(),
            found: tag.clone(),
        }),
        Some(other) => Err(Error::SchemaAssertion {
            expected: expected.to_string(),
            found: json_type(other).to_string(),
        }),
    }
}

fn record_id(fields: &Map<String, Value>) -> Result<Option<ObjectId>> {
    match fields.get("id") {
        None => Ok(None),
        Some(Value::String(raw)) => ObjectId::parse(raw).map(Some),
        Some(other) => Err(Error::InvalidId(other.to_string())),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
