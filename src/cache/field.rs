//! Declarative field tables and change-sets.
//!
//! Every cached entity type describes its attributes once, as a table of
//! [`Field`] rows. The registry walks that table to decode, diff and encode
//! any entity without knowing its field list.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::types::{
    field::{FieldError, Payload},
    util::ValueExt,
};

/// When a field is written by [`encode`](super::encode).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Emit {
    /// Part of every encoding, including create requests.
    Always,
    /// Server-assigned or parent data; only emitted when re-serializing a
    /// fetched entity.
    Internal,
    /// Read-only data that is never sent back, such as the creator's ID.
    /// The row's `put` is never called.
    Never,
}

/// One row of an entity's field table.
pub struct Field<E> {
    /// Attribute name, used as the key of a [`Changes`] entry.
    pub name: &'static str,
    /// Wire keys the attribute is read from. The row is skipped when none of
    /// them is in the payload.
    pub keys: &'static [&'static str],
    /// When the attribute is encoded.
    pub emit: Emit,
    /// Parse the attribute out of the payload and store it, returning the
    /// prior value if it changed.
    pub update: fn(&mut E, &Payload) -> Result<Option<Value>, FieldError>,
    /// Write the attribute into a payload. The flag requests defaults.
    pub put: fn(&E, &mut Payload, bool),
}

/// Store `value` into `slot`, returning the prior value if they differ.
///
/// Equality is the attribute type's own [`PartialEq`], so two lists are equal
/// iff they hold the same elements in the same order.
pub fn replace<T>(slot: &mut T, value: T, name: &'static str) -> Result<Option<Value>, FieldError>
where
    T: PartialEq + Serialize,
{
    if *slot == value {
        return Ok(None);
    }

    let old = serde_json::to_value(&*slot).map_err(|source| FieldError::snapshot(name, source))?;
    *slot = value;

    Ok(Some(old))
}

/// Prior values of the attributes an update changed, keyed by attribute
/// name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Changes {
    old: BTreeMap<&'static str, Value>,
}

impl Changes {
    /// Create an empty change-set.
    pub const fn new() -> Self {
        Self {
            old: BTreeMap::new(),
        }
    }

    pub(crate) fn record(&mut self, name: &'static str, old: Value) {
        self.old.insert(name, old);
    }

    /// Prior value of an attribute, if it changed.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.old.get(name)
    }

    /// Prior value of an attribute, deserialized into its typed form.
    ///
    /// Returns `None` if the attribute didn't change or its snapshot doesn't
    /// fit `T`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.old.get(name)?.clone().deserialize_into().ok()
    }

    /// Whether an attribute changed.
    pub fn contains(&self, name: &str) -> bool {
        self.old.contains_key(name)
    }

    /// Number of changed attributes.
    pub fn len(&self) -> usize {
        self.old.len()
    }

    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.old.is_empty()
    }

    /// Iterate over `(attribute name, prior value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.old.iter().map(|(name, value)| (*name, value))
    }

    /// Names of the changed attributes, in name order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.old.keys().copied()
    }

    /// Convert into a JSON object.
    pub fn into_value(self) -> Value {
        let map: Map<String, Value> = self
            .old
            .into_iter()
            .map(|(name, value)| (name.to_owned(), value))
            .collect();

        Value::Object(map)
    }
}
