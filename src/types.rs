//! Core types for the record store.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Default primary-key field name.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// A single cached entity: an ordered mapping of field name to value.
///
/// Cloning a record copies the top-level field map only. Nested objects and
/// arrays stay shared with the original through their `Arc`, so a clone handed
/// out by the store aliases the cached record's nested data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, Arc<Value>>);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Build a record from a JSON value. Only objects are records.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_map(map)),
            _ => None,
        }
    }

    /// Build a record from a JSON object map.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map.into_iter().map(|(k, v)| (k, Arc::new(v))).collect())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).map(|v| v.as_ref())
    }

    /// Shared handle to a field's value.
    pub fn get_shared(&self, field: &str) -> Option<&Arc<Value>> {
        self.0.get(field)
    }

    /// Insert or replace a top-level field.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Arc<Value>> {
        self.0.insert(field.into(), Arc::new(value.into()))
    }

    /// Remove a field, preserving the order of the remaining ones.
    pub fn remove(&mut self, field: &str) -> Option<Arc<Value>> {
        self.0.shift_remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Whether both records hold the very same allocation for `field`.
    pub fn shares_field(&self, other: &Record, field: &str) -> bool {
        match (self.0.get(field), other.0.get(field)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Normalized primary-key value of this record.
    pub fn key(&self, primary_key: &str) -> Option<String> {
        self.get(primary_key).and_then(normalize_key)
    }

    /// Deep copy into a plain JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.as_ref().clone()))
                .collect(),
        )
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.to_value()
    }
}

impl PartialEq<Value> for Record {
    fn eq(&self, other: &Value) -> bool {
        match other {
            Value::Object(map) => {
                map.len() == self.0.len()
                    && map
                        .iter()
                        .all(|(k, v)| self.get(k).map_or(false, |mine| mine == v))
            }
            _ => false,
        }
    }
}

/// Stringify a primary-key value for use as a cache key.
///
/// `null` means "no key". Strings are used verbatim so `"5"` and `5` address
/// the same entry.
pub fn normalize_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Parameters passed to a shape-inferred operation.
///
/// The variant, together with the type's primary key, decides whether a call
/// addresses one record or a collection. See [`Params::request_kind`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Params {
    /// No parameters.
    #[default]
    None,
    /// A scalar key (`0` and `""` are valid keys).
    Key(Value),
    /// A mapping: a key lookup if it carries the primary-key field, a
    /// collection filter otherwise.
    Fields(Map<String, Value>),
}

impl Params {
    /// Infer the request kind for a type whose primary key is `primary_key`.
    pub fn request_kind(&self, primary_key: &str) -> RequestKind {
        match self {
            Params::None => RequestKind::Many { query: Map::new() },
            Params::Key(value) => match normalize_key(value) {
                Some(key) => RequestKind::One { key },
                None => RequestKind::Many { query: Map::new() },
            },
            Params::Fields(fields) => match fields.get(primary_key).and_then(normalize_key) {
                Some(key) => RequestKind::One { key },
                None => RequestKind::Many {
                    query: fields.clone(),
                },
            },
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Params::None)
    }

    /// The params as a JSON value, used as a request body.
    pub fn to_value(&self) -> Value {
        match self {
            Params::None => Value::Null,
            Params::Key(value) => value.clone(),
            Params::Fields(fields) => Value::Object(fields.clone()),
        }
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Params::None,
            Value::Object(map) => Params::Fields(map),
            other => Params::Key(other),
        }
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params::Fields(map)
    }
}

impl From<&str> for Params {
    fn from(key: &str) -> Self {
        Params::Key(Value::String(key.to_string()))
    }
}

impl From<String> for Params {
    fn from(key: String) -> Self {
        Params::Key(Value::String(key))
    }
}

impl From<bool> for Params {
    fn from(key: bool) -> Self {
        Params::Key(Value::Bool(key))
    }
}

macro_rules! params_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Params {
                fn from(key: $t) -> Self {
                    Params::Key(Value::from(key))
                }
            }
        )*
    };
}

params_from_int!(i32, i64, u32, u64, usize);

impl<T: Into<Params>> From<Option<T>> for Params {
    fn from(value: Option<T>) -> Self {
        value.map_or(Params::None, Into::into)
    }
}

/// Shape of a request, computed from [`Params`].
#[derive(Clone, Debug, PartialEq)]
pub enum RequestKind {
    /// A single record addressed by its normalized key.
    One { key: String },
    /// A collection, with any filter fields the caller passed.
    Many { query: Map<String, Value> },
}

impl RequestKind {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            RequestKind::One { .. } => Cardinality::One,
            RequestKind::Many { .. } => Cardinality::Many,
        }
    }
}

/// Whether a transform is looking at a single record or a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    pub fn as_str(self) -> &'static str {
        match self {
            Cardinality::One => "one",
            Cardinality::Many => "many",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint template pair for a type.
///
/// `one` may contain `:name` dynamic segments; only the last one is
/// substituted. `many` is a static collection URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub one: String,
    pub many: String,
}

impl Endpoints {
    pub fn new(one: impl Into<String>, many: impl Into<String>) -> Self {
        Self {
            one: one.into(),
            many: many.into(),
        }
    }
}

/// Per-type metadata supplied at registration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeOptions {
    /// Overrides the store-wide primary key for this type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    /// Endpoint templates, forwarded to the adapter on registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Endpoints>,

    /// Application-defined descriptors.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = Some(primary_key.into());
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Outcome of a shape-inferred read or write.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolved {
    One(Record),
    Many(Vec<Record>),
    /// Nothing matched: a missing key, an unregistered type, or a dropped record.
    Nothing,
}

impl Resolved {
    pub fn into_one(self) -> Option<Record> {
        match self {
            Resolved::One(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_many(self) -> Option<Vec<Record>> {
        match self {
            Resolved::Many(records) => Some(records),
            _ => None,
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, Resolved::Nothing)
    }

    /// Deep copy into JSON: an object, an array, or `null`.
    pub fn to_value(&self) -> Value {
        match self {
            Resolved::One(record) => record.to_value(),
            Resolved::Many(records) => Value::Array(records.iter().map(Record::to_value).collect()),
            Resolved::Nothing => Value::Null,
        }
    }
}

impl PartialEq<Value> for Resolved {
    fn eq(&self, other: &Value) -> bool {
        self.to_value() == *other
    }
}
