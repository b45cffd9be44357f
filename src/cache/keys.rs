//! Cache key derivation.
//!
//! A key is the SHA-256 digest of the rendered statement text followed by the
//! encoded bindings. Invalidation scopes are tracked separately as
//! [`StoreScope`] so the same key can live under different tags.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::QueryCacheError;
use crate::query::{Projection, QueryDescriptor, Value};

/// Separates statement text from the binding payload inside the digest input.
const FIELD_SEPARATOR: u8 = 0x1f;

/// Hex-encoded SHA-256 digest identifying one cached result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a statement and its bindings.
    ///
    /// Binding order and binding types both participate: `[1, 2]` and
    /// `[2, 1]` differ, and so do `Int(5)` and `Text("5")`.
    pub fn derive(statement: &str, bindings: &[Value]) -> Result<Self, QueryCacheError> {
        let bindings: Vec<KeyValue<'_>> = bindings.iter().map(KeyValue::from).collect();
        let encoded = serde_json::to_vec(&bindings)?;

        let mut hasher = Sha256::new();
        hasher.update(statement.as_bytes());
        hasher.update([FIELD_SEPARATOR]);
        hasher.update(&encoded);
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Derive the key for a query rendered with the requested projection.
    pub fn for_query(
        query: &dyn QueryDescriptor,
        projection: &Projection,
    ) -> Result<Self, QueryCacheError> {
        Self::derive(&query.statement(projection), query.bindings())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Binding as it enters the digest.
///
/// JSON has no representation for non-finite floats, so floats are hashed by
/// their bit pattern. Every distinct `f64`, including infinities and NaN,
/// yields distinct bytes.
#[derive(Serialize)]
enum KeyValue<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> From<&'a Value> for KeyValue<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(*value),
            Value::Int(value) => Self::Int(*value),
            Value::Float(value) => Self::Float(value.to_bits()),
            Value::Text(value) => Self::Text(value),
            Value::Bytes(value) => Self::Bytes(value),
        }
    }
}

/// Namespace an entry lives in inside a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreScope {
    /// Unscoped entry; only removed by a global flush or expiry.
    Global,
    /// Entry tagged with a logical resource (a table name).
    Tag(String),
}

impl StoreScope {
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(tag.into())
    }

    pub fn as_tag(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Tag(tag) => Some(tag),
        }
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Tag(tag) => write!(f, "tag:{tag}"),
        }
    }
}
