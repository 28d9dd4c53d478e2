//! Version tokens for optimistic concurrency control
//!
//! A record's version is derived from its state, never stored next to it.
//! Every entity type uses the same strategy:
//!
//! - Serialize the record to JSON
//! - Rewrite every object with its keys in sorted order (canonical form)
//! - SHA-256 the canonical bytes and render them as lowercase hex
//!
//! Two records with identical observable state therefore always share a
//! version, and any observable change produces a different one. A caller
//! captures the version on read and passes it back as the expected version
//! on update, replace or delete.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Content-hash version token for a record
///
/// ## Invariants
///
/// - Deterministic: the same record state always maps to the same token
/// - Independent of field order in the source JSON
/// - Opaque: tokens compare for equality only, never for ordering
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Compute the version of any serializable record
    pub fn of<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let canonical = canonicalize(serde_json::to_value(value)?);
        let bytes = serde_json::to_vec(&canonical)?;
        Ok(Version(format!("{:x}", Sha256::digest(&bytes))))
    }

    /// The hex representation of the token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Version {
    fn from(token: String) -> Self {
        Version(token)
    }
}

impl From<&str> for Version {
    fn from(token: &str) -> Self {
        Version(token.to_string())
    }
}

/// Rebuild a JSON value with every object's keys in ascending order.
///
/// Insertion into a fresh map happens in sorted order, so the output is
/// canonical whether or not serde_json preserves insertion order.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
