//! Schema Snapshot Store
//!
//! Loads point-in-time schema snapshots (column name -> type descriptor)
//! from JSON files. Snapshots are immutable once loaded.

use crate::error::{snapshot_error, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Declared type of a column.
///
/// Usually a plain string such as `"int"`, but any JSON value is accepted and
/// compared structurally. No coercion is applied: `"int"` and `"integer"` are
/// different types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeDescriptor(serde_json::Value);

impl TypeDescriptor {
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

impl From<&str> for TypeDescriptor {
    fn from(value: &str) -> Self {
        Self(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for TypeDescriptor {
    fn from(value: String) -> Self {
        Self(serde_json::Value::String(value))
    }
}

impl From<serde_json::Value> for TypeDescriptor {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Complete schema snapshot at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSnapshot {
    columns: BTreeMap<String, TypeDescriptor>,
    checksum: String,
}

impl SchemaSnapshot {
    pub fn new(columns: BTreeMap<String, TypeDescriptor>) -> Self {
        let checksum = Self::compute_checksum(&columns);
        Self { columns, checksum }
    }

    /// Compute checksum from the key-sorted column map
    pub fn compute_checksum(columns: &BTreeMap<String, TypeDescriptor>) -> String {
        let mut hasher = Sha256::new();
        for (name, descriptor) in columns {
            hasher.update(name.as_bytes());
            hasher.update(b":");
            hasher.update(descriptor.as_json().to_string().as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, column: &str) -> Option<&TypeDescriptor> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &TypeDescriptor)> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }
}

impl<K, V> FromIterator<(K, V)> for SchemaSnapshot
where
    K: Into<String>,
    V: Into<TypeDescriptor>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Reads schema snapshots from disk
pub struct SnapshotStore;

impl SnapshotStore {
    /// Load a snapshot file; any read or parse failure is fatal for the run
    pub fn load(path: &Path) -> AppResult<SchemaSnapshot> {
        let text = std::fs::read_to_string(path).map_err(|e| snapshot_error(path, e.to_string()))?;
        let snapshot = Self::parse(path, &text)?;
        debug!(
            "Loaded snapshot {} ({} columns, checksum {})",
            path.display(),
            snapshot.len(),
            &snapshot.checksum()[..12]
        );
        Ok(snapshot)
    }

    /// Parse snapshot JSON; `path` is only used for error reporting
    pub fn parse(path: &Path, text: &str) -> AppResult<SchemaSnapshot> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| snapshot_error(path, format!("malformed JSON: {}", e)))?;

        match value {
            serde_json::Value::Object(map) => Ok(SchemaSnapshot::new(
                map.into_iter()
                    .map(|(name, descriptor)| (name, TypeDescriptor(descriptor)))
                    .collect(),
            )),
            other => Err(snapshot_error(
                path,
                format!(
                    "expected a JSON object mapping column names to types, found {}",
                    json_kind(&other)
                ),
            )),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
