//! Record Data Model
//!
//! `TigerStyle`: One scalar value enum, one ordered record type, one table
//! identifier. Backends never see anything richer than these.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::{
    PRIMARY_KEY_FIELDS_COUNT_MAX, RECORD_BINARY_BYTES_MAX, RECORD_FIELDS_COUNT_MAX,
    RECORD_FIELD_NAME_BYTES_MAX, RECORD_STRING_BYTES_MAX, TABLE_NAMESPACE_BYTES_MAX,
    TABLE_NAME_BYTES_MAX,
};

use super::error::{StorageError, StorageResult};

/// A scalar value stored in a record field.
///
/// Covers the types every backend can represent natively. Binary payloads
/// are opaque: backends round-trip them byte-for-byte without inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// UTF-8 string
    String(String),
    /// 64-bit signed integer
    Int(i64),
    /// Boolean
    Bool(bool),
    /// Opaque binary payload
    Bytes(Vec<u8>),
}

impl Value {
    /// Get the value as a string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the value as bytes, if it is a binary payload.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Byte size of the value's payload.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            Self::String(s) => s.len(),
            Self::Bytes(b) => b.len(),
            Self::Int(_) => std::mem::size_of::<i64>(),
            Self::Bool(_) => 1,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// An ordered collection of named fields.
///
/// Field order is preserved so generated writes bind parameters in a
/// stable order across runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: IndexMap::new(),
        }
    }

    /// Add a field, replacing any existing field with the same name.
    ///
    /// Replacement keeps the field's original position.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Insert a field in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Get a field value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Check if the record contains a field.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Validate the record against storage limits.
    ///
    /// # Errors
    /// Returns `StorageError::Validation` if the record is empty, has too
    /// many fields, or any field name or payload exceeds its size limit.
    pub fn validate(&self) -> StorageResult<()> {
        if self.fields.is_empty() {
            return Err(StorageError::validation("record has no fields"));
        }
        if self.fields.len() > RECORD_FIELDS_COUNT_MAX {
            return Err(StorageError::validation(format!(
                "record has {} fields, limit is {RECORD_FIELDS_COUNT_MAX}",
                self.fields.len()
            )));
        }

        for (name, value) in &self.fields {
            if name.is_empty() {
                return Err(StorageError::validation("field name is empty"));
            }
            if name.len() > RECORD_FIELD_NAME_BYTES_MAX {
                return Err(StorageError::validation(format!(
                    "field name '{name}' exceeds {RECORD_FIELD_NAME_BYTES_MAX} bytes"
                )));
            }

            let limit = match value {
                Value::Bytes(_) => RECORD_BINARY_BYTES_MAX,
                _ => RECORD_STRING_BYTES_MAX,
            };
            if value.payload_len() > limit {
                return Err(StorageError::validation(format!(
                    "field '{name}' payload exceeds {limit} bytes"
                )));
            }
        }

        Ok(())
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A table identifier: name plus optional namespace (schema).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Table {
    name: String,
    namespace: Option<String>,
}

impl Table {
    /// Create a table identifier in the default namespace.
    ///
    /// # Panics
    /// Panics if the name is empty or exceeds the length limit.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();

        // Preconditions
        assert!(!name.is_empty(), "table name must not be empty");
        assert!(
            name.len() <= TABLE_NAME_BYTES_MAX,
            "table name exceeds {TABLE_NAME_BYTES_MAX} bytes"
        );

        Self {
            name,
            namespace: None,
        }
    }

    /// Scope the table to a namespace (schema).
    ///
    /// # Panics
    /// Panics if the namespace is empty or exceeds the length limit.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();

        // Preconditions
        assert!(!namespace.is_empty(), "namespace must not be empty");
        assert!(
            namespace.len() <= TABLE_NAMESPACE_BYTES_MAX,
            "namespace exceeds {TABLE_NAMESPACE_BYTES_MAX} bytes"
        );

        self.namespace = Some(namespace);
        self
    }

    /// The table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The namespace, if scoped.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Fully-qualified name for logging and lookups.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// Maps logical key field names to the backend's stored column names.
///
/// A record carries fields under logical names; the map renames them to
/// the columns that actually hold them. Ordered by logical name so the
/// derived key column list is stable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrimaryKeyMap {
    columns: BTreeMap<String, String>,
}

impl PrimaryKeyMap {
    /// Create an empty map (key columns resolved by introspection instead).
    #[must_use]
    pub fn new() -> Self {
        Self {
            columns: BTreeMap::new(),
        }
    }

    /// Add a logical-name to stored-column mapping.
    ///
    /// # Panics
    /// Panics if the map would exceed the composite key field limit.
    #[must_use]
    pub fn with_column(mut self, logical: impl Into<String>, stored: impl Into<String>) -> Self {
        self.columns.insert(logical.into(), stored.into());

        // Postcondition
        assert!(
            self.columns.len() <= PRIMARY_KEY_FIELDS_COUNT_MAX,
            "composite key exceeds {PRIMARY_KEY_FIELDS_COUNT_MAX} fields"
        );
        self
    }

    /// Check if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of key fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Stored column name for a logical field, if mapped.
    #[must_use]
    pub fn stored_column(&self, logical: &str) -> Option<&str> {
        self.columns.get(logical).map(String::as_str)
    }

    /// Stored column names, ordered by logical field name.
    #[must_use]
    pub fn target_columns(&self) -> Vec<String> {
        self.columns.values().cloned().collect()
    }

    /// Iterate (logical, stored) pairs ordered by logical name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Rename a record's key fields from logical names to stored columns.
    ///
    /// Non-key fields pass through unchanged; field order is preserved.
    #[must_use]
    pub fn translate_record(&self, record: &Record) -> Record {
        record
            .iter()
            .map(|(name, value)| {
                let stored = self
                    .stored_column(name)
                    .map_or_else(|| name.to_string(), |s| s.to_string());
                (stored, value.clone())
            })
            .collect()
    }
}

/// Outcome of a committed upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertResult {
    /// Number of rows written (inserted or updated)
    pub rows_affected: u64,
}

impl UpsertResult {
    /// Create a result with the given row count.
    #[must_use]
    pub fn new(rows_affected: u64) -> Self {
        Self { rows_affected }
    }

    /// Check whether the upsert wrote anything.
    #[must_use]
    pub fn wrote_rows(&self) -> bool {
        self.rows_affected > 0
    }
}
