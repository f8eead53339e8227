//! Upsert Write Builder
//!
//! Translates a record plus its key columns into a backend-native,
//! conflict-aware write. SQL backends get an `INSERT ... ON CONFLICT`
//! statement with positional parameters; document backends get a filter
//! plus replacement document.

use super::error::{StorageError, StorageResult};
use super::record::{Record, Table, Value};

/// A parameterized SQL write.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlWrite {
    /// Statement with positional placeholders ($1, $2, ...)
    pub sql: String,
    /// Parameter values in placeholder order
    pub params: Vec<Value>,
}

/// A document-store write: match on the filter, replace with the document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    /// Key equalities a stored document must satisfy (all of them)
    pub filter: Vec<(String, Value)>,
    /// Full replacement document
    pub document: Record,
}

impl DocumentWrite {
    /// Check if a stored record matches this write's filter.
    ///
    /// An empty filter matches nothing: the write is a plain insert.
    #[must_use]
    pub fn matches(&self, stored: &Record) -> bool {
        if self.filter.is_empty() {
            return false;
        }
        self.filter
            .iter()
            .all(|(column, value)| stored.get(column) == Some(value))
    }
}

/// Reject identifiers that cannot be safely quoted into a statement.
///
/// Identifiers come from callers and schema introspection, never from
/// row data, but the charset is restricted anyway.
fn validate_identifier(identifier: &str) -> StorageResult<()> {
    let mut chars = identifier.chars();

    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest {
        return Err(StorageError::validation(format!(
            "invalid identifier: '{identifier}'"
        )));
    }
    Ok(())
}

/// Quote a table identifier for direct inclusion in a statement.
pub(crate) fn quote_table(table: &Table) -> StorageResult<String> {
    validate_identifier(table.name())?;
    match table.namespace() {
        Some(ns) => {
            validate_identifier(ns)?;
            Ok(format!("\"{ns}\".\"{}\"", table.name()))
        }
        None => Ok(format!("\"{}\"", table.name())),
    }
}

/// Check that a record carries every key column it will be matched on.
///
/// The record must already use stored column names.
///
/// # Errors
/// Returns `Validation` naming the first missing key column.
pub fn validate_keys(record: &Record, key_columns: &[String]) -> StorageResult<()> {
    for column in key_columns {
        if !record.contains(column) {
            return Err(StorageError::validation(format!(
                "record is missing key column '{column}'"
            )));
        }
    }
    Ok(())
}

/// Build a conflict-aware SQL write for one record.
///
/// - No key columns: plain `INSERT`
/// - Some non-key columns: `ON CONFLICT (keys) DO UPDATE SET` each
///   non-key column from `EXCLUDED`
/// - Every column is a key: `ON CONFLICT (keys) DO NOTHING` (there is
///   nothing to update)
///
/// # Errors
/// Returns `Validation` if an identifier is malformed or a key column is
/// missing from the record.
pub fn build_sql_write(
    table: &Table,
    record: &Record,
    key_columns: &[String],
) -> StorageResult<SqlWrite> {
    // Preconditions
    assert!(!record.is_empty(), "record must have fields");

    validate_keys(record, key_columns)?;
    let table_sql = quote_table(table)?;

    let mut columns = Vec::with_capacity(record.len());
    let mut params = Vec::with_capacity(record.len());
    for (name, value) in record.iter() {
        validate_identifier(name)?;
        columns.push(name);
        params.push(value.clone());
    }

    let column_list = columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholder_list = (1..=columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("INSERT INTO {table_sql} ({column_list}) VALUES ({placeholder_list})");

    if !key_columns.is_empty() {
        for column in key_columns {
            validate_identifier(column)?;
        }
        let conflict_list = key_columns
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ");

        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !key_columns.iter().any(|k| k == *c))
            .map(|c| format!("\"{c}\" = EXCLUDED.\"{c}\""))
            .collect();

        if updates.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({conflict_list}) DO NOTHING"));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT ({conflict_list}) DO UPDATE SET {}",
                updates.join(", ")
            ));
        }
    }

    // Postcondition
    assert!(params.len() == record.len(), "one param per field");

    Ok(SqlWrite { sql, params })
}

/// Build a document write for one record.
///
/// The filter is the conjunction of key equalities; a keyless record
/// gets an empty filter and is always inserted.
///
/// # Errors
/// Returns `Validation` if a key column is missing from the record.
pub fn build_document_write(record: &Record, key_columns: &[String]) -> StorageResult<DocumentWrite> {
    validate_keys(record, key_columns)?;

    let filter = key_columns
        .iter()
        .map(|column| {
            let value = record
                .get(column)
                .cloned()
                .unwrap_or_else(|| unreachable!("validate_keys checked presence"));
            (column.clone(), value)
        })
        .collect();

    Ok(DocumentWrite {
        filter,
        document: record.clone(),
    })
}
