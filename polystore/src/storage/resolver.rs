//! Key Column Resolution
//!
//! A caller-supplied `PrimaryKeyMap` wins; otherwise the backend's own
//! schema introspection decides which columns identify a row.

use tracing::debug;

use super::backend::Storage;
use super::error::StorageResult;
use super::record::{PrimaryKeyMap, Table};

/// Resolve the key columns an upsert should match on.
///
/// An explicit non-empty map takes precedence and never touches the
/// backend. With an empty map the backend's introspection is consulted;
/// a table that exists but declares no primary key resolves to an empty
/// column list, which downgrades the upsert to a plain insert.
///
/// # Errors
/// Propagates introspection failures from the backend.
pub async fn resolve_key_columns<S>(
    storage: &S,
    table: &Table,
    pk_map: &PrimaryKeyMap,
) -> StorageResult<Vec<String>>
where
    S: Storage + ?Sized,
{
    if !pk_map.is_empty() {
        let columns = pk_map.target_columns();
        debug!(table = %table, ?columns, "key columns from explicit map");
        return Ok(columns);
    }

    let keys_by_table = storage
        .list_primary_keys(std::slice::from_ref(table))
        .await?;

    let columns = keys_by_table.get(table.name()).cloned().unwrap_or_default();
    debug!(table = %table, ?columns, "key columns from introspection");

    Ok(columns)
}
