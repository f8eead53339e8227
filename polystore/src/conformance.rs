//! Storage Conformance Checks
//!
//! Every `Storage` implementation must pass the same behavioral suite.
//! Each check is a standalone async function that panics on violation,
//! giving fine-grained failure reporting when replayed per backend.
//! Fixtures mirror a shared harness: the same tables, records, and key
//! maps are written against every backend under test.
//!
//! Checks panic rather than return errors: they only ever run inside
//! test binaries.

use crate::storage::{
    PrimaryKeyMap, Record, Storage, StorageError, StorageKind, Table, TxnStatus,
};

/// Shared fixture tables and records.
pub mod fixtures {
    use super::{PrimaryKeyMap, Record, Table};

    /// Keyless table: every write is a plain insert.
    pub const TABLE_KEYLESS: &str = "tests1";
    /// Second keyless table, for multi-table transactions.
    pub const TABLE_KEYLESS_SECONDARY: &str = "lttests1";
    /// Table with a declared primary key on `test_string`.
    pub const TABLE_KEYED: &str = "pktests1";
    /// Tables written through an explicit key map.
    pub const TABLE_MAPPED_1: &str = "property_bag_tests1";
    /// Second mapped table.
    pub const TABLE_MAPPED_2: &str = "property_bag_tests2";

    /// Declared key columns of [`TABLE_KEYED`].
    pub const KEYED_TABLE_KEY_COLUMNS: &[&str] = &["test_string"];

    /// All fixture tables.
    #[must_use]
    pub fn all_tables() -> Vec<Table> {
        [
            TABLE_KEYLESS,
            TABLE_KEYLESS_SECONDARY,
            TABLE_KEYED,
            TABLE_MAPPED_1,
            TABLE_MAPPED_2,
        ]
        .into_iter()
        .map(Table::new)
        .collect()
    }

    /// The canonical two-field record.
    #[must_use]
    pub fn sample_record() -> Record {
        Record::new()
            .with_field("test_string", "test")
            .with_field("id", "1")
    }

    /// A record carrying an opaque binary payload.
    #[must_use]
    pub fn binary_record() -> Record {
        Record::new()
            .with_field("test_string", "binary")
            .with_field("data", b"{ x: 1 }".to_vec())
    }

    /// Key map renaming logical `pk1`/`pk2` to their stored columns.
    #[must_use]
    pub fn mapped_pk_map() -> PrimaryKeyMap {
        PrimaryKeyMap::new()
            .with_column("pk1", "primary_key1")
            .with_column("pk2", "primary_key2")
    }

    /// A record addressed through [`mapped_pk_map`].
    #[must_use]
    pub fn mapped_record() -> Record {
        Record::new()
            .with_field("pk1", "one")
            .with_field("pk2", "two")
            .with_field("payload", "x")
    }
}

fn record_contained_in(needle: &Record, haystack: &[Record]) -> bool {
    haystack.iter().any(|row| {
        needle
            .iter()
            .all(|(name, value)| row.get(name) == Some(value))
    })
}

/// The handle reports the expected backend family.
pub async fn storage_kind_is<S: Storage + ?Sized>(storage: &S, expected: StorageKind) {
    assert_eq!(storage.kind(), expected, "storage kind mismatch");
}

/// `is_nosql` agrees with the backend family.
pub async fn is_nosql_matches_kind<S: Storage + ?Sized>(storage: &S) {
    assert_eq!(
        storage.is_nosql(),
        storage.kind().is_nosql(),
        "is_nosql must derive from the backend family"
    );
}

/// A live handle answers ping.
pub async fn ping_succeeds<S: Storage + ?Sized>(storage: &S) {
    storage.ping().await.expect("ping should succeed");
}

/// Close succeeds once, then every operation fails with `AlreadyClosed`.
///
/// Consumes the handle: callers pass a fresh instance.
pub async fn close_is_terminal<S: Storage + ?Sized>(storage: &S) {
    storage.close().await.expect("first close should succeed");

    assert!(
        matches!(
            storage.close().await,
            Err(StorageError::AlreadyClosed)
        ),
        "second close must fail with AlreadyClosed"
    );
    assert!(
        matches!(storage.ping().await, Err(StorageError::Connection { .. })),
        "ping after close must fail with a connection error"
    );
    assert!(
        storage.begin().await.is_err(),
        "begin after close must fail"
    );
}

/// Every expected table shows up in the listing.
pub async fn list_tables_contains<S: Storage + ?Sized>(storage: &S, expected: &[&str]) {
    let tables = storage.list_tables().await.expect("list_tables failed");

    for name in expected {
        assert!(
            tables.iter().any(|t| t == name),
            "table '{name}' missing from listing {tables:?}"
        );
    }
}

/// Introspection reports the declared key columns in schema order.
pub async fn list_primary_keys_match<S: Storage + ?Sized>(
    storage: &S,
    table: &Table,
    expected_columns: &[&str],
) {
    let keys = storage
        .list_primary_keys(std::slice::from_ref(table))
        .await
        .expect("list_primary_keys failed");

    let columns = keys
        .get(table.name())
        .unwrap_or_else(|| panic!("no key entry for table '{}'", table.name()));
    assert_eq!(columns, expected_columns, "key columns mismatch");
}

/// Introspecting an unknown table is an error, not an empty answer.
pub async fn list_primary_keys_unknown_table_fails<S: Storage + ?Sized>(storage: &S) {
    let result = storage
        .list_primary_keys(&[Table::new("no_such_table")])
        .await;
    assert!(
        matches!(result, Err(StorageError::SchemaIntrospection { .. })),
        "unknown table must produce a SchemaIntrospection error, got {result:?}"
    );
}

/// A committed upsert reports written rows and the rows are readable back.
pub async fn upsert_commits<S: Storage + ?Sized>(
    storage: &S,
    table: Table,
    records: Vec<Record>,
    pk_map: PrimaryKeyMap,
) {
    let expected: Vec<Record> = records
        .iter()
        .map(|r| pk_map.translate_record(r))
        .collect();

    let result = storage
        .upsert(table.clone(), records, pk_map)
        .await
        .expect("upsert should commit");
    assert!(result.wrote_rows(), "committed upsert must report rows");

    let rows = storage.select_all(&table).await.expect("select_all failed");
    for record in &expected {
        assert!(
            record_contained_in(record, &rows),
            "committed record {record:?} not found in {rows:?}"
        );
    }
}

/// Rolling back discards staged writes and closes the transaction.
pub async fn upsert_rolls_back<S: Storage + ?Sized>(
    storage: &S,
    table: Table,
    records: Vec<Record>,
    pk_map: PrimaryKeyMap,
) {
    let before = storage.select_all(&table).await.expect("select_all failed");

    let mut txn = storage.begin().await.expect("begin failed");
    txn.stage(table.clone(), records, pk_map)
        .expect("stage failed");

    let result = txn.roll_back().expect("roll_back failed");
    assert_eq!(result.rows_affected, 0, "rollback must report zero rows");
    assert_eq!(txn.status(), TxnStatus::RolledBack);

    assert!(
        matches!(
            storage.commit(&mut txn).await,
            Err(StorageError::TransactionClosed { .. })
        ),
        "commit after rollback must fail with TransactionClosed"
    );

    let after = storage.select_all(&table).await.expect("select_all failed");
    assert_eq!(before, after, "rollback must leave the table unchanged");
}

/// A commit that fails mid-flight leaves the table exactly as it was.
pub async fn upsert_rolls_back_on_error<S: Storage + ?Sized>(
    storage: &S,
    table: Table,
    records: Vec<Record>,
    pk_map: PrimaryKeyMap,
) {
    let before = storage.select_all(&table).await.expect("select_all failed");

    let mut txn = storage.begin().await.expect("begin failed");
    txn.stage(table.clone(), records, pk_map)
        .expect("stage failed");
    txn.force_error();

    let result = storage.commit(&mut txn).await;
    assert!(result.is_err(), "forced commit must fail");
    assert_eq!(txn.status(), TxnStatus::RolledBack);

    let after = storage.select_all(&table).await.expect("select_all failed");
    assert_eq!(before, after, "failed commit must leave the table unchanged");
}

/// Upserting the same key twice replaces the row instead of duplicating.
pub async fn upsert_replaces_on_key_match<S: Storage + ?Sized>(
    storage: &S,
    table: Table,
    first: Record,
    second: Record,
    pk_map: PrimaryKeyMap,
) {
    let count_before = storage
        .select_all(&table)
        .await
        .expect("select_all failed")
        .len();

    storage
        .upsert(table.clone(), vec![first], pk_map.clone())
        .await
        .expect("first upsert failed");
    storage
        .upsert(table.clone(), vec![second.clone()], pk_map.clone())
        .await
        .expect("second upsert failed");

    let rows = storage.select_all(&table).await.expect("select_all failed");
    assert_eq!(
        rows.len(),
        count_before + 1,
        "same-key upsert must replace, not duplicate"
    );
    assert!(
        record_contained_in(&pk_map.translate_record(&second), &rows),
        "latest write must win"
    );
}

/// Binary payloads survive a write/read cycle byte-for-byte.
pub async fn binary_payload_round_trips<S: Storage + ?Sized>(
    storage: &S,
    table: Table,
    record: Record,
    pk_map: PrimaryKeyMap,
    binary_field: &str,
) {
    let translated = pk_map.translate_record(&record);
    let expected = translated
        .get(binary_field)
        .and_then(|v| v.as_bytes())
        .expect("fixture record must carry a binary field")
        .to_vec();

    storage
        .upsert(table.clone(), vec![record], pk_map)
        .await
        .expect("upsert failed");

    let rows = storage.select_all(&table).await.expect("select_all failed");
    let stored = rows
        .iter()
        .find_map(|row| row.get(binary_field).and_then(|v| v.as_bytes()))
        .expect("binary field missing from stored rows");
    assert_eq!(stored, expected.as_slice(), "binary payload must round-trip");
}

/// Truncate removes every row, and unknown tables are an error.
pub async fn truncate_empties<S: Storage + ?Sized>(storage: &S, tables: &[Table]) {
    storage.truncate(tables).await.expect("truncate failed");

    for table in tables {
        let rows = storage.select_all(table).await.expect("select_all failed");
        assert!(rows.is_empty(), "table '{table}' not empty after truncate");
    }

    assert!(
        matches!(
            storage.truncate(&[Table::new("no_such_table")]).await,
            Err(StorageError::NotFound { .. })
        ),
        "truncating an unknown table must fail with NotFound"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_containment() {
        let needle = Record::new().with_field("a", 1i64);
        let row = Record::new().with_field("a", 1i64).with_field("b", 2i64);

        assert!(record_contained_in(&needle, &[row.clone()]));
        assert!(!record_contained_in(
            &Record::new().with_field("a", 2i64),
            &[row]
        ));
    }

    #[test]
    fn test_fixture_tables_distinct() {
        let tables = fixtures::all_tables();
        let mut names: Vec<&str> = tables.iter().map(Table::name).collect();
        names.dedup();
        assert_eq!(names.len(), tables.len());
    }
}
