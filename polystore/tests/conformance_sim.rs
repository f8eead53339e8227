//! Conformance suite replayed against `SimStorage`.
//!
//! Each test exercises a single conformance check for fine-grained
//! failure reporting; `run_all_*` replays the full suite on one shared
//! handle per backend family, mirroring how a real backend would be
//! certified.

use polystore::conformance::{self, fixtures};
use polystore::dst::DeterministicRng;
use polystore::storage::{PrimaryKeyMap, Record, SimStorage, StorageKind, Table};

// =============================================================================
// Test Helpers
// =============================================================================

fn create_fixture_tables(storage: &SimStorage) {
    storage.create_table(fixtures::TABLE_KEYLESS, Vec::new());
    storage.create_table(fixtures::TABLE_KEYLESS_SECONDARY, Vec::new());
    storage.create_table(
        fixtures::TABLE_KEYED,
        fixtures::KEYED_TABLE_KEY_COLUMNS
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
    );
    for table in [fixtures::TABLE_MAPPED_1, fixtures::TABLE_MAPPED_2] {
        storage.create_table(
            table,
            vec!["primary_key1".to_string(), "primary_key2".to_string()],
        );
    }
}

fn relational(seed: u64) -> SimStorage {
    let storage = SimStorage::relational(DeterministicRng::new(seed));
    create_fixture_tables(&storage);
    storage
}

fn document(seed: u64) -> SimStorage {
    let storage = SimStorage::document(DeterministicRng::new(seed));
    create_fixture_tables(&storage);
    storage
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn ping_succeeds() {
    conformance::ping_succeeds(&relational(42)).await;
}

#[tokio::test]
async fn close_is_terminal() {
    conformance::close_is_terminal(&relational(42)).await;
}

#[tokio::test]
async fn kind_matches_family() {
    conformance::storage_kind_is(&relational(42), StorageKind::Postgres).await;
    conformance::storage_kind_is(&document(42), StorageKind::Mongo).await;
}

#[tokio::test]
async fn is_nosql_matches_kind() {
    conformance::is_nosql_matches_kind(&relational(42)).await;
    conformance::is_nosql_matches_kind(&document(42)).await;
}

// =============================================================================
// Introspection
// =============================================================================

#[tokio::test]
async fn list_tables_contains_fixtures() {
    conformance::list_tables_contains(
        &relational(42),
        &[
            fixtures::TABLE_KEYLESS,
            fixtures::TABLE_KEYLESS_SECONDARY,
            fixtures::TABLE_KEYED,
            fixtures::TABLE_MAPPED_1,
            fixtures::TABLE_MAPPED_2,
        ],
    )
    .await;
}

#[tokio::test]
async fn list_primary_keys_match() {
    conformance::list_primary_keys_match(
        &relational(42),
        &Table::new(fixtures::TABLE_KEYED),
        fixtures::KEYED_TABLE_KEY_COLUMNS,
    )
    .await;
}

#[tokio::test]
async fn list_primary_keys_unknown_table_fails() {
    conformance::list_primary_keys_unknown_table_fails(&relational(42)).await;
}

// =============================================================================
// Upsert
// =============================================================================

#[tokio::test]
async fn upsert_commits_keyless() {
    conformance::upsert_commits(
        &relational(42),
        Table::new(fixtures::TABLE_KEYLESS),
        vec![fixtures::sample_record()],
        PrimaryKeyMap::new(),
    )
    .await;
}

#[tokio::test]
async fn upsert_commits_keyed() {
    conformance::upsert_commits(
        &relational(42),
        Table::new(fixtures::TABLE_KEYED),
        vec![fixtures::sample_record()],
        PrimaryKeyMap::new(),
    )
    .await;
}

#[tokio::test]
async fn upsert_commits_with_key_map() {
    conformance::upsert_commits(
        &relational(42),
        Table::new(fixtures::TABLE_MAPPED_1),
        vec![fixtures::mapped_record()],
        fixtures::mapped_pk_map(),
    )
    .await;
}

#[tokio::test]
async fn upsert_replaces_on_key_match() {
    let second = Record::new()
        .with_field("test_string", "test")
        .with_field("id", "2");
    conformance::upsert_replaces_on_key_match(
        &relational(42),
        Table::new(fixtures::TABLE_KEYED),
        fixtures::sample_record(),
        second,
        PrimaryKeyMap::new(),
    )
    .await;
}

#[tokio::test]
async fn upsert_rolls_back() {
    conformance::upsert_rolls_back(
        &relational(42),
        Table::new(fixtures::TABLE_KEYED),
        vec![fixtures::sample_record()],
        PrimaryKeyMap::new(),
    )
    .await;
}

#[tokio::test]
async fn upsert_rolls_back_on_error() {
    conformance::upsert_rolls_back_on_error(
        &relational(42),
        Table::new(fixtures::TABLE_KEYED),
        vec![fixtures::sample_record()],
        PrimaryKeyMap::new(),
    )
    .await;
}

#[tokio::test]
async fn binary_payload_round_trips() {
    conformance::binary_payload_round_trips(
        &relational(42),
        Table::new(fixtures::TABLE_KEYED),
        fixtures::binary_record(),
        PrimaryKeyMap::new(),
        "data",
    )
    .await;
}

#[tokio::test]
async fn binary_payload_round_trips_with_key_map() {
    let record = fixtures::mapped_record().with_field("data", b"{ x: 1 }".to_vec());
    conformance::binary_payload_round_trips(
        &relational(42),
        Table::new(fixtures::TABLE_MAPPED_2),
        record,
        fixtures::mapped_pk_map(),
        "data",
    )
    .await;
}

// =============================================================================
// Truncate
// =============================================================================

#[tokio::test]
async fn truncate_empties() {
    let storage = relational(42);
    conformance::upsert_commits(
        &storage,
        Table::new(fixtures::TABLE_KEYED),
        vec![fixtures::sample_record()],
        PrimaryKeyMap::new(),
    )
    .await;

    conformance::truncate_empties(&storage, &fixtures::all_tables()).await;
}

// =============================================================================
// Full Suite
// =============================================================================

async fn run_all(storage: SimStorage, kind: StorageKind) {
    conformance::storage_kind_is(&storage, kind).await;
    conformance::is_nosql_matches_kind(&storage).await;
    conformance::ping_succeeds(&storage).await;

    conformance::list_tables_contains(
        &storage,
        &[
            fixtures::TABLE_KEYLESS,
            fixtures::TABLE_KEYLESS_SECONDARY,
            fixtures::TABLE_KEYED,
            fixtures::TABLE_MAPPED_1,
            fixtures::TABLE_MAPPED_2,
        ],
    )
    .await;
    conformance::list_primary_keys_match(
        &storage,
        &Table::new(fixtures::TABLE_KEYED),
        fixtures::KEYED_TABLE_KEY_COLUMNS,
    )
    .await;
    conformance::list_primary_keys_unknown_table_fails(&storage).await;

    conformance::upsert_commits(
        &storage,
        Table::new(fixtures::TABLE_KEYLESS),
        vec![fixtures::sample_record()],
        PrimaryKeyMap::new(),
    )
    .await;
    conformance::upsert_commits(
        &storage,
        Table::new(fixtures::TABLE_MAPPED_1),
        vec![fixtures::mapped_record()],
        fixtures::mapped_pk_map(),
    )
    .await;
    conformance::upsert_rolls_back(
        &storage,
        Table::new(fixtures::TABLE_KEYED),
        vec![fixtures::sample_record()],
        PrimaryKeyMap::new(),
    )
    .await;
    conformance::upsert_rolls_back_on_error(
        &storage,
        Table::new(fixtures::TABLE_KEYED),
        vec![fixtures::sample_record()],
        PrimaryKeyMap::new(),
    )
    .await;
    conformance::binary_payload_round_trips(
        &storage,
        Table::new(fixtures::TABLE_KEYED),
        fixtures::binary_record(),
        PrimaryKeyMap::new(),
        "data",
    )
    .await;

    conformance::truncate_empties(&storage, &fixtures::all_tables()).await;
    conformance::close_is_terminal(&storage).await;
}

#[tokio::test]
async fn run_all_relational() {
    run_all(relational(7), StorageKind::Postgres).await;
}

#[tokio::test]
async fn run_all_document() {
    run_all(document(7), StorageKind::Mongo).await;
}
