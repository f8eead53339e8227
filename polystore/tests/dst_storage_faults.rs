//! DST Tests for Storage Fault Injection
//!
//! `TigerStyle`: Verify the storage contract under injected failures.
//!
//! These tests confirm that:
//! 1. Injected faults surface as `SimulatedFault` errors
//! 2. A failed commit never leaves partial writes behind
//! 3. The same seed reproduces the same fault pattern exactly
//! 4. Backends recover once bounded faults are exhausted

use polystore::dst::{DeterministicRng, FaultConfig, FaultType, SimConfig};
use polystore::storage::{
    PrimaryKeyMap, Record, SimStorage, Storage, StorageError, Table, TxnStatus,
};

// =============================================================================
// Test Helpers
// =============================================================================

fn keyed_storage(seed: u64, fault: Option<FaultConfig>) -> SimStorage {
    let storage = match fault {
        Some(config) => SimStorage::relational(DeterministicRng::new(seed)).with_faults(config),
        None => SimStorage::relational(DeterministicRng::new(seed)),
    };
    storage.create_table("pktests1", vec!["test_string".to_string()]);
    storage
}

fn record(key: &str, id: &str) -> Record {
    Record::new()
        .with_field("test_string", key)
        .with_field("id", id)
}

// =============================================================================
// Fault Surfacing
// =============================================================================

#[tokio::test]
async fn commit_fault_rolls_back_transaction() {
    let storage = keyed_storage(
        42,
        Some(FaultConfig::new(FaultType::CommitFail, 1.0).with_filter("commit")),
    );

    let mut txn = storage.begin().await.unwrap();
    txn.stage(
        Table::new("pktests1"),
        vec![record("test", "1")],
        PrimaryKeyMap::new(),
    )
    .unwrap();

    let err = storage.commit(&mut txn).await.unwrap_err();
    assert!(matches!(err, StorageError::SimulatedFault { .. }));
    assert!(err.is_transient());
    assert_eq!(txn.status(), TxnStatus::RolledBack);

    let rows = storage.select_all(&Table::new("pktests1")).await.unwrap();
    assert!(rows.is_empty(), "failed commit must not leave partial writes");
}

#[tokio::test]
async fn ping_fault_surfaces() {
    let storage = keyed_storage(
        42,
        Some(FaultConfig::new(FaultType::PingFail, 1.0).with_filter("ping")),
    );

    assert!(matches!(
        storage.ping().await.unwrap_err(),
        StorageError::SimulatedFault { .. }
    ));
}

#[tokio::test]
async fn truncate_fault_leaves_rows() {
    let faulty = keyed_storage(
        42,
        Some(FaultConfig::new(FaultType::TruncateFail, 1.0).with_filter("truncate")),
    );
    faulty
        .upsert(
            Table::new("pktests1"),
            vec![record("test", "1")],
            PrimaryKeyMap::new(),
        )
        .await
        .unwrap();

    assert!(faulty.truncate(&[Table::new("pktests1")]).await.is_err());
    let rows = faulty.select_all(&Table::new("pktests1")).await.unwrap();
    assert_eq!(rows.len(), 1, "failed truncate must not delete rows");
}

// =============================================================================
// Bounded Faults and Recovery
// =============================================================================

#[tokio::test]
async fn bounded_fault_allows_recovery() {
    let storage = keyed_storage(
        42,
        Some(
            FaultConfig::new(FaultType::WriteFail, 1.0)
                .with_filter("write")
                .with_max_injections(1),
        ),
    );

    let err = storage
        .upsert(
            Table::new("pktests1"),
            vec![record("test", "1")],
            PrimaryKeyMap::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::SimulatedFault { .. }));

    // The fault budget is spent; the retry succeeds.
    let result = storage
        .upsert(
            Table::new("pktests1"),
            vec![record("test", "1")],
            PrimaryKeyMap::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.rows_affected, 1);
    assert_eq!(storage.fault_injector().total_injections(), 1);
}

// =============================================================================
// Determinism
// =============================================================================

/// Run a fixed workload and record which upserts survive fault injection.
async fn fault_outcomes(seed: u64) -> Vec<bool> {
    let storage = keyed_storage(
        seed,
        Some(FaultConfig::new(FaultType::WriteFail, 0.5).with_filter("write")),
    );

    let mut outcomes = Vec::with_capacity(50);
    for i in 0..50 {
        let result = storage
            .upsert(
                Table::new("pktests1"),
                vec![record(&format!("key{i}"), "1")],
                PrimaryKeyMap::new(),
            )
            .await;
        outcomes.push(result.is_ok());
    }
    outcomes
}

#[tokio::test]
async fn same_seed_reproduces_fault_pattern() {
    let first = fault_outcomes(12345).await;
    let second = fault_outcomes(12345).await;
    assert_eq!(first, second, "same seed must reproduce the same faults");

    let successes = first.iter().filter(|ok| **ok).count();
    assert!(
        successes > 0 && successes < first.len(),
        "0.5 probability should mix successes and failures over 50 runs"
    );
}

#[tokio::test]
async fn different_seeds_diverge() {
    let first = fault_outcomes(1).await;
    let second = fault_outcomes(2).await;
    assert_ne!(
        first, second,
        "different seeds should produce different fault patterns"
    );
}

#[tokio::test]
async fn config_seed_replays() {
    let config = SimConfig::default();

    let first = fault_outcomes(config.seed()).await;
    let second = fault_outcomes(config.seed()).await;
    assert_eq!(first, second, "replay with DST_SEED={}", config.seed());
}
