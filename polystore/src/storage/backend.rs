//! Storage Trait
//!
//! `TigerStyle`: Abstract interface over heterogeneous storage backends.
//!
//! # Simulation-First
//!
//! Tests are written against `SimStorage` before `PostgresStorage`.
//! All implementations must satisfy the same trait contract, and the
//! conformance registry replays the same checks against each of them.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use super::error::StorageResult;
use super::record::{PrimaryKeyMap, Record, Table, UpsertResult};
use super::txn::Transaction;

/// The family of backend behind a storage handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Relational backend speaking SQL
    Postgres,
    /// Document backend
    Mongo,
}

impl StorageKind {
    /// Stable name for logging and dispatch.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mongo => "mongo",
        }
    }

    /// Whether this family stores documents rather than rows.
    #[must_use]
    pub fn is_nosql(&self) -> bool {
        match self {
            Self::Postgres => false,
            Self::Mongo => true,
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Abstract storage backend.
///
/// `TigerStyle`: All operations are async, return explicit errors.
///
/// Every handle honors the same contract:
/// - `close` is terminal: later operations fail with `AlreadyClosed`
/// - `commit` applies a transaction's staged writes atomically
/// - a failed commit leaves the backend exactly as it was
#[async_trait]
pub trait Storage: Send + Sync {
    /// Release the backend connection.
    ///
    /// Fails if transactions are still open; succeeds at most once.
    async fn close(&self) -> StorageResult<()>;

    /// Check backend liveness.
    async fn ping(&self) -> StorageResult<()>;

    /// The backend family.
    fn kind(&self) -> StorageKind;

    /// Whether the backend stores documents rather than rows.
    fn is_nosql(&self) -> bool {
        self.kind().is_nosql()
    }

    /// List the names of all tables (or collections) in the default
    /// namespace.
    async fn list_tables(&self) -> StorageResult<Vec<String>>;

    /// Look up the primary key columns for each given table.
    ///
    /// Returns a map from table name to its key columns in schema order.
    /// Unknown tables produce a `SchemaIntrospection` error.
    async fn list_primary_keys(
        &self,
        tables: &[Table],
    ) -> StorageResult<HashMap<String, Vec<String>>>;

    /// Open a transaction for staging writes.
    async fn begin(&self) -> StorageResult<Transaction>;

    /// Apply a transaction's staged writes atomically.
    ///
    /// On success the transaction transitions to Committed and the
    /// result counts every row written. On failure nothing is applied
    /// and the transaction transitions to `RolledBack`.
    async fn commit(&self, txn: &mut Transaction) -> StorageResult<UpsertResult>;

    /// Write a batch of records in a single-use transaction.
    ///
    /// Convenience for callers that do not need multi-table staging.
    async fn upsert(
        &self,
        table: Table,
        records: Vec<Record>,
        pk_map: PrimaryKeyMap,
    ) -> StorageResult<UpsertResult> {
        let mut txn = self.begin().await?;
        txn.stage(table, records, pk_map)?;
        self.commit(&mut txn).await
    }

    /// Delete all rows from the given tables.
    ///
    /// Returns the number of rows deleted. Unknown tables produce a
    /// `NotFound` error.
    async fn truncate(&self, tables: &[Table]) -> StorageResult<u64>;

    /// Read back every record in a table, for verification.
    async fn select_all(&self, table: &Table) -> StorageResult<Vec<Record>>;
}
