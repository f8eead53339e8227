//! `SimStorage` - In-Memory Storage for Testing
//!
//! `TigerStyle`: Deterministic testing with fault injection.
//!
//! # Simulation-First
//!
//! `SimStorage` implements the full `Storage` contract in memory, in
//! either family (relational or document), so the conformance registry
//! and every transaction test run without a live backend. Commits apply
//! to a scratch copy of the tables and swap only on success, which makes
//! the atomic-rollback guarantee structural.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::dst::{DeterministicRng, FaultConfig, FaultInjector};

use super::backend::{Storage, StorageKind};
use super::error::{StorageError, StorageResult};
use super::record::{PrimaryKeyMap, Record, Table, UpsertResult};
use super::resolver::resolve_key_columns;
use super::txn::{OpenTxnGuard, StagedUpsert, Transaction, TxnStatus};
use super::upsert::{build_document_write, DocumentWrite};

/// One simulated table: declared key columns plus stored rows.
#[derive(Debug, Clone, Default)]
struct SimTable {
    primary_key: Vec<String>,
    rows: Vec<Record>,
}

/// The simulated database: tables by name, plus the closed flag.
#[derive(Debug, Default)]
struct SimDb {
    tables: BTreeMap<String, SimTable>,
    closed: bool,
}

impl SimDb {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::AlreadyClosed);
        }
        Ok(())
    }
}

/// In-memory storage backend for testing.
///
/// `TigerStyle`:
/// - Deterministic via `DeterministicRng`
/// - Fault injection via `FaultInjector`
/// - Thread-safe with `RwLock`
///
/// Clones share the same underlying database.
#[derive(Debug, Clone)]
pub struct SimStorage {
    kind: StorageKind,
    db: Arc<RwLock<SimDb>>,
    /// Fault injector for simulating failures
    fault_injector: Arc<FaultInjector>,
    /// Transactions handed out and not yet terminal
    open_txns: Arc<AtomicUsize>,
}

impl SimStorage {
    /// Create a simulated relational backend.
    #[must_use]
    pub fn relational(rng: DeterministicRng) -> Self {
        Self::with_kind(StorageKind::Postgres, rng)
    }

    /// Create a simulated document backend.
    #[must_use]
    pub fn document(rng: DeterministicRng) -> Self {
        Self::with_kind(StorageKind::Mongo, rng)
    }

    /// Create a simulated backend of the given family.
    #[must_use]
    pub fn with_kind(kind: StorageKind, mut rng: DeterministicRng) -> Self {
        let fault_rng = rng.fork();

        Self {
            kind,
            db: Arc::new(RwLock::new(SimDb::default())),
            fault_injector: Arc::new(FaultInjector::new(fault_rng)),
            open_txns: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a fault configuration.
    ///
    /// Only works before the backend is cloned or shared: `FaultInjector`
    /// registration needs exclusive access.
    #[must_use]
    pub fn with_faults(mut self, config: FaultConfig) -> Self {
        Arc::get_mut(&mut self.fault_injector)
            .expect("cannot add faults after backend is shared")
            .register(config);
        self
    }

    /// Get the fault injector for inspection.
    #[must_use]
    pub fn fault_injector(&self) -> &Arc<FaultInjector> {
        &self.fault_injector
    }

    /// Create a table fixture with the given declared key columns.
    ///
    /// An empty key list makes a keyless table (writes become plain
    /// inserts). Replaces any existing table with the same name.
    pub fn create_table(&self, name: impl Into<String>, primary_key: Vec<String>) {
        let name = name.into();

        // Precondition
        assert!(!name.is_empty(), "table name must not be empty");

        let mut db = self.db.write().unwrap();
        db.tables.insert(
            name,
            SimTable {
                primary_key,
                rows: Vec::new(),
            },
        );
    }

    /// Check if a fault should be injected for an operation.
    fn maybe_inject_fault(&self, operation: &str) -> StorageResult<()> {
        if let Some(fault_type) = self.fault_injector.should_inject(operation) {
            Err(StorageError::simulated_fault(format!(
                "{} during {operation}",
                fault_type.as_str()
            )))
        } else {
            Ok(())
        }
    }

    /// Resolve, translate, and build the document writes for a batch of
    /// staged upserts. No lock is held across the awaits.
    async fn prepare_writes(
        &self,
        staged: &[StagedUpsert],
    ) -> StorageResult<Vec<(String, Vec<DocumentWrite>)>> {
        let mut prepared = Vec::with_capacity(staged.len());

        for upsert in staged {
            {
                let db = self.db.read().unwrap();
                db.ensure_open()?;
                if !db.tables.contains_key(upsert.table.name()) {
                    return Err(StorageError::not_found(upsert.table.name()));
                }
            }

            self.maybe_inject_fault("write")?;

            let key_columns = resolve_key_columns(self, &upsert.table, &upsert.pk_map).await?;

            let mut writes = Vec::with_capacity(upsert.records.len());
            for record in &upsert.records {
                let translated = upsert.pk_map.translate_record(record);
                writes.push(build_document_write(&translated, &key_columns)?);
            }

            prepared.push((upsert.table.name().to_string(), writes));
        }

        Ok(prepared)
    }

    /// Apply prepared writes to a scratch copy and swap on success.
    fn apply_writes(
        &self,
        prepared: Vec<(String, Vec<DocumentWrite>)>,
        error_forced: bool,
    ) -> StorageResult<UpsertResult> {
        let mut db = self.db.write().unwrap();
        db.ensure_open()?;

        let mut scratch = db.tables.clone();
        let mut rows_affected = 0u64;

        for (table_name, writes) in prepared {
            let table = scratch
                .get_mut(&table_name)
                .ok_or_else(|| StorageError::not_found(&table_name))?;

            for write in writes {
                match table.rows.iter_mut().find(|row| write.matches(row)) {
                    Some(row) => *row = write.document,
                    None => table.rows.push(write.document),
                }
                rows_affected += 1;
            }
        }

        // A forced failure happens after every write has been applied to
        // the scratch copy; dropping the scratch is the rollback.
        if error_forced {
            return Err(StorageError::write_conflict("forced write error"));
        }

        db.tables = scratch;
        Ok(UpsertResult::new(rows_affected))
    }
}

#[async_trait]
impl Storage for SimStorage {
    #[tracing::instrument(skip(self))]
    async fn close(&self) -> StorageResult<()> {
        self.maybe_inject_fault("close")?;

        if self.open_txns.load(std::sync::atomic::Ordering::SeqCst) > 0 {
            return Err(StorageError::close("transactions still open"));
        }

        let mut db = self.db.write().unwrap();
        db.ensure_open()?;
        db.closed = true;
        Ok(())
    }

    async fn ping(&self) -> StorageResult<()> {
        self.maybe_inject_fault("ping")?;

        let db = self.db.read().unwrap();
        if db.closed {
            // Ping reports reachability, and a closed handle is unreachable.
            return Err(StorageError::connection("storage closed"));
        }
        Ok(())
    }

    fn kind(&self) -> StorageKind {
        self.kind
    }

    async fn list_tables(&self) -> StorageResult<Vec<String>> {
        self.maybe_inject_fault("list_tables")?;

        let db = self.db.read().unwrap();
        db.ensure_open()?;
        Ok(db.tables.keys().cloned().collect())
    }

    async fn list_primary_keys(
        &self,
        tables: &[Table],
    ) -> StorageResult<HashMap<String, Vec<String>>> {
        self.maybe_inject_fault("list_primary_keys")?;

        let db = self.db.read().unwrap();
        db.ensure_open()?;

        let mut keys_by_table = HashMap::with_capacity(tables.len());
        for table in tables {
            let sim_table = db.tables.get(table.name()).ok_or_else(|| {
                StorageError::schema_introspection(format!("unknown table: {}", table.name()))
            })?;
            keys_by_table.insert(table.name().to_string(), sim_table.primary_key.clone());
        }
        Ok(keys_by_table)
    }

    async fn begin(&self) -> StorageResult<Transaction> {
        {
            let db = self.db.read().unwrap();
            db.ensure_open()?;
        }

        Ok(Transaction::new(OpenTxnGuard::register(Arc::clone(
            &self.open_txns,
        ))))
    }

    #[tracing::instrument(skip(self, txn), fields(staged = txn.staged_len()))]
    async fn commit(&self, txn: &mut Transaction) -> StorageResult<UpsertResult> {
        let error_forced = txn.is_error_forced();
        let staged = txn.begin_commit()?;

        // A commit fault behaves like any other commit failure: the
        // transaction rolls back and cannot be retried.
        let outcome = match self.maybe_inject_fault("commit") {
            Ok(()) => match self.prepare_writes(&staged).await {
                Ok(prepared) => self.apply_writes(prepared, error_forced),
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };

        match outcome {
            Ok(result) => {
                txn.complete(TxnStatus::Committed);
                Ok(result)
            }
            Err(err) => {
                txn.complete(TxnStatus::RolledBack);
                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn truncate(&self, tables: &[Table]) -> StorageResult<u64> {
        self.maybe_inject_fault("truncate")?;

        let mut db = self.db.write().unwrap();
        db.ensure_open()?;

        // Scratch copy keeps truncate all-or-nothing across tables.
        let mut scratch = db.tables.clone();
        let mut rows_deleted = 0u64;
        for table in tables {
            let sim_table = scratch
                .get_mut(table.name())
                .ok_or_else(|| StorageError::not_found(table.name()))?;
            rows_deleted += sim_table.rows.len() as u64;
            sim_table.rows.clear();
        }

        db.tables = scratch;
        Ok(rows_deleted)
    }

    async fn select_all(&self, table: &Table) -> StorageResult<Vec<Record>> {
        self.maybe_inject_fault("read")?;

        let db = self.db.read().unwrap();
        db.ensure_open()?;

        let sim_table = db
            .tables
            .get(table.name())
            .ok_or_else(|| StorageError::not_found(table.name()))?;
        Ok(sim_table.rows.clone())
    }
}
