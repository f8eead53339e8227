//! Transactions
//!
//! `TigerStyle`: Staged writes with an explicit state machine.
//!
//! A transaction stages upserts client-side; nothing touches the backend
//! until `Storage::commit` applies the whole batch atomically. The state
//! machine is Open -> {Committed, RolledBack} with no way back.

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::constants::{TXN_STAGED_UPSERTS_COUNT_MAX, UPSERT_BATCH_RECORDS_COUNT_MAX};

use super::error::{StorageError, StorageResult};
use super::record::{PrimaryKeyMap, Record, Table, UpsertResult};

/// Transaction lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnStatus {
    /// Accepting staged writes
    Open,
    /// Writes applied atomically
    Committed,
    /// Writes discarded
    RolledBack,
}

/// One staged upsert: a batch of records bound for a table.
#[derive(Debug, Clone)]
pub struct StagedUpsert {
    /// Target table
    pub table: Table,
    /// Records to write
    pub records: Vec<Record>,
    /// Logical-to-stored key column mapping
    pub pk_map: PrimaryKeyMap,
}

/// RAII guard counting open transactions on a storage handle.
///
/// The backend increments the shared counter when handing out a
/// transaction; the guard decrements it when the transaction reaches a
/// terminal state or is dropped.
#[derive(Debug)]
pub struct OpenTxnGuard {
    counter: Arc<AtomicUsize>,
}

impl OpenTxnGuard {
    /// Register a new open transaction on the shared counter.
    #[must_use]
    pub fn register(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for OpenTxnGuard {
    fn drop(&mut self) {
        let previous = self.counter.fetch_sub(1, Ordering::SeqCst);

        // Invariant: guard count never underflows
        assert!(previous > 0, "open transaction counter underflow");
    }
}

/// A client-side transaction of staged upserts.
///
/// Created by `Storage::begin`, consumed by `Storage::commit` or by
/// `roll_back`. Backends drive the two-phase handoff: `begin_commit`
/// takes ownership of the staged writes, then `complete` records the
/// terminal state after the backend finishes (or fails to finish)
/// applying them.
#[derive(Debug)]
pub struct Transaction {
    status: TxnStatus,
    staged: Vec<StagedUpsert>,
    force_error: bool,
    guard: Option<OpenTxnGuard>,
}

impl Transaction {
    /// Create an open transaction tracked by the given guard.
    #[must_use]
    pub fn new(guard: OpenTxnGuard) -> Self {
        Self {
            status: TxnStatus::Open,
            staged: Vec::new(),
            force_error: false,
            guard: Some(guard),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> TxnStatus {
        self.status
    }

    /// Check if the transaction can still stage writes.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == TxnStatus::Open
    }

    /// Number of staged upserts.
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Poison the transaction so commit fails after applying its writes.
    ///
    /// The backend detects the flag before finalizing, returns an error,
    /// and the atomicity guarantee discards everything that was applied.
    pub fn force_error(&mut self) {
        self.force_error = true;
    }

    /// Check whether a commit failure has been forced.
    #[must_use]
    pub fn is_error_forced(&self) -> bool {
        self.force_error
    }

    /// Stage an upsert.
    ///
    /// Validates every record and checks staging limits. Key columns are
    /// not checked here: resolution happens at commit time, when the
    /// backend knows the effective key set.
    ///
    /// # Errors
    /// Returns `TransactionClosed` if the transaction is terminal, or
    /// `Validation` if a record or a limit check fails.
    pub fn stage(
        &mut self,
        table: Table,
        records: Vec<Record>,
        pk_map: PrimaryKeyMap,
    ) -> StorageResult<()> {
        if !self.is_open() {
            return Err(StorageError::transaction_closed(format!(
                "cannot stage writes, transaction is {:?}",
                self.status
            )));
        }
        if self.staged.len() >= TXN_STAGED_UPSERTS_COUNT_MAX {
            return Err(StorageError::validation(format!(
                "transaction already has {TXN_STAGED_UPSERTS_COUNT_MAX} staged upserts"
            )));
        }
        if records.len() > UPSERT_BATCH_RECORDS_COUNT_MAX {
            return Err(StorageError::validation(format!(
                "batch of {} records exceeds {UPSERT_BATCH_RECORDS_COUNT_MAX}",
                records.len()
            )));
        }

        for record in &records {
            record.validate()?;
        }

        self.staged.push(StagedUpsert {
            table,
            records,
            pk_map,
        });

        Ok(())
    }

    /// Discard all staged writes and close the transaction.
    ///
    /// # Errors
    /// Returns `TransactionClosed` if the transaction is already terminal.
    pub fn roll_back(&mut self) -> StorageResult<UpsertResult> {
        if !self.is_open() {
            return Err(StorageError::transaction_closed(format!(
                "cannot roll back, transaction is {:?}",
                self.status
            )));
        }

        self.staged.clear();
        self.status = TxnStatus::RolledBack;
        self.guard = None;

        Ok(UpsertResult::new(0))
    }

    /// Take ownership of the staged writes to begin a commit.
    ///
    /// Called by the backend. The transaction stays Open until the
    /// backend reports the outcome through [`Transaction::complete`].
    ///
    /// # Errors
    /// Returns `TransactionClosed` if the transaction is terminal.
    pub fn begin_commit(&mut self) -> StorageResult<Vec<StagedUpsert>> {
        if !self.is_open() {
            return Err(StorageError::transaction_closed(format!(
                "cannot commit, transaction is {:?}",
                self.status
            )));
        }

        Ok(mem::take(&mut self.staged))
    }

    /// Record the terminal outcome of a commit attempt.
    ///
    /// A failed commit transitions to `RolledBack`: the backend has
    /// discarded the writes and the transaction cannot be retried.
    pub fn complete(&mut self, status: TxnStatus) {
        // Preconditions
        assert!(self.is_open(), "complete called on terminal transaction");
        assert!(
            status != TxnStatus::Open,
            "complete requires a terminal status"
        );

        self.status = status;
        self.guard = None;
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_open() && !self.staged.is_empty() {
            tracing::warn!(
                staged = self.staged.len(),
                "transaction dropped with staged writes, discarding"
            );
        }
    }
}
