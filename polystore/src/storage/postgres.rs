//! `PostgresStorage` - Production Storage
//!
//! `TigerStyle`: Real relational storage over a `sqlx` connection pool.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PostgresStorage                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pool: sqlx::PgPool (connection pooling)                    │
//! │  Writes: INSERT ... ON CONFLICT inside a database txn       │
//! │  Keys: information_schema introspection, cached per commit  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tables and their schemas are owned by the caller; this backend only
//! introspects them. Tests that need a live database gate on the
//! `TEST_POSTGRES_URL` environment variable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo};

use crate::constants::STORAGE_POOL_CONNECTIONS_COUNT_MAX;

use super::backend::{Storage, StorageKind};
use super::error::{StorageError, StorageResult};
use super::record::{Record, Table, UpsertResult, Value};
use super::resolver::resolve_key_columns;
use super::txn::{OpenTxnGuard, StagedUpsert, Transaction, TxnStatus};
use super::upsert::{build_sql_write, quote_table};

const DEFAULT_SCHEMA: &str = "public";

/// PostgreSQL storage backend for production use.
///
/// `TigerStyle`: Connection pooling, explicit errors, terminal close.
#[derive(Clone, Debug)]
pub struct PostgresStorage {
    pool: PgPool,
    closed: Arc<AtomicBool>,
    open_txns: Arc<AtomicUsize>,
}

impl PostgresStorage {
    /// Connect with a connection string.
    ///
    /// # Errors
    /// Returns `Connection` if the pool cannot be created.
    ///
    /// # Panics
    /// Panics if the connection string is empty or not a postgres URL.
    pub async fn connect(connection_string: &str) -> StorageResult<Self> {
        // Preconditions
        assert!(
            !connection_string.is_empty(),
            "connection string cannot be empty"
        );
        assert!(
            connection_string.starts_with("postgres://")
                || connection_string.starts_with("postgresql://"),
            "connection string must be postgres URL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(STORAGE_POOL_CONNECTIONS_COUNT_MAX)
            .connect(connection_string)
            .await
            .map_err(|e| StorageError::connection(format!("failed to connect: {e}")))?;

        Ok(Self::from_pool(pool))
    }

    /// Create from an existing pool.
    ///
    /// Useful when sharing a pool across multiple handles.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            closed: Arc::new(AtomicBool::new(false)),
            open_txns: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::AlreadyClosed);
        }
        Ok(())
    }

    async fn table_exists(&self, table: &Table) -> StorageResult<bool> {
        let schema = table.namespace().unwrap_or(DEFAULT_SCHEMA);

        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
            ",
        )
        .bind(schema)
        .bind(table.name())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::schema_introspection(e.to_string()))?;

        Ok(exists)
    }

    /// Apply staged writes inside one database transaction.
    ///
    /// Key resolution happens before the transaction opens; the writes
    /// themselves run on a single connection and commit together.
    async fn apply_staged(
        &self,
        staged: &[StagedUpsert],
        error_forced: bool,
    ) -> StorageResult<UpsertResult> {
        let mut prepared = Vec::with_capacity(staged.len());
        for upsert in staged {
            let key_columns = resolve_key_columns(self, &upsert.table, &upsert.pk_map).await?;

            for record in &upsert.records {
                let translated = upsert.pk_map.translate_record(record);
                prepared.push(build_sql_write(&upsert.table, &translated, &key_columns)?);
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::connection(format!("failed to begin: {e}")))?;

        let mut rows_affected = 0u64;
        for write in &prepared {
            let mut query = sqlx::query(&write.sql);
            for param in &write.params {
                query = bind_value(query, param);
            }

            let result = query
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::write_conflict(e.to_string()))?;
            rows_affected += result.rows_affected();
        }

        // A forced failure happens after every write was applied;
        // dropping the uncommitted transaction is the rollback.
        if error_forced {
            return Err(StorageError::write_conflict("forced write error"));
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::write_conflict(format!("failed to commit: {e}")))?;

        Ok(UpsertResult::new(rows_affected))
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match value {
        Value::String(s) => query.bind(s.as_str()),
        Value::Int(i) => query.bind(*i),
        Value::Bool(b) => query.bind(*b),
        Value::Bytes(b) => query.bind(b.as_slice()),
    }
}

/// Decode a row into a record, skipping NULLs and unsupported types.
fn row_to_record(row: &PgRow) -> StorageResult<Record> {
    let mut record = Record::new();

    for column in row.columns() {
        let name = column.name();
        let value = match column.type_info().name() {
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => row
                .try_get::<Option<String>, _>(name)
                .map_err(|e| StorageError::internal(e.to_string()))?
                .map(Value::String),
            "INT2" => row
                .try_get::<Option<i16>, _>(name)
                .map_err(|e| StorageError::internal(e.to_string()))?
                .map(|i| Value::Int(i64::from(i))),
            "INT4" => row
                .try_get::<Option<i32>, _>(name)
                .map_err(|e| StorageError::internal(e.to_string()))?
                .map(|i| Value::Int(i64::from(i))),
            "INT8" => row
                .try_get::<Option<i64>, _>(name)
                .map_err(|e| StorageError::internal(e.to_string()))?
                .map(Value::Int),
            "BOOL" => row
                .try_get::<Option<bool>, _>(name)
                .map_err(|e| StorageError::internal(e.to_string()))?
                .map(Value::Bool),
            "BYTEA" => row
                .try_get::<Option<Vec<u8>>, _>(name)
                .map_err(|e| StorageError::internal(e.to_string()))?
                .map(Value::Bytes),
            _ => None,
        };

        if let Some(value) = value {
            record.insert(name, value);
        }
    }

    Ok(record)
}

#[async_trait]
impl Storage for PostgresStorage {
    #[tracing::instrument(skip(self))]
    async fn close(&self) -> StorageResult<()> {
        if self.open_txns.load(Ordering::SeqCst) > 0 {
            return Err(StorageError::close("transactions still open"));
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StorageError::AlreadyClosed);
        }

        self.pool.close().await;
        Ok(())
    }

    async fn ping(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            // Ping reports reachability, and a closed handle is unreachable.
            return Err(StorageError::connection("storage closed"));
        }

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::connection(format!("ping failed: {e}")))?;
        Ok(())
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Postgres
    }

    async fn list_tables(&self) -> StorageResult<Vec<String>> {
        self.ensure_open()?;

        let rows: Vec<String> = sqlx::query_scalar(
            r"
            SELECT table_name FROM information_schema.tables
            WHERE table_schema = $1 AND table_type = 'BASE TABLE'
            ORDER BY table_name
            ",
        )
        .bind(DEFAULT_SCHEMA)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::schema_introspection(e.to_string()))?;

        Ok(rows)
    }

    async fn list_primary_keys(
        &self,
        tables: &[Table],
    ) -> StorageResult<HashMap<String, Vec<String>>> {
        self.ensure_open()?;

        let mut keys_by_table = HashMap::with_capacity(tables.len());
        for table in tables {
            if !self.table_exists(table).await? {
                return Err(StorageError::schema_introspection(format!(
                    "unknown table: {}",
                    table.name()
                )));
            }

            let schema = table.namespace().unwrap_or(DEFAULT_SCHEMA);
            let columns: Vec<String> = sqlx::query_scalar(
                r"
                SELECT kcu.column_name
                FROM information_schema.table_constraints tc
                JOIN information_schema.key_column_usage kcu
                  ON tc.constraint_name = kcu.constraint_name
                 AND tc.table_schema = kcu.table_schema
                WHERE tc.constraint_type = 'PRIMARY KEY'
                  AND tc.table_schema = $1
                  AND tc.table_name = $2
                ORDER BY kcu.ordinal_position
                ",
            )
            .bind(schema)
            .bind(table.name())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::schema_introspection(e.to_string()))?;

            keys_by_table.insert(table.name().to_string(), columns);
        }

        Ok(keys_by_table)
    }

    async fn begin(&self) -> StorageResult<Transaction> {
        self.ensure_open()?;

        Ok(Transaction::new(OpenTxnGuard::register(Arc::clone(
            &self.open_txns,
        ))))
    }

    #[tracing::instrument(skip(self, txn), fields(staged = txn.staged_len()))]
    async fn commit(&self, txn: &mut Transaction) -> StorageResult<UpsertResult> {
        self.ensure_open()?;

        let error_forced = txn.is_error_forced();
        let staged = txn.begin_commit()?;

        match self.apply_staged(&staged, error_forced).await {
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
        self.ensure_open()?;

        for table in tables {
            if !self.table_exists(table).await? {
                return Err(StorageError::not_found(table.name()));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::connection(format!("failed to begin: {e}")))?;

        let mut rows_deleted = 0u64;
        for table in tables {
            let table_sql = quote_table(table)?;
            let result = sqlx::query(&format!("DELETE FROM {table_sql}"))
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::write_conflict(e.to_string()))?;
            rows_deleted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::write_conflict(format!("failed to commit: {e}")))?;

        Ok(rows_deleted)
    }

    async fn select_all(&self, table: &Table) -> StorageResult<Vec<Record>> {
        self.ensure_open()?;

        if !self.table_exists(table).await? {
            return Err(StorageError::not_found(table.name()));
        }

        let table_sql = quote_table(table)?;
        let rows = sqlx::query(&format!("SELECT * FROM {table_sql}"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_record).collect()
    }
}
