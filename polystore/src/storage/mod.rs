//! Storage - Backend Trait and Implementations
//!
//! `TigerStyle`: Abstract storage with simulation-first testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Storage Trait                         │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                         ↑
//!          │                         │
//! ┌────────┴────────┐       ┌────────┴────────┐
//! │   SimStorage    │       │ PostgresStorage │
//! │   (testing)     │       │    (server)     │
//! └─────────────────┘       └─────────────────┘
//! ```
//!
//! Records flow through one pipeline regardless of backend: key columns
//! are resolved (explicit map or introspection), key fields are renamed
//! to their stored columns, and the write builder emits a conflict-aware
//! write in the backend's native shape. Transactions stage writes
//! client-side; commit applies the whole batch atomically.
//!
//! # Simulation-First
//!
//! Tests are written BEFORE implementation. `SimStorage` enables
//! deterministic testing with fault injection.

mod backend;
mod error;
mod record;
mod resolver;
mod sim;
mod txn;
mod upsert;

#[cfg(feature = "postgres")]
mod postgres;

pub use backend::{Storage, StorageKind};
pub use error::{StorageError, StorageResult};
pub use record::{PrimaryKeyMap, Record, Table, UpsertResult, Value};
pub use resolver::resolve_key_columns;
pub use sim::SimStorage;
pub use txn::{OpenTxnGuard, StagedUpsert, Transaction, TxnStatus};
pub use upsert::{
    build_document_write, build_sql_write, validate_keys, DocumentWrite, SqlWrite,
};

#[cfg(feature = "postgres")]
pub use postgres::PostgresStorage;
