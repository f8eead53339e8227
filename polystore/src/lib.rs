//! # Polystore
//!
//! A polymorphic storage layer: one contract, many backends, one
//! conformance suite.
//!
//! ## Features
//!
//! - **One Contract**: `Storage` covers lifecycle, introspection, and
//!   transactional writes for every backend
//! - **Transactional Upserts**: records stage client-side and commit
//!   atomically; a failed commit leaves the backend untouched
//! - **Key Resolution**: explicit key maps win, schema introspection
//!   fills the gaps
//! - **Conformance Suite**: the same behavioral checks replay against
//!   every backend
//! - **Deterministic Testing**: full DST (Deterministic Simulation
//!   Testing) with seeded randomness and fault injection
//!
//! ## Quick Start
//!
//! ```rust
//! use polystore::dst::DeterministicRng;
//! use polystore::storage::{PrimaryKeyMap, Record, SimStorage, Storage, Table};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = SimStorage::relational(DeterministicRng::new(42));
//! storage.create_table("users", vec!["id".to_string()]);
//!
//! let record = Record::new()
//!     .with_field("id", "1")
//!     .with_field("name", "alice");
//!
//! let result = storage
//!     .upsert(Table::new("users"), vec![record], PrimaryKeyMap::new())
//!     .await?;
//! assert_eq!(result.rows_affected, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Storage Trait                       │
//! ├─────────────────────────────────────────────────────────┤
//! │  Transaction (staged writes, Open → terminal)           │
//! │  Resolver (key map │ schema introspection)              │
//! │  Write Builder (SQL ON CONFLICT │ document replace)     │
//! ├─────────────────────────────────────────────────────────┤
//! │  SimStorage (testing)   │  PostgresStorage (feature)    │
//! ├─────────────────────────────────────────────────────────┤
//! │  DST Framework          │  fault injection + seeds      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Simulation-First Philosophy
//!
//! > "If you're not testing with fault injection, you're not testing."
//!
//! `SimStorage` implements the whole contract in memory, in either
//! backend family, so the conformance suite and the transaction tests
//! run deterministically from a seed. Failing runs replay with
//! `DST_SEED=<seed>`.

pub mod conformance;
pub mod constants;
pub mod dst;
pub mod storage;

pub use storage::{
    PrimaryKeyMap, Record, Storage, StorageError, StorageKind, StorageResult, Table, Transaction,
    TxnStatus, UpsertResult, Value,
};

#[cfg(feature = "postgres")]
pub use storage::PostgresStorage;
