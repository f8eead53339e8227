//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`
//! Example: `RECORD_FIELDS_COUNT_MAX` (not `MAX_RECORD_FIELDS`)
//!
//! Every constant includes units in the name:
//! - _`BYTES_MAX/MIN` for size limits
//! - _`COUNT_MAX` for quantity limits
//! - _MS for milliseconds

// =============================================================================
// Table Limits
// =============================================================================

/// Maximum length of a table name
pub const TABLE_NAME_BYTES_MAX: usize = 128;

/// Maximum length of a table namespace (schema)
pub const TABLE_NAMESPACE_BYTES_MAX: usize = 128;

// =============================================================================
// Record Limits
// =============================================================================

/// Maximum number of fields in a single record
pub const RECORD_FIELDS_COUNT_MAX: usize = 256;

/// Maximum length of a field name
pub const RECORD_FIELD_NAME_BYTES_MAX: usize = 128;

/// Maximum size of a scalar string value
pub const RECORD_STRING_BYTES_MAX: usize = 1024 * 1024; // 1MB

/// Maximum size of an opaque binary payload
pub const RECORD_BINARY_BYTES_MAX: usize = 16 * 1024 * 1024; // 16MB

// =============================================================================
// Primary Key Limits
// =============================================================================

/// Maximum number of fields in a composite primary key
pub const PRIMARY_KEY_FIELDS_COUNT_MAX: usize = 16;

// =============================================================================
// Upsert / Transaction Limits
// =============================================================================

/// Maximum number of records in a single staged upsert
pub const UPSERT_BATCH_RECORDS_COUNT_MAX: usize = 10_000;

/// Maximum number of upserts staged in one transaction
pub const TXN_STAGED_UPSERTS_COUNT_MAX: usize = 1_000;

// =============================================================================
// Storage Limits
// =============================================================================

/// Maximum connections in a backend connection pool
pub const STORAGE_POOL_CONNECTIONS_COUNT_MAX: u32 = 10;

/// Maximum number of retry attempts for storage operations
pub const STORAGE_RETRY_COUNT_MAX: u32 = 3;

// =============================================================================
// DST (Deterministic Simulation Testing) Limits
// =============================================================================

/// Maximum number of simulation steps
pub const DST_SIMULATION_STEPS_MAX: u64 = 1_000_000;

/// Maximum probability for fault injection (1.0 = 100%)
pub const DST_FAULT_PROBABILITY_MAX: f64 = 1.0;

// =============================================================================
// Tests
// =============================================================================
