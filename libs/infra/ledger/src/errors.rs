// [libs/infra/ledger/src/errors.rs]
use thiserror::Error;

/// Failures raised by the ledger while opening, migrating, or querying the
/// SQLite-backed store of range-sets, chunks, and tiles.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Failed to open or configure the underlying SQLite connection.
    #[error("[LEDGER_CONN_FAULT]: database uplink failed -> {0}")]
    Connection(String),

    /// A schema migration step failed in a way that isn't the known
    /// idempotent "duplicate column" case.
    #[error("[LEDGER_SCHEMA_FAULT]: migration rejected -> {0}")]
    Migration(String),

    /// A query or statement was rejected by SQLite.
    #[error("[LEDGER_QUERY_FAULT]: {0}")]
    Query(#[from] rusqlite::Error),

    /// A stored row failed to map onto its domain type.
    #[error("[LEDGER_MAPPING_FAULT]: {0}")]
    Mapping(String),

    /// The named range-set does not exist.
    #[error("[LEDGER_RANGESET_FAULT]: range-set not found: {0}")]
    RangeSetNotFound(String),

    /// A caller asked to upsert a range-set whose fingerprint disagrees with
    /// the stored one, and did not pass `force_reinit`.
    #[error("[LEDGER_RANGESET_FAULT]: fingerprint conflict for '{0}' — pass force_reinit to replace it")]
    FingerprintConflict(String),

    /// A status value has no admitted mapping in the live `CHECK` constraint
    /// and no safe fallback exists.
    #[error("[LEDGER_SCHEMA_FAULT]: status '{0}' has no admitted mapping in the live schema")]
    UnmappableStatus(String),

    /// A requested tile or chunk row does not exist.
    #[error("[LEDGER_NOT_FOUND]: {0}")]
    NotFound(String),

    /// An operation assumed a row was in a state it wasn't.
    #[error("[LEDGER_STATE_FAULT]: {0}")]
    InvalidState(String),
}

/// Convenience alias used throughout the ledger crate.
pub type Result<T> = std::result::Result<T, LedgerError>;
