// [libs/domain/picker/src/errors.rs]
use thiserror::Error;

/// Failures raised while selecting the next chunk to work.
#[derive(Error, Debug)]
pub enum PickerError {
    /// Underlying ledger operation failed.
    #[error(transparent)]
    Ledger(#[from] prospector_ledger::LedgerError),

    /// Underlying SQLite call failed directly.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// The digit-rule engine rejected the search bounds it was handed.
    #[error(transparent)]
    Rules(#[from] prospector_rules::RuleError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, PickerError>;
