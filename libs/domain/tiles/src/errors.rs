// [libs/domain/tiles/src/errors.rs]
use thiserror::Error;

/// Failures raised while claiming, sealing, or compacting tiles.
#[derive(Error, Debug)]
pub enum TileError {
    /// A `--tile-levels` entry was not a multiple of 4 bits — tile
    /// boundaries are nibble-aligned, so anything else can't be expressed
    /// as a hex prefix.
    #[error("tile level {0} is not a multiple of 4")]
    LevelNotNibbleAligned(u32),

    /// Underlying ledger query failed.
    #[error(transparent)]
    Ledger(#[from] prospector_ledger::LedgerError),

    /// Underlying SQLite call failed directly (claim/seal run their own
    /// transactions against the shared connection).
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, TileError>;
