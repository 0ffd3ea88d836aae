// [libs/domain/worker/src/errors.rs]
use thiserror::Error;

/// Failures raised while spawning or supervising a kangaroo worker
/// subprocess.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The worker binary could not be spawned.
    #[error("failed to spawn worker binary '{path}': {source}")]
    Spawn {
        /// Path the orchestrator tried to execute.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// I/O failure reading the worker's stdout.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A ledger operation (lease refresh, chunk finalize) failed mid-run.
    #[error(transparent)]
    Ledger(#[from] prospector_ledger::LedgerError),

    /// A tile operation (lease refresh, finalize) failed mid-run.
    #[error(transparent)]
    Tile(#[from] prospector_tiles::TileError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, WorkerError>;
