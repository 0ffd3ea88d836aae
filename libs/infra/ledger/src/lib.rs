// [libs/infra/ledger/src/lib.rs]
/*!
 * Persistent work ledger: range-sets, chunks, and tiles over a single
 * SQLite file, coordinated across cooperating orchestrator processes by
 * unique-constraint races rather than external locking.
 *
 * Opening the ledger always runs the full migration sequence — see
 * [`schema`] — so every caller gets a current schema regardless of which
 * version of the binary last wrote to the file.
 */
#![deny(missing_docs)]

/// Chunk allocation and bookkeeping over the ledger.
pub mod chunks;
/// Error types returned by ledger operations.
pub mod errors;
/// Row/model types persisted in the ledger.
pub mod models;
/// Range-set representation and operations.
pub mod rangeset;
/// Schema migrations applied on open.
pub mod schema;
/// Shared helpers used across ledger modules.
pub mod util;

use rusqlite::Connection;
use tracing::{info, instrument};

pub use errors::{LedgerError, Result};

/// Opens (creating if absent) the SQLite ledger at `path` and applies every
/// pending migration.
#[instrument]
pub fn open(path: &str) -> Result<Connection> {
    info!(path, "opening ledger");
    let conn = Connection::open(path).map_err(|e| LedgerError::Connection(e.to_string()))?;
    schema::apply(&conn)?;
    Ok(conn)
}

/// Opens an in-memory ledger — used by tests and by callers exercising the
/// picker/tile logic without touching disk.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(|e| LedgerError::Connection(e.to_string()))?;
    schema::apply(&conn)?;
    Ok(conn)
}
