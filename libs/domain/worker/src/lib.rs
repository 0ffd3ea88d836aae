// [libs/domain/worker/src/lib.rs]
/*!
 * Supervises exactly one kangaroo subprocess: builds its argv from a
 * claimed chunk, streams and parses its stdout, keeps the owning chunk's
 * tile leases warm, repaints the progress banner, and escalates signals to
 * bring it down cleanly when the orchestrator is asked to stop.
 */
#![deny(missing_docs)]

pub mod banner;
/// Error types returned by worker operations.
pub mod errors;
pub mod parse;
pub mod process;

pub use errors::{Result, WorkerError};
pub use process::{forward_signal_to_active_group, run_kangaroo, RunRequest, RunResult};
