// [apps/orchestrator/src/lib.rs]
//! Library surface for the orchestrator binary: CLI definitions, the
//! maintenance one-shots, the summary view, and the main claim/run loop.

/// Command-line argument parsing.
pub mod cli;
/// `--backfill-tiles` / `--compact-tiles` one-shot maintenance passes.
pub mod maintenance;
/// The claim -> run -> record loop.
pub mod run_loop;
/// `--summary` view.
pub mod summary;
/// Tracing subscriber setup.
pub mod telemetry;
