// [libs/domain/rules/src/errors.rs]
use thiserror::Error;

/// Failures raised by the rule engine itself (not "no valid number exists",
/// which is a legitimate `Ok(None)` result, not an error).
#[derive(Error, Debug)]
pub enum RuleError {
    /// `lo > hi` — the caller handed the engine an empty search interval.
    #[error("invalid bounds: lo ({lo}) > hi ({hi})")]
    InvalidBounds {
        /// Lower bound as supplied.
        lo: String,
        /// Upper bound as supplied.
        hi: String,
    },
}
