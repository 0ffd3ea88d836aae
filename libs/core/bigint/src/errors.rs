// [libs/core/bigint/src/errors.rs]
use thiserror::Error;

/// Failures converting between decimal-string, hex, and `BigUint` forms.
#[derive(Error, Debug)]
pub enum BigIntError {
    /// The input string was not a valid base-10 non-negative integer.
    #[error("invalid decimal integer: {0}")]
    InvalidDecimal(String),

    /// The input string was not valid hexadecimal.
    #[error("invalid hexadecimal value: {0}")]
    InvalidHex(String),

    /// A tile address did not have the required fixed width.
    #[error("hex value has {actual} digits, expected {expected}")]
    WrongWidth {
        /// Digits actually present.
        actual: usize,
        /// Digits required.
        expected: usize,
    },
}
