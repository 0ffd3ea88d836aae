// [libs/core/bigint/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ARBITRARY-PRECISION BOUNDARY KERNEL (V1.0)
 * CLASIFICACIÓN: CORE MATH (ESTRATO L1)
 * RESPONSABILIDAD: CONVERSIÓN DECIMAL/HEX EN LOS BORDES DEL LEDGER
 *
 * Ranges in this system run to hundreds of bits, so no fixed-width
 * integer is wide enough; every boundary value is carried as a decimal
 * string in storage and promoted to `BigUint` only for arithmetic.
 * This crate is the single place that crosses that boundary.
 * =================================================================
 */
#![deny(missing_docs)]

/// Decimal/hex conversion and tile-address helpers built on `num-bigint`.
pub mod arithmetic;
/// Conversion failure catalog for this crate.
pub mod errors;

/// Curated re-export surface for downstream crates.
pub mod prelude {
    pub use crate::arithmetic::{
        align_down, decimal_to_biguint, hex64_upper, parse_hex64, TILE_ADDRESS_HEX_DIGITS,
    };
    pub use crate::errors::BigIntError;
}
