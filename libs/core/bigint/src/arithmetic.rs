// [libs/core/bigint/src/arithmetic.rs]
use crate::errors::BigIntError;
use num_bigint::BigUint;
use num_traits::Zero;

/// Width, in hex digits, of a canonical tile address (256 bits).
pub const TILE_ADDRESS_HEX_DIGITS: usize = 64;

/// Parses a base-10 string into a [`BigUint`], rejecting anything that
/// is not a plain non-negative decimal integer (no sign, no whitespace).
pub fn decimal_to_biguint(value: &str) -> Result<BigUint, BigIntError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BigIntError::InvalidDecimal(value.to_string()));
    }
    trimmed
        .parse::<BigUint>()
        .map_err(|_| BigIntError::InvalidDecimal(value.to_string()))
}

/// Renders a [`BigUint`] as an uppercase, zero-padded 64-hex-digit string —
/// the canonical tile-address representation.
pub fn hex64_upper(value: &BigUint) -> String {
    let raw = value.to_str_radix(16).to_uppercase();
    format!("{:0>width$}", raw, width = TILE_ADDRESS_HEX_DIGITS)
}

/// Parses a 64-hex-digit tile address back into a [`BigUint`].
///
/// Unlike [`decimal_to_biguint`] this enforces the fixed width: a tile
/// address that decoded to the wrong number of digits indicates a corrupt
/// row, not merely a small number, so it is reported distinctly.
pub fn parse_hex64(value: &str) -> Result<BigUint, BigIntError> {
    let trimmed = value.trim();
    if trimmed.len() != TILE_ADDRESS_HEX_DIGITS {
        return Err(BigIntError::WrongWidth {
            actual: trimmed.len(),
            expected: TILE_ADDRESS_HEX_DIGITS,
        });
    }
    BigUint::parse_bytes(trimmed.as_bytes(), 16)
        .ok_or_else(|| BigIntError::InvalidHex(value.to_string()))
}

/// Aligns `value` down to the nearest multiple of `2^bits`.
///
/// Equivalent to clearing the low `bits` bits: `value - (value mod 2^bits)`.
pub fn align_down(value: &BigUint, bits: u32) -> BigUint {
    if bits == 0 {
        return value.clone();
    }
    let modulus = BigUint::from(1u32) << bits;
    let remainder = value % &modulus;
    if remainder.is_zero() {
        value.clone()
    } else {
        value - remainder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_round_trips() {
        let v = decimal_to_biguint("123456789012345678901234567890").unwrap();
        assert_eq!(v.to_string(), "123456789012345678901234567890");
    }

    #[test]
    fn rejects_signed_or_empty_decimal() {
        assert!(decimal_to_biguint("-5").is_err());
        assert!(decimal_to_biguint("").is_err());
        assert!(decimal_to_biguint(" 12 ").is_ok());
    }

    #[test]
    fn hex64_pads_to_full_width() {
        let v = BigUint::from(255u32);
        let hex = hex64_upper(&v);
        assert_eq!(hex.len(), 64);
        assert!(hex.ends_with("FF"));
        assert!(hex[..62].bytes().all(|b| b == b'0'));
    }

    #[test]
    fn parse_hex64_round_trips() {
        let v = BigUint::from(0xDEADBEEFu64);
        let hex = hex64_upper(&v);
        assert_eq!(parse_hex64(&hex).unwrap(), v);
    }

    #[test]
    fn parse_hex64_rejects_wrong_width() {
        assert!(parse_hex64("FF").is_err());
    }

    #[test]
    fn align_down_clears_low_bits() {
        let v = BigUint::from(0b1011_1111u32);
        let aligned = align_down(&v, 4);
        assert_eq!(aligned, BigUint::from(0b1011_0000u32));
    }
}
