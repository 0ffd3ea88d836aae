// [libs/domain/tiles/src/address.rs]
//! Tile address arithmetic over the fixed 64-hex-digit (256-bit) lattice.
//!
//! A tile at level `L` covers `2^L` consecutive integers and is addressed by
//! the hex string of its (`2^L`-aligned) start, zero-padded to 64 digits.
//! Tile levels must be multiples of 4 so a level boundary always lands on a
//! whole hex nibble — `_parent_hex`-style prefix arithmetic doesn't work
//! otherwise.

use crate::errors::{Result, TileError};

/// Validates that every level is a multiple of 4 and returns them sorted
/// descending (coarsest first), the order the recursive claim/seal walks
/// expect.
pub fn normalize_levels(levels: &[u32]) -> Result<Vec<u32>> {
    let mut out: Vec<u32> = levels.to_vec();
    out.sort_unstable();
    out.dedup();
    for &l in &out {
        if l % 4 != 0 {
            return Err(TileError::LevelNotNibbleAligned(l));
        }
    }
    out.reverse();
    Ok(out)
}

/// The hex address of the ancestor of a tile at `level`/`start_hex` living
/// at the coarser `parent_level`. The parent shares the leftmost
/// `64 - parent_level/4` nibbles and is zero-padded on the right.
pub fn parent_hex(start_hex: &str, parent_level: u32) -> String {
    let head_len = 64 - (parent_level / 4) as usize;
    let tail_len = (parent_level / 4) as usize;
    format!("{}{}", &start_hex[..head_len], "0".repeat(tail_len))
}

/// GLOB pattern matching any immediate child of a tile at `level`/`start_hex`
/// one level finer (`level - 4`).
pub fn child_glob(level: u32, start_hex: &str) -> String {
    let head_len = 64 - (level / 4) as usize;
    let child_level = level - 4;
    let tail_len = (child_level / 4) as usize;
    format!("{}[0-9A-F]{}", &start_hex[..head_len], "0".repeat(tail_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rejects_non_nibble_levels() {
        assert!(normalize_levels(&[50]).is_err());
        assert!(normalize_levels(&[52, 48]).is_ok());
    }

    #[test]
    fn normalize_sorts_descending_and_dedupes() {
        let levels = normalize_levels(&[40, 52, 48, 52]).unwrap();
        assert_eq!(levels, vec![52, 48, 40]);
    }

    #[test]
    fn parent_hex_shares_leftmost_nibbles() {
        let start = format!("{:0>64}", "ABCDE0");
        let parent = parent_hex(&start, 8);
        assert_eq!(&parent[62..], "00");
        assert_eq!(&parent[..62], &start[..62]);
    }
}
