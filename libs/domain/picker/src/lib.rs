// [libs/domain/picker/src/lib.rs]
/*!
 * Chunk-selection policies layered over the ledger: given a range-set,
 * decide which `2^chunk_bits`-wide slice to claim next, or resume whatever
 * is already `running`.
 */
#![deny(missing_docs)]

/// Error types returned by picker operations.
pub mod errors;
pub mod policies;

pub use errors::{PickerError, Result};
pub use policies::{claim_or_resume_chunk, pick_entropy, pick_random, pick_sequential, Picker};

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use prospector_ledger::{open_in_memory, rangeset::upsert_rangeset};

    #[test]
    fn random_then_entropy_then_sequential_all_claim_something() {
        let conn = open_in_memory().unwrap();
        let rs = upsert_rangeset(&conn, "r", &BigUint::from(0u32), &BigUint::from(999u32), 4, false).unwrap();
        let c = claim_or_resume_chunk(&conn, &rs, Picker::Random, false, 1024).unwrap();
        assert!(c.is_some());
    }

    #[test]
    fn sequential_resumes_running_chunk_before_claiming_new() {
        let conn = open_in_memory().unwrap();
        let rs = upsert_rangeset(&conn, "seq", &BigUint::from(0u32), &BigUint::from(999u32), 4, false).unwrap();
        let first = claim_or_resume_chunk(&conn, &rs, Picker::Sequential, false, 1024).unwrap().unwrap();
        let second = claim_or_resume_chunk(&conn, &rs, Picker::Sequential, false, 1024).unwrap().unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn entropy_claims_midpoint_of_the_largest_gap() {
        let conn = open_in_memory().unwrap();
        let rs = upsert_rangeset(&conn, "ent", &BigUint::from(0u32), &BigUint::from(159u32), 4, false).unwrap();
        let n = rs.total_chunks();
        assert_eq!(n, 10);
        let first = pick_entropy(&conn, &rs).unwrap().unwrap();
        assert_eq!(first.chunk_index, (n - 1) / 2);
    }
}
