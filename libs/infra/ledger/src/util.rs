// [libs/infra/ledger/src/util.rs]
use chrono::Utc;

/// Current UTC time as an ISO-8601 string with second precision, matching
/// the timestamp format used throughout the stored rows.
pub fn utc_now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.fZ").to_string()
}

/// `band_<10 hex chars>` derived from a SHA1 digest of the range-set's
/// defining parameters — used as the default range-set name when the
/// operator doesn't supply one, so re-running with identical bounds
/// resumes the same range-set instead of minting a new one.
pub fn auto_rangeset_name(pubkey: &str, min_dec: &str, max_dec: &str, chunk_bits: u32) -> String {
    use sha1::{Digest, Sha1};
    let payload = format!("{pubkey}:{min_dec}:{max_dec}:{chunk_bits}");
    let digest = Sha1::digest(payload.as_bytes());
    let hex = hex_prefix(&digest, 5);
    format!("band_{hex}")
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().take(n).map(|b| format!("{b:02x}")).collect()
}

/// The fingerprint stored alongside a range-set to detect whether a later
/// invocation asked for the same logical range under a different name.
pub fn cfg_fingerprint(min_dec: &str, max_dec: &str, chunk_bits: u32) -> String {
    format!("min:{min_dec}|max:{max_dec}|bits:{chunk_bits}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_name_is_stable_for_identical_inputs() {
        let a = auto_rangeset_name("02abc", "0", "1000", 48);
        let b = auto_rangeset_name("02abc", "0", "1000", 48);
        assert_eq!(a, b);
        assert!(a.starts_with("band_"));
        assert_eq!(a.len(), "band_".len() + 10);
    }

    #[test]
    fn auto_name_differs_for_different_inputs() {
        let a = auto_rangeset_name("02abc", "0", "1000", 48);
        let b = auto_rangeset_name("02abc", "0", "2000", 48);
        assert_ne!(a, b);
    }
}
