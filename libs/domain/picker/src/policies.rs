// [libs/domain/picker/src/policies.rs]
//! The three chunk-selection policies. Every policy first resumes an
//! already-`running` chunk, if one exists, before claiming anything new —
//! this is what makes a restarted orchestrator pick up exactly where a
//! crashed one left off instead of abandoning in-flight work.

use prospector_ledger::chunks::{claimed_indices, running_chunk, try_insert_chunk};
use prospector_ledger::models::{chunk_size_for_bits, Chunk, RangeSet};
use prospector_ledger::rangeset::set_next_index;
use rand::Rng;
use rusqlite::Connection;

use crate::errors::Result;

fn clamp_u64(v: i64, lo: u64, hi: u64) -> u64 {
    v.max(lo as i64).min(hi as i64) as u64
}

/// Claims a uniformly random unclaimed chunk, probing up to 64 random
/// indices before falling back to a linear scan for correctness under heavy
/// contention.
pub fn pick_random(conn: &Connection, rs: &RangeSet) -> Result<Option<Chunk>> {
    if let Some(c) = running_chunk(conn, rs.id)? {
        return Ok(Some(c));
    }
    let n = rs.total_chunks();
    if n == 0 {
        return Ok(None);
    }
    let mut rng = rand::thread_rng();
    for _ in 0..64 {
        let idx = rng.gen_range(0..n);
        if let Some(c) = try_insert_chunk(conn, rs, idx)? {
            return Ok(Some(c));
        }
    }
    for idx in 0..n {
        if let Some(c) = try_insert_chunk(conn, rs, idx)? {
            return Ok(Some(c));
        }
    }
    Ok(None)
}

/// One contiguous run of unclaimed indices: `(length, first_idx, last_idx)`.
type Interval = (u64, u64, u64);

/// Builds the maximal unclaimed intervals of `[0, n)` given the sorted list
/// of already-claimed indices.
pub fn build_intervals_from_claimed(n: u64, claimed_sorted: &[u64]) -> Vec<Interval> {
    if n == 0 {
        return Vec::new();
    }
    let Some(&first) = claimed_sorted.first() else {
        return vec![(n, 0, n - 1)];
    };
    let mut spans = Vec::new();
    if first > 0 {
        spans.push((first, 0, first - 1));
    }
    for w in claimed_sorted.windows(2) {
        let (a, b) = (w[0], w[1]);
        if b > a + 1 {
            spans.push((b - a - 1, a + 1, b - 1));
        }
    }
    let last = *claimed_sorted.last().unwrap();
    if last < n - 1 {
        spans.push((n - 1 - last, last + 1, n - 1));
    }
    spans
}

/// Claims the chunk at the midpoint of the largest currently unclaimed gap —
/// maximizes coverage entropy rather than sweeping linearly or randomly.
pub fn pick_entropy(conn: &Connection, rs: &RangeSet) -> Result<Option<Chunk>> {
    if let Some(c) = running_chunk(conn, rs.id)? {
        return Ok(Some(c));
    }
    let n = rs.total_chunks();

    let mut claimed = claimed_indices(conn, rs.id)?;
    if claimed.is_empty() {
        let idx = (n - 1) / 2;
        if let Some(c) = try_insert_chunk(conn, rs, idx)? {
            return Ok(Some(c));
        }
        return pick_random(conn, rs);
    }
    claimed.sort_unstable();

    for attempt in 0..2 {
        let intervals = build_intervals_from_claimed(n, &claimed);
        let Some(&(_, l, r)) = intervals.iter().max_by_key(|&&(len, l, _)| (len, std::cmp::Reverse(l))) else {
            return Ok(None);
        };
        let mid = (l + r) / 2;
        for k in [mid, clamp_u64(mid as i64 - 1, l, r), clamp_u64(mid as i64 + 1, l, r)] {
            if let Some(c) = try_insert_chunk(conn, rs, k)? {
                return Ok(Some(c));
            }
        }
        if attempt == 0 {
            claimed = claimed_indices(conn, rs.id)?;
            claimed.sort_unstable();
        }
    }
    pick_random(conn, rs)
}

/// Claims chunks strictly in index order from the range-set's `next_index`
/// cursor. With `rules_enabled`, first asks the digit-rule engine for the
/// smallest valid decimal at or past that cursor and jumps directly to the
/// chunk containing it, skipping chunks that hold no rule-valid candidates.
pub fn pick_sequential(conn: &Connection, rs: &RangeSet, rules_enabled: bool, rules_max_tries: u64) -> Result<Option<Chunk>> {
    if let Some(c) = running_chunk(conn, rs.id)? {
        return Ok(Some(c));
    }

    let n = rs.total_chunks();
    let next_idx = rs.next_index;
    if next_idx >= n {
        return Ok(None);
    }

    if !rules_enabled {
        return pick_sequential_plain(conn, rs, next_idx, n);
    }

    let (start_dec, _) = rs.chunk_bounds(next_idx);
    let search_start = std::cmp::max(start_dec, rs.min_dec.clone());
    let valid = prospector_rules::next_valid_ge(&search_start, &rs.min_dec, &rs.max_dec).unwrap_or(None);

    let Some(v) = valid else {
        return Ok(None);
    };

    let cs = chunk_size_for_bits(rs.chunk_bits);
    let idx_v: u64 = ((&v - &rs.min_dec) / &cs).try_into().unwrap_or(u64::MAX);
    if idx_v >= n {
        return Ok(None);
    }

    if let Some(c) = try_insert_chunk(conn, rs, idx_v)? {
        set_next_index(conn, rs.id, idx_v + 1)?;
        return Ok(Some(c));
    }

    let limit = std::cmp::min(n, idx_v + std::cmp::max(1, rules_max_tries));
    for idx in (idx_v + 1)..limit {
        if let Some(c) = try_insert_chunk(conn, rs, idx)? {
            set_next_index(conn, rs.id, idx + 1)?;
            return Ok(Some(c));
        }
    }

    // Contention is unusually high for the rules-directed jump; fall back to
    // the plain sweep rather than starve forward progress.
    pick_sequential_plain(conn, rs, next_idx, n)
}

fn pick_sequential_plain(conn: &Connection, rs: &RangeSet, next_idx: u64, n: u64) -> Result<Option<Chunk>> {
    if let Some(c) = try_insert_chunk(conn, rs, next_idx)? {
        set_next_index(conn, rs.id, next_idx + 1)?;
        return Ok(Some(c));
    }
    for idx in (next_idx + 1)..std::cmp::min(next_idx + 1024, n) {
        if let Some(c) = try_insert_chunk(conn, rs, idx)? {
            set_next_index(conn, rs.id, idx + 1)?;
            return Ok(Some(c));
        }
    }
    for idx in 0..n {
        if let Some(c) = try_insert_chunk(conn, rs, idx)? {
            return Ok(Some(c));
        }
    }
    Ok(None)
}

/// The three picker policies named on the CLI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Picker {
    /// Uniformly random claim among unclaimed chunks.
    Random,
    /// Strict index order, optionally skipping rule-invalid sub-ranges.
    Sequential,
    /// Midpoint-of-largest-gap claim, maximizing coverage spread.
    Entropy,
}

/// Dispatches to the configured picker policy.
pub fn claim_or_resume_chunk(conn: &Connection, rs: &RangeSet, picker: Picker, seq_rules_enabled: bool, seq_rules_max_tries: u64) -> Result<Option<Chunk>> {
    match picker {
        Picker::Sequential => pick_sequential(conn, rs, seq_rules_enabled, seq_rules_max_tries),
        Picker::Entropy => pick_entropy(conn, rs),
        Picker::Random => pick_random(conn, rs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_cover_full_range_when_nothing_claimed() {
        let spans = build_intervals_from_claimed(10, &[]);
        assert_eq!(spans, vec![(10, 0, 9)]);
    }

    #[test]
    fn intervals_find_middle_gap() {
        let spans = build_intervals_from_claimed(10, &[0, 9]);
        assert_eq!(spans, vec![(8, 1, 8)]);
    }

    #[test]
    fn intervals_handle_fully_claimed() {
        let spans = build_intervals_from_claimed(3, &[0, 1, 2]);
        assert!(spans.is_empty());
    }
}
