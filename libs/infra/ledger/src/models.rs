// [libs/infra/ledger/src/models.rs]
use num_bigint::BigUint;

/// A named, bounded search space: `[min_dec, max_dec]` sliced into
/// `2^chunk_bits`-wide chunks.
#[derive(Debug, Clone)]
pub struct RangeSet {
    /// Row id.
    pub id: i64,
    /// Unique operator-facing name.
    pub name: String,
    /// Inclusive lower bound.
    pub min_dec: BigUint,
    /// Inclusive upper bound.
    pub max_dec: BigUint,
    /// `log2` of the chunk width.
    pub chunk_bits: u32,
    /// Next untried chunk index for the sequential picker.
    pub next_index: u64,
}

impl RangeSet {
    /// Number of `2^chunk_bits`-wide chunks spanning `[min_dec, max_dec]`.
    pub fn total_chunks(&self) -> u64 {
        total_chunks(&self.min_dec, &self.max_dec, self.chunk_bits)
    }

    /// Inclusive `[start, end]` decimal bounds of chunk `idx`.
    pub fn chunk_bounds(&self, idx: u64) -> (BigUint, BigUint) {
        chunk_bounds(&self.min_dec, &self.max_dec, self.chunk_bits, idx)
    }
}

/// `2^bits`, the width of a single chunk.
pub fn chunk_size_for_bits(bits: u32) -> BigUint {
    BigUint::from(1u32) << bits
}

/// Count of integers in `[min_dec, max_dec]`.
pub fn span_count(min_dec: &BigUint, max_dec: &BigUint) -> BigUint {
    max_dec - min_dec + BigUint::from(1u32)
}

/// Number of chunks needed to cover `[min_dec, max_dec]` at `chunk_bits`.
pub fn total_chunks(min_dec: &BigUint, max_dec: &BigUint, chunk_bits: u32) -> u64 {
    let cs = chunk_size_for_bits(chunk_bits);
    let span = span_count(min_dec, max_dec);
    let n = (&span + &cs - BigUint::from(1u32)) / &cs;
    n.try_into().expect("chunk count exceeds u64 — chunk_bits too small for this range")
}

/// Inclusive `[start, end]` decimal bounds of chunk `idx` within
/// `[min_dec, max_dec]` at `chunk_bits`.
pub fn chunk_bounds(min_dec: &BigUint, max_dec: &BigUint, chunk_bits: u32, idx: u64) -> (BigUint, BigUint) {
    let cs = chunk_size_for_bits(chunk_bits);
    let start = min_dec + &cs * BigUint::from(idx);
    let past_end = max_dec + BigUint::from(1u32);
    let candidate_end = &start + &cs;
    let end = std::cmp::min(candidate_end, past_end) - BigUint::from(1u32);
    (start, end)
}

/// Clamp `v` into `[lo, hi]`.
pub fn clamp_u64(v: i64, lo: u64, hi: u64) -> u64 {
    v.max(lo as i64).min(hi as i64) as u64
}

/// Lifecycle status of a claimed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Claimed, no worker has reported progress yet.
    Queued,
    /// A worker subprocess is actively searching this chunk.
    Running,
    /// Exhausted without finding the target.
    Done,
    /// The worker reported a solution.
    Found,
    /// The orchestrator killed the worker or it exited abnormally.
    Aborted,
    /// Claimed but no lease activity for longer than the staleness window.
    Stalled,
}

impl ChunkStatus {
    /// Canonical lowercase name, as stored in the `status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkStatus::Queued => "queued",
            ChunkStatus::Running => "running",
            ChunkStatus::Done => "done",
            ChunkStatus::Found => "found",
            ChunkStatus::Aborted => "aborted",
            ChunkStatus::Stalled => "stalled",
        }
    }
}

/// A claimed slice of a [`RangeSet`].
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Row id.
    pub id: i64,
    /// Owning range-set id.
    pub rangeset_id: i64,
    /// Index within the range-set's chunk sequence.
    pub chunk_index: u64,
    /// Inclusive start of this chunk's decimal span.
    pub start_dec: BigUint,
    /// Inclusive end of this chunk's decimal span.
    pub end_dec: BigUint,
    /// Current lifecycle status, as stored (post status-mapping).
    pub status: String,
    /// When this chunk row was claimed.
    pub claimed_ts: String,
    /// Public key the worker is searching against, once known.
    pub pubkey: Option<String>,
}
