// [libs/domain/tiles/src/lib.rs]
/*!
 * Hierarchical power-of-two tile lattice layered over the ledger's `tiles`
 * table. A tile is a `2^level`-wide slice of the address space, claimed
 * with a lease so a crashed worker's coverage can be reclaimed once its
 * lease expires rather than waiting for the owning chunk to finish.
 *
 * This crate knows nothing about subprocess lifecycles or chunk picking —
 * it only ever walks the canonical tiling of a chunk's `[start_dec, end_dec]`
 * span and the lease bookkeeping on top of it.
 */
#![deny(missing_docs)]

pub mod address;
/// Error types returned by tile operations.
pub mod errors;
pub mod manager;

pub use errors::{Result, TileError};
pub use manager::{claim_for_chunk, compact, finalize, reap_expired, refresh_leases, seal_for_chunk};

/// Tile levels used when the operator doesn't override `--tile-levels`.
pub const DEFAULT_TILE_LEVELS: &[u32] = &[52, 48, 44, 40];

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use prospector_ledger::open_in_memory;

    fn seed_chunk(conn: &rusqlite::Connection) -> (i64, i64) {
        conn.execute(
            "INSERT INTO rangesets(name,min_dec,max_dec,chunk_bits,next_index,created_ts) VALUES('r','0','281474976710655',48,'0','now')",
            [],
        )
        .unwrap();
        let rangeset_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO chunks(rangeset_id,chunk_index,start_dec,end_dec,status,claimed_ts,pubkey) \
             VALUES(?1,'0','0','281474976710655','running','now','02abc')",
            [rangeset_id],
        )
        .unwrap();
        let chunk_id = conn.last_insert_rowid();
        (rangeset_id, chunk_id)
    }

    #[test]
    fn claim_for_chunk_covers_aligned_span() {
        let conn = open_in_memory().unwrap();
        let (rangeset_id, chunk_id) = seed_chunk(&conn);
        let claimed = claim_for_chunk(
            &conn,
            &[40],
            &BigUint::from(0u32),
            &BigUint::parse_bytes(b"281474976710655", 10).unwrap(),
            rangeset_id,
            chunk_id,
            900,
            Some("02abc"),
        )
        .unwrap();
        assert_eq!(claimed, 1);
    }

    #[test]
    fn finalize_then_seal_produces_terminal_tiles() {
        let conn = open_in_memory().unwrap();
        let (rangeset_id, chunk_id) = seed_chunk(&conn);
        let end = BigUint::parse_bytes(b"281474976710655", 10).unwrap();
        claim_for_chunk(&conn, &[40], &BigUint::from(0u32), &end, rangeset_id, chunk_id, 900, Some("02abc")).unwrap();
        finalize(&conn, chunk_id, "done").unwrap();
        let status: String = conn
            .query_row("SELECT status FROM tiles WHERE chunk_id=?1 LIMIT 1", [chunk_id], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "done");
    }

    #[test]
    fn reap_expired_frees_stale_running_tiles() {
        let conn = open_in_memory().unwrap();
        let (rangeset_id, chunk_id) = seed_chunk(&conn);
        conn.execute(
            "INSERT INTO tiles(pubkey,level,start_hex,status,lease_ts,rangeset_id,chunk_id) \
             VALUES('02abc',40,'0000000000000000000000000000000000000000000000000000000000000',\
             'running','2000-01-01T00:00:00Z',?1,?2)",
            rusqlite::params![rangeset_id, chunk_id],
        )
        .unwrap();
        let reaped = reap_expired(&conn, 900).unwrap();
        assert_eq!(reaped, 1);
    }
}
