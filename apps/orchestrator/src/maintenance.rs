// [apps/orchestrator/src/maintenance.rs]
//! `--backfill-tiles` and `--compact-tiles`: one-shot passes over an
//! existing ledger that don't run any kangaroo workers.

use num_bigint::BigUint;
use prospector_core_bigint::prelude::decimal_to_biguint;
use prospector_ledger::models::RangeSet;
use prospector_ledger::rangeset::rangeset_by_name;
use rusqlite::Connection;

struct DoneChunk {
    id: i64,
    start_dec: BigUint,
    end_dec: BigUint,
    status: String,
    pubkey: Option<String>,
}

fn all_rangesets(conn: &Connection) -> anyhow::Result<Vec<RangeSet>> {
    let mut stmt = conn.prepare("SELECT id, name, min_dec, max_dec, chunk_bits, next_index FROM rangesets")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, u32>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;
    let mut out = Vec::new();
    for r in rows {
        let (id, name, min_dec, max_dec, chunk_bits, next_index) = r?;
        out.push(RangeSet {
            id,
            name,
            min_dec: decimal_to_biguint(&min_dec)?,
            max_dec: decimal_to_biguint(&max_dec)?,
            chunk_bits,
            next_index: next_index.parse().unwrap_or(0),
        });
    }
    Ok(out)
}

fn done_chunks_for(conn: &Connection, rangeset_id: i64) -> anyhow::Result<Vec<DoneChunk>> {
    let mut stmt = conn.prepare(
        "SELECT id, start_dec, end_dec, status, pubkey FROM chunks \
         WHERE rangeset_id=?1 AND status IN ('done','found') ORDER BY claimed_ts ASC",
    )?;
    let rows = stmt.query_map([rangeset_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;
    let mut out = Vec::new();
    for r in rows {
        let (id, start_dec, end_dec, status, pubkey) = r?;
        out.push(DoneChunk {
            id,
            start_dec: decimal_to_biguint(&start_dec)?,
            end_dec: decimal_to_biguint(&end_dec)?,
            status,
            pubkey,
        });
    }
    Ok(out)
}

/// Seals every historical `done`/`found` chunk of the targeted range-set(s)
/// into the tile lattice, for ledgers that predate tile tracking (or had it
/// disabled). `range_name == None` processes every range-set.
pub fn backfill_driver(conn: &Connection, range_name: Option<&str>, tile_levels: &[u32], lease_ttl_s: i64) -> anyhow::Result<()> {
    let targets = match range_name {
        Some(name) => match rangeset_by_name(conn, name)? {
            Some(rs) => vec![rs],
            None => {
                println!("Range-set '{name}' not found.");
                return Ok(());
            }
        },
        None => all_rangesets(conn)?,
    };

    for rs in targets {
        println!("\nBackfilling: {}", rs.name);
        let chunks = done_chunks_for(conn, rs.id)?;
        let mut inserted = 0u64;
        for ch in chunks {
            let final_status = if ch.status == "found" { "found" } else { "done" };
            let ok = prospector_tiles::seal_for_chunk(
                conn,
                tile_levels,
                &ch.start_dec,
                &ch.end_dec,
                final_status,
                rs.id,
                ch.id,
                lease_ttl_s,
                ch.pubkey.as_deref(),
            )?;
            if ok {
                inserted += 1;
            }
        }
        println!("  sealed_chunks={inserted}");
    }
    Ok(())
}

/// Runs `compact` to a fixed point and reports how many parent groups were
/// merged.
pub fn compact_tiles(conn: &Connection, tile_levels: &[u32]) -> anyhow::Result<u64> {
    Ok(prospector_tiles::compact(conn, tile_levels)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_ledger::chunks::try_insert_chunk;
    use prospector_ledger::open_in_memory;
    use prospector_ledger::rangeset::upsert_rangeset;

    #[test]
    fn backfill_on_unknown_rangeset_is_a_no_op() {
        let conn = open_in_memory().unwrap();
        backfill_driver(&conn, Some("nope"), &[52, 48, 44, 40], 900).unwrap();
    }

    #[test]
    fn backfill_seals_done_chunks_into_tiles() {
        let conn = open_in_memory().unwrap();
        let rs = upsert_rangeset(&conn, "r1", &BigUint::from(0u32), &BigUint::from(0xFFFFu32), 4, false).unwrap();
        let chunk = try_insert_chunk(&conn, &rs, 0).unwrap().unwrap();
        conn.execute("UPDATE chunks SET status='done' WHERE id=?1", [chunk.id]).unwrap();

        backfill_driver(&conn, Some("r1"), &[8, 4], 900).unwrap();

        let tile_count: i64 = conn.query_row("SELECT COUNT(*) FROM tiles WHERE rangeset_id=?1", [rs.id], |r| r.get(0)).unwrap();
        assert!(tile_count > 0);
    }

    #[test]
    fn compact_tiles_reports_zero_on_empty_ledger() {
        let conn = open_in_memory().unwrap();
        let merged = compact_tiles(&conn, &[52, 48, 44, 40]).unwrap();
        assert_eq!(merged, 0);
    }
}
