// [libs/infra/ledger/src/rangeset.rs]
use num_bigint::BigUint;
use prospector_core_bigint::prelude::decimal_to_biguint;
use rusqlite::{Connection, OptionalExtension};

use crate::errors::{LedgerError, Result};
use crate::models::RangeSet;
use crate::util::{cfg_fingerprint, utc_now_iso};

fn row_to_rangeset(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, String, u32, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn parse_rangeset(id: i64, name: String, min_dec: String, max_dec: String, chunk_bits: u32, next_index: String) -> Result<RangeSet> {
    Ok(RangeSet {
        id,
        name,
        min_dec: decimal_to_biguint(&min_dec).map_err(|e| LedgerError::Mapping(e.to_string()))?,
        max_dec: decimal_to_biguint(&max_dec).map_err(|e| LedgerError::Mapping(e.to_string()))?,
        chunk_bits,
        next_index: next_index.parse().unwrap_or(0),
    })
}

/// Creates a new range-set, or returns the existing one if its stored
/// fingerprint already matches `min_dec|max_dec|chunk_bits`.
///
/// When a differently-configured range-set already exists under `name` and
/// owns chunks, this refuses unless `force_reinit` is set, in which case all
/// of its chunks and tiles are purged and it is reconfigured in place.
pub fn upsert_rangeset(
    conn: &Connection,
    name: &str,
    min_dec: &BigUint,
    max_dec: &BigUint,
    chunk_bits: u32,
    force_reinit: bool,
) -> Result<RangeSet> {
    let existing = conn
        .query_row(
            "SELECT id, name, min_dec, max_dec, chunk_bits, next_index, cfg_fingerprint FROM rangesets WHERE name=?1",
            [name],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )
        .optional()?;

    let fp_new = cfg_fingerprint(&min_dec.to_string(), &max_dec.to_string(), chunk_bits);

    let Some((id, name, old_min, old_max, old_bits, next_index, fp_old)) = existing else {
        conn.execute(
            "INSERT INTO rangesets(name,min_dec,max_dec,chunk_bits,next_index,created_ts,cfg_fingerprint) \
             VALUES(?1,?2,?3,?4,'0',?5,?6)",
            rusqlite::params![name, min_dec.to_string(), max_dec.to_string(), chunk_bits, utc_now_iso(), fp_new],
        )?;
        let id = conn.last_insert_rowid();
        return parse_rangeset(id, name.to_string(), min_dec.to_string(), max_dec.to_string(), chunk_bits, "0".into());
    };

    let fp_old = fp_old.unwrap_or_else(|| cfg_fingerprint(&old_min, &old_max, old_bits));
    if fp_old == fp_new {
        return parse_rangeset(id, name, old_min, old_max, old_bits, next_index);
    }

    let chunk_count: i64 = conn.query_row("SELECT COUNT(1) FROM chunks WHERE rangeset_id=?1", [id], |r| r.get(0))?;
    if chunk_count > 0 && !force_reinit {
        return Err(LedgerError::FingerprintConflict(name));
    }
    if chunk_count > 0 && force_reinit {
        conn.execute(
            "DELETE FROM tiles WHERE rangeset_id=?1 OR chunk_id IN (SELECT id FROM chunks WHERE rangeset_id=?1)",
            [id],
        )?;
        conn.execute("DELETE FROM chunks WHERE rangeset_id=?1", [id])?;
        conn.execute("UPDATE rangesets SET next_index='0' WHERE id=?1", [id])?;
    }
    conn.execute(
        "UPDATE rangesets SET min_dec=?1, max_dec=?2, chunk_bits=?3, cfg_fingerprint=?4 WHERE id=?5",
        rusqlite::params![min_dec.to_string(), max_dec.to_string(), chunk_bits, fp_new, id],
    )?;
    parse_rangeset(id, name, min_dec.to_string(), max_dec.to_string(), chunk_bits, "0".into())
}

/// Looks up a range-set by name.
pub fn rangeset_by_name(conn: &Connection, name: &str) -> Result<Option<RangeSet>> {
    let row = conn
        .query_row(
            "SELECT id, name, min_dec, max_dec, chunk_bits, next_index FROM rangesets WHERE name=?1",
            [name],
            row_to_rangeset,
        )
        .optional()?;
    row.map(|(id, name, min_dec, max_dec, chunk_bits, next_index)| parse_rangeset(id, name, min_dec, max_dec, chunk_bits, next_index))
        .transpose()
}

/// Advances the sequential picker's cursor for a range-set.
pub fn set_next_index(conn: &Connection, rangeset_id: i64, next_index: u64) -> Result<()> {
    conn.execute(
        "UPDATE rangesets SET next_index=?1 WHERE id=?2",
        rusqlite::params![next_index.to_string(), rangeset_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_in_memory;

    #[test]
    fn upsert_creates_then_returns_same_for_matching_fingerprint() {
        let conn = open_in_memory().unwrap();
        let a = upsert_rangeset(&conn, "band_x", &BigUint::from(0u32), &BigUint::from(999u32), 4, false).unwrap();
        let b = upsert_rangeset(&conn, "band_x", &BigUint::from(0u32), &BigUint::from(999u32), 4, false).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn upsert_rejects_conflicting_bounds_without_force() {
        let conn = open_in_memory().unwrap();
        let rs = upsert_rangeset(&conn, "band_y", &BigUint::from(0u32), &BigUint::from(999u32), 4, false).unwrap();
        conn.execute(
            "INSERT INTO chunks(rangeset_id,chunk_index,start_dec,end_dec,status,claimed_ts) VALUES(?1,'0','0','15','running','now')",
            [rs.id],
        )
        .unwrap();
        let result = upsert_rangeset(&conn, "band_y", &BigUint::from(0u32), &BigUint::from(2000u32), 4, false);
        assert!(matches!(result, Err(LedgerError::FingerprintConflict(_))));
    }

    #[test]
    fn upsert_force_reinit_purges_chunks() {
        let conn = open_in_memory().unwrap();
        let rs = upsert_rangeset(&conn, "band_z", &BigUint::from(0u32), &BigUint::from(999u32), 4, false).unwrap();
        conn.execute(
            "INSERT INTO chunks(rangeset_id,chunk_index,start_dec,end_dec,status,claimed_ts) VALUES(?1,'0','0','15','running','now')",
            [rs.id],
        )
        .unwrap();
        let rs2 = upsert_rangeset(&conn, "band_z", &BigUint::from(0u32), &BigUint::from(2000u32), 4, true).unwrap();
        assert_eq!(rs.id, rs2.id);
        let count: i64 = conn.query_row("SELECT COUNT(1) FROM chunks WHERE rangeset_id=?1", [rs2.id], |r| r.get(0)).unwrap();
        assert_eq!(count, 0);
    }
}
