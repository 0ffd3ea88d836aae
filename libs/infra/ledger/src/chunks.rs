// [libs/infra/ledger/src/chunks.rs]
use prospector_core_bigint::prelude::decimal_to_biguint;
use rusqlite::{Connection, OptionalExtension};

use crate::errors::{LedgerError, Result};
use crate::models::{Chunk, ChunkStatus, RangeSet};
use crate::schema::allowed_chunk_statuses;
use crate::util::utc_now_iso;

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let start_dec: String = row.get("start_dec")?;
    let end_dec: String = row.get("end_dec")?;
    let chunk_index: String = row.get("chunk_index")?;
    Ok(Chunk {
        id: row.get("id")?,
        rangeset_id: row.get("rangeset_id")?,
        chunk_index: chunk_index.parse().unwrap_or(0),
        start_dec: decimal_to_biguint(&start_dec).unwrap_or_default(),
        end_dec: decimal_to_biguint(&end_dec).unwrap_or_default(),
        status: row.get("status")?,
        claimed_ts: row.get("claimed_ts")?,
        pubkey: row.get("pubkey")?,
    })
}

/// Attempts to claim chunk `idx` of `rs` by inserting a `running` row.
/// Returns `None` on a unique-constraint collision — another process already
/// claimed it — rather than treating that as an error.
pub fn try_insert_chunk(conn: &Connection, rs: &RangeSet, idx: u64) -> Result<Option<Chunk>> {
    let (start, end) = rs.chunk_bounds(idx);
    let outcome = conn.execute(
        "INSERT INTO chunks(rangeset_id,chunk_index,start_dec,end_dec,status,claimed_ts,band_min_dec,band_max_dec) \
         VALUES(?1,?2,?3,?4,'running',?5,?6,?7)",
        rusqlite::params![
            rs.id,
            idx.to_string(),
            start.to_string(),
            end.to_string(),
            utc_now_iso(),
            rs.min_dec.to_string(),
            rs.max_dec.to_string(),
        ],
    );
    match outcome {
        Ok(_) => {
            let chunk = conn.query_row(
                "SELECT * FROM chunks WHERE rangeset_id=?1 AND chunk_index=?2",
                rusqlite::params![rs.id, idx.to_string()],
                row_to_chunk,
            )?;
            Ok(Some(chunk))
        }
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// The single chunk currently `running` for a range-set, if any — used by
/// every picker to resume in-flight work before claiming something new.
pub fn running_chunk(conn: &Connection, rangeset_id: i64) -> Result<Option<Chunk>> {
    conn.query_row(
        "SELECT * FROM chunks WHERE rangeset_id=?1 AND status='running' ORDER BY claimed_ts ASC LIMIT 1",
        [rangeset_id],
        row_to_chunk,
    )
    .optional()
    .map_err(Into::into)
}

/// All claimed chunk indices for a range-set, used by the entropy picker to
/// find the largest unclaimed gap.
pub fn claimed_indices(conn: &Connection, rangeset_id: i64) -> Result<Vec<u64>> {
    let mut stmt = conn.prepare("SELECT chunk_index FROM chunks WHERE rangeset_id=?1")?;
    let rows = stmt.query_map([rangeset_id], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?.parse().unwrap_or(0));
    }
    Ok(out)
}

/// Maps `status` onto a value admitted by the live `chunks.status` CHECK
/// constraint. `aborted` degrades to `error` when the schema doesn't carry
/// `aborted` but does carry `error`; any other miss is a hard error — a
/// deployed schema with none of the expected vocabulary is a migration bug,
/// not something the orchestrator should paper over by guessing.
pub fn map_status_for_schema(conn: &Connection, status: ChunkStatus) -> Result<String> {
    let allowed = allowed_chunk_statuses(conn)?;
    let wanted = status.as_str();
    if allowed.contains(wanted) {
        return Ok(wanted.to_string());
    }
    if wanted == "aborted" && allowed.contains("error") {
        tracing::warn!(
            wanted,
            mapped = "error",
            "chunk status has no direct schema mapping, degrading to 'error'"
        );
        return Ok("error".to_string());
    }
    tracing::error!(
        wanted,
        admitted = ?allowed,
        "chunk status has no admitted mapping in the live schema — refusing to guess"
    );
    Err(LedgerError::UnmappableStatus(wanted.to_string()))
}

/// Marks a chunk finished with the given status, mapped through the live
/// schema constraint.
pub fn finish_chunk(conn: &Connection, chunk_id: i64, status: ChunkStatus) -> Result<()> {
    let mapped = map_status_for_schema(conn, status)?;
    conn.execute(
        "UPDATE chunks SET status=?1, finished_ts=?2 WHERE id=?3",
        rusqlite::params![mapped, utc_now_iso(), chunk_id],
    )?;
    Ok(())
}

/// Records that a worker has started on a chunk, stamping `started_ts`, the
/// public key and thread count it was launched with, and any forced DP/max-
/// step values the operator pinned.
#[allow(clippy::too_many_arguments)]
pub fn mark_started(
    conn: &Connection,
    chunk_id: i64,
    pubkey: &str,
    nthreads: Option<i64>,
    dp: Option<i64>,
    m_factor: Option<f64>,
    dp_forced: bool,
) -> Result<()> {
    conn.execute(
        "UPDATE chunks SET started_ts=?1, pubkey=?2, nthreads=?3, dp=?4, m_factor=?5, dp_forced=?6 \
         WHERE id=?7 AND started_ts IS NULL",
        rusqlite::params![utc_now_iso(), pubkey, nthreads, dp, m_factor, dp_forced as i64, chunk_id],
    )?;
    Ok(())
}

/// Updates the terminal progress fields reported by a worker's stdout:
/// most recent and average throughput, dead-kangaroo count, the expected
/// operation count its header advertised, and its captured raw output.
pub fn update_progress(
    conn: &Connection,
    chunk_id: i64,
    mk_s_now: Option<f64>,
    mk_s_avg: Option<f64>,
    dead: Option<i64>,
    expected_ops: Option<&str>,
    output: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE chunks SET mk_s_now=?1, mk_s_avg=?2, dead=?3, expected_ops=?4, output=?5 WHERE id=?6",
        rusqlite::params![mk_s_now, mk_s_avg, dead, expected_ops, output, chunk_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_in_memory;
    use crate::rangeset::upsert_rangeset;
    use num_bigint::BigUint;

    #[test]
    fn try_insert_chunk_then_collision_returns_none() {
        let conn = open_in_memory().unwrap();
        let rs = upsert_rangeset(&conn, "r", &BigUint::from(0u32), &BigUint::from(999u32), 4, false).unwrap();
        let first = try_insert_chunk(&conn, &rs, 0).unwrap();
        assert!(first.is_some());
        let second = try_insert_chunk(&conn, &rs, 0).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn status_mapping_uses_schema_vocabulary() {
        let conn = open_in_memory().unwrap();
        let mapped = map_status_for_schema(&conn, ChunkStatus::Aborted).unwrap();
        assert_eq!(mapped, "aborted");
    }
}
