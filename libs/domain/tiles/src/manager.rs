// [libs/domain/tiles/src/manager.rs]
//! Recursive canonical tiling over a chunk's decimal span, and the
//! lease-lifecycle operations (reap/refresh/finalize/compact) that keep the
//! lattice consistent across crash-restarted workers.

use chrono::{Duration, Utc};
use num_bigint::BigUint;
use prospector_core_bigint::prelude::{align_down, hex64_upper};
use rusqlite::{Connection, OptionalExtension};

use crate::address::{child_glob, normalize_levels, parent_hex};
use crate::errors::Result;

fn utc_now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.fZ").to_string()
}

fn cutoff_iso(lease_ttl_s: i64) -> String {
    (Utc::now() - Duration::seconds(lease_ttl_s)).format("%Y-%m-%dT%H:%M:%S%.fZ").to_string()
}

/// Deletes `running` tiles whose lease has not been refreshed within
/// `lease_ttl_s`, freeing them for re-claim. Returns the number reaped.
pub fn reap_expired(conn: &Connection, lease_ttl_s: i64) -> Result<usize> {
    let cutoff = cutoff_iso(lease_ttl_s);
    let n = conn.execute("DELETE FROM tiles WHERE status='running' AND lease_ts < ?1", [cutoff])?;
    Ok(n)
}

/// Refreshes the lease timestamp of every `running` tile owned by `chunk_id`
/// — called on the same cadence as the worker's heartbeat so a live worker's
/// tiles never go stale mid-search.
pub fn refresh_leases(conn: &Connection, chunk_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE tiles SET lease_ts=?1 WHERE chunk_id=?2 AND status='running'",
        rusqlite::params![utc_now_iso(), chunk_id],
    )?;
    Ok(())
}

/// Transitions every `running` tile owned by `chunk_id` to `done` or `found`
/// once its worker exits with a terminal status. A no-op for any other
/// status — an aborted or stalled chunk's tiles stay `running` so the next
/// worker picks up exactly where this one left off (after lease expiry).
pub fn finalize(conn: &Connection, chunk_id: i64, new_status: &str) -> Result<()> {
    if new_status != "done" && new_status != "found" {
        return Ok(());
    }
    conn.execute(
        "UPDATE tiles SET status=?1, lease_ts=?2 WHERE chunk_id=?3",
        rusqlite::params![new_status, utc_now_iso(), chunk_id],
    )?;
    Ok(())
}

struct TileRow {
    status: String,
    lease_ts: String,
}

fn tile_row(conn: &Connection, level: u32, start_hex: &str, pubkey: Option<&str>) -> Result<Option<TileRow>> {
    conn.query_row(
        "SELECT status, lease_ts FROM tiles WHERE pubkey IS ?1 AND level=?2 AND start_hex=?3 LIMIT 1",
        rusqlite::params![pubkey, level, start_hex],
        |row| Ok(TileRow { status: row.get(0)?, lease_ts: row.get(1)? }),
    )
    .optional()
    .map_err(Into::into)
}

fn lease_is_fresh(lease_ts: &str, cutoff: &str) -> bool {
    lease_ts >= cutoff
}

/// Status of the nearest active ancestor tile of `level`/`start_hex` across
/// `levels`, or `None` if no ancestor currently claims this region.
fn ancestor_active_status(
    conn: &Connection,
    levels: &[u32],
    level: u32,
    start_hex: &str,
    lease_ttl_s: i64,
    pubkey: Option<&str>,
) -> Result<Option<String>> {
    let cutoff = cutoff_iso(lease_ttl_s);
    for &l in levels {
        if l <= level {
            continue;
        }
        let anc_hex = parent_hex(start_hex, l);
        let Some(row) = tile_row(conn, l, &anc_hex, pubkey)? else { continue };
        if row.status == "done" || row.status == "found" {
            return Ok(Some(row.status));
        }
        if row.status == "running" && lease_is_fresh(&row.lease_ts, &cutoff) {
            return Ok(Some("running".to_string()));
        }
    }
    Ok(None)
}

/// Status of an immediate child tile of `level`/`start_hex` belonging to the
/// same pubkey, ignoring children whose `running` lease has expired.
fn any_child_exists(conn: &Connection, level: u32, start_hex: &str, lease_ttl_s: i64, pubkey: Option<&str>) -> Result<Option<String>> {
    if level < 4 {
        return Ok(None);
    }
    let child_level = level - 4;
    let pattern = child_glob(level, start_hex);
    let cutoff = cutoff_iso(lease_ttl_s);
    let row = conn
        .query_row(
            "SELECT status, lease_ts FROM tiles WHERE pubkey IS ?1 AND level=?2 AND start_hex GLOB ?3 LIMIT 1",
            rusqlite::params![pubkey, child_level, pattern],
            |row| Ok(TileRow { status: row.get(0)?, lease_ts: row.get(1)? }),
        )
        .optional()?;
    let Some(row) = row else { return Ok(None) };
    if row.status == "running" && !lease_is_fresh(&row.lease_ts, &cutoff) {
        return Ok(None);
    }
    Ok(Some(row.status))
}

enum ClaimOutcome {
    Inserted,
    Stolen,
    Busy,
    Covered,
}

fn insert_running_tile(
    conn: &Connection,
    level: u32,
    start_hex: &str,
    rangeset_id: i64,
    chunk_id: i64,
    lease_ttl_s: i64,
    pubkey: Option<&str>,
) -> Result<ClaimOutcome> {
    let outcome = conn.execute(
        "INSERT INTO tiles(pubkey,level,start_hex,status,lease_ts,rangeset_id,chunk_id) VALUES(?1,?2,?3,'running',?4,?5,?6)",
        rusqlite::params![pubkey, level, start_hex, utc_now_iso(), rangeset_id, chunk_id],
    );
    match outcome {
        Ok(_) => Ok(ClaimOutcome::Inserted),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            let Some(row) = tile_row(conn, level, start_hex, pubkey)? else {
                return Ok(ClaimOutcome::Busy);
            };
            if row.status == "done" || row.status == "found" {
                return Ok(ClaimOutcome::Covered);
            }
            let cutoff = cutoff_iso(lease_ttl_s);
            if lease_is_fresh(&row.lease_ts, &cutoff) {
                return Ok(ClaimOutcome::Busy);
            }
            conn.execute(
                "UPDATE tiles SET status='running', lease_ts=?1, rangeset_id=?2, chunk_id=?3 \
                 WHERE pubkey IS ?4 AND level=?5 AND start_hex=?6",
                rusqlite::params![utc_now_iso(), rangeset_id, chunk_id, pubkey, level, start_hex],
            )?;
            Ok(ClaimOutcome::Stolen)
        }
        Err(e) => Err(e.into()),
    }
}

enum SealOutcome {
    Inserted,
    Covered,
    Race,
    ConflictRunning,
}

fn insert_tile_status(
    conn: &Connection,
    level: u32,
    start_hex: &str,
    status: &str,
    rangeset_id: Option<i64>,
    chunk_id: Option<i64>,
    pubkey: Option<&str>,
) -> Result<SealOutcome> {
    let outcome = conn.execute(
        "INSERT INTO tiles(pubkey,level,start_hex,status,lease_ts,rangeset_id,chunk_id) VALUES(?1,?2,?3,?4,?5,?6,?7)",
        rusqlite::params![pubkey, level, start_hex, status, utc_now_iso(), rangeset_id, chunk_id],
    );
    match outcome {
        Ok(_) => Ok(SealOutcome::Inserted),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            let Some(row) = tile_row(conn, level, start_hex, pubkey)? else {
                return Ok(SealOutcome::Race);
            };
            if row.status == "done" || row.status == "found" {
                Ok(SealOutcome::Covered)
            } else {
                Ok(SealOutcome::ConflictRunning)
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Claims the canonical tiling of `[start_dec, end_dec]` for a running chunk:
/// walks `levels` coarsest-first, aligning to each level's boundary and
/// recursing into the unaligned head/tail remainder and into any region
/// already contested by a fresher or permanent tile. Returns the count of
/// tiles newly claimed.
pub fn claim_for_chunk(
    conn: &Connection,
    levels: &[u32],
    start_dec: &BigUint,
    end_dec: &BigUint,
    rangeset_id: i64,
    chunk_id: i64,
    lease_ttl_s: i64,
    pubkey: Option<&str>,
) -> Result<u64> {
    let levels = normalize_levels(levels)?;
    conn.execute_batch("BEGIN IMMEDIATE;")?;
    let result = claim_recursive(conn, 0, &levels, start_dec, end_dec, rangeset_id, chunk_id, lease_ttl_s, pubkey);
    match result {
        Ok(n) => {
            conn.execute_batch("COMMIT;")?;
            Ok(n)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn claim_recursive(
    conn: &Connection,
    level_idx: usize,
    levels: &[u32],
    start_dec: &BigUint,
    end_dec: &BigUint,
    rangeset_id: i64,
    chunk_id: i64,
    lease_ttl_s: i64,
    pubkey: Option<&str>,
) -> Result<u64> {
    let Some(&level) = levels.get(level_idx) else { return Ok(0) };
    let size = BigUint::from(1u32) << level;
    let mut claimed = 0u64;
    let mut cur = start_dec.clone();

    let head_align = {
        let rem = &cur % &size;
        if rem == BigUint::from(0u32) { cur.clone() } else { &cur - &rem + &size }
    };
    if &cur < &head_align && &cur <= end_dec {
        let head_end = std::cmp::min(end_dec.clone(), &head_align - BigUint::from(1u32));
        claimed += claim_recursive(conn, level_idx + 1, levels, &cur, &head_end, rangeset_id, chunk_id, lease_ttl_s, pubkey)?;
        cur = head_align;
    }

    while &cur + &size - BigUint::from(1u32) <= *end_dec {
        let t_start = cur.clone();
        let t_hex = hex64_upper(&align_down(&t_start, level));
        let t_end = &t_start + &size - BigUint::from(1u32);

        if let Some(anc) = ancestor_active_status(conn, levels, level, &t_hex, lease_ttl_s, pubkey)? {
            if anc == "done" || anc == "found" {
                cur += &size;
                continue;
            }
            claimed += claim_recursive(conn, level_idx + 1, levels, &t_start, &t_end, rangeset_id, chunk_id, lease_ttl_s, pubkey)?;
            cur += &size;
            continue;
        }

        if any_child_exists(conn, level, &t_hex, lease_ttl_s, pubkey)?.is_some() {
            claimed += claim_recursive(conn, level_idx + 1, levels, &t_start, &t_end, rangeset_id, chunk_id, lease_ttl_s, pubkey)?;
            cur += &size;
            continue;
        }

        match insert_running_tile(conn, level, &t_hex, rangeset_id, chunk_id, lease_ttl_s, pubkey)? {
            ClaimOutcome::Inserted | ClaimOutcome::Stolen => {
                claimed += 1;
                cur += &size;
            }
            ClaimOutcome::Busy | ClaimOutcome::Covered => {
                claimed += claim_recursive(conn, level_idx + 1, levels, &t_start, &t_end, rangeset_id, chunk_id, lease_ttl_s, pubkey)?;
                cur += &size;
            }
        }
    }

    if &cur <= end_dec {
        claimed += claim_recursive(conn, level_idx + 1, levels, &cur, end_dec, rangeset_id, chunk_id, lease_ttl_s, pubkey)?;
    }
    Ok(claimed)
}

/// Seals the canonical tiling of a finished chunk's span to `done`/`found`,
/// for the backfill path: unlike [`claim_for_chunk`] this writes terminal
/// rows directly rather than claiming leases, and aborts (returning `false`)
/// on the first tile it cannot place.
pub fn seal_for_chunk(
    conn: &Connection,
    levels: &[u32],
    start_dec: &BigUint,
    end_dec: &BigUint,
    final_status: &str,
    rangeset_id: i64,
    chunk_id: i64,
    lease_ttl_s: i64,
    pubkey: Option<&str>,
) -> Result<bool> {
    let levels = normalize_levels(levels)?;
    conn.execute_batch("BEGIN IMMEDIATE;")?;
    let result = seal_recursive(conn, 0, &levels, start_dec, end_dec, final_status, rangeset_id, chunk_id, lease_ttl_s, pubkey);
    match result {
        Ok(ok) => {
            conn.execute_batch("COMMIT;")?;
            Ok(ok)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK;");
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn seal_recursive(
    conn: &Connection,
    level_idx: usize,
    levels: &[u32],
    start_dec: &BigUint,
    end_dec: &BigUint,
    final_status: &str,
    rangeset_id: i64,
    chunk_id: i64,
    lease_ttl_s: i64,
    pubkey: Option<&str>,
) -> Result<bool> {
    let Some(&level) = levels.get(level_idx) else { return Ok(true) };
    let size = BigUint::from(1u32) << level;
    let mut cur = start_dec.clone();

    let head_align = {
        let rem = &cur % &size;
        if rem == BigUint::from(0u32) { cur.clone() } else { &cur - &rem + &size }
    };
    if &cur < &head_align && &cur <= end_dec {
        let head_end = std::cmp::min(end_dec.clone(), &head_align - BigUint::from(1u32));
        if !seal_recursive(conn, level_idx + 1, levels, &cur, &head_end, final_status, rangeset_id, chunk_id, lease_ttl_s, pubkey)? {
            return Ok(false);
        }
        cur = head_align;
    }

    while &cur + &size - BigUint::from(1u32) <= *end_dec {
        let t_start = cur.clone();
        let t_hex = hex64_upper(&align_down(&t_start, level));
        let t_end = &t_start + &size - BigUint::from(1u32);

        if let Some(anc) = ancestor_active_status(conn, levels, level, &t_hex, lease_ttl_s, pubkey)? {
            if anc == "done" || anc == "found" {
                cur += &size;
                continue;
            }
            if !seal_recursive(conn, level_idx + 1, levels, &t_start, &t_end, final_status, rangeset_id, chunk_id, lease_ttl_s, pubkey)? {
                return Ok(false);
            }
            cur += &size;
            continue;
        }

        if any_child_exists(conn, level, &t_hex, lease_ttl_s, pubkey)?.is_some() {
            if !seal_recursive(conn, level_idx + 1, levels, &t_start, &t_end, final_status, rangeset_id, chunk_id, lease_ttl_s, pubkey)? {
                return Ok(false);
            }
            cur += &size;
            continue;
        }

        match insert_tile_status(conn, level, &t_hex, final_status, Some(rangeset_id), Some(chunk_id), pubkey)? {
            SealOutcome::Inserted | SealOutcome::Covered => {
                cur += &size;
            }
            SealOutcome::ConflictRunning => {
                if !seal_recursive(conn, level_idx + 1, levels, &t_start, &t_end, final_status, rangeset_id, chunk_id, lease_ttl_s, pubkey)? {
                    return Ok(false);
                }
                cur += &size;
            }
            SealOutcome::Race => return Ok(false),
        }
    }

    if &cur <= end_dec {
        return seal_recursive(conn, level_idx + 1, levels, &cur, end_dec, final_status, rangeset_id, chunk_id, lease_ttl_s, pubkey);
    }
    Ok(true)
}

/// Merges groups of 16 sibling child tiles (all `done`/`found`, same
/// pubkey) into a single parent tile one level coarser, deleting the
/// children. Runs one `parent_level` to a fixed point before moving on.
/// Returns the total number of merges performed across all levels.
pub fn compact(conn: &Connection, levels: &[u32]) -> Result<u64> {
    let mut levels: Vec<u32> = levels.to_vec();
    levels.sort_unstable();
    levels.dedup();
    let mut total = 0u64;
    for &parent_level in levels.iter().rev() {
        loop {
            let changed = compact_once(conn, parent_level)?;
            total += changed;
            if changed == 0 {
                break;
            }
        }
    }
    Ok(total)
}

fn compact_once(conn: &Connection, parent_level: u32) -> Result<u64> {
    if parent_level < 4 {
        return Ok(0);
    }
    let child_level = parent_level - 4;
    let parent_pref_len = (64 - parent_level / 4) as i64;
    let zeros_tail = "0".repeat((parent_level / 4) as usize);

    struct Candidate {
        pubkey: Option<String>,
        head: String,
        found_cnt: i64,
    }

    let mut stmt = conn.prepare(
        "SELECT pubkey, substr(start_hex,1,?1) AS head, COUNT(*) AS cnt, \
                SUM(CASE WHEN status IN ('done','found') THEN 1 ELSE 0 END) AS good, \
                SUM(CASE WHEN status='found' THEN 1 ELSE 0 END) AS found_cnt \
         FROM tiles WHERE level=?2 \
         GROUP BY pubkey, substr(start_hex,1,?1) \
         HAVING cnt=16 AND good=16",
    )?;
    let candidates: Vec<Candidate> = stmt
        .query_map(rusqlite::params![parent_pref_len, child_level], |row| {
            Ok(Candidate {
                pubkey: row.get(0)?,
                head: row.get(1)?,
                found_cnt: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            })
        })?
        .collect::<rusqlite::Result<_>>()?;
    drop(stmt);

    let mut merged = 0u64;
    for c in candidates {
        let parent_hex_addr = format!("{}{}", c.head, zeros_tail);
        let existing = tile_row(conn, parent_level, &parent_hex_addr, c.pubkey.as_deref())?;
        if let Some(row) = &existing {
            if row.status == "running" {
                continue;
            }
        } else {
            let status = if c.found_cnt > 0 { "found" } else { "done" };
            let outcome = conn.execute(
                "INSERT INTO tiles(pubkey,level,start_hex,status,lease_ts,rangeset_id,chunk_id) VALUES(?1,?2,?3,?4,?5,NULL,NULL)",
                rusqlite::params![c.pubkey, parent_level, parent_hex_addr, status, utc_now_iso()],
            );
            if let Err(rusqlite::Error::SqliteFailure(e, _)) = &outcome {
                if e.code == rusqlite::ErrorCode::ConstraintViolation {
                    let again = tile_row(conn, parent_level, &parent_hex_addr, c.pubkey.as_deref())?;
                    match again {
                        None => continue,
                        Some(row) if row.status == "running" => continue,
                        Some(_) => {}
                    }
                } else {
                    return Err(outcome.unwrap_err().into());
                }
            } else {
                outcome?;
            }
        }
        conn.execute(
            "DELETE FROM tiles WHERE pubkey IS ?1 AND level=?2 AND substr(start_hex,1,?3)=?4",
            rusqlite::params![c.pubkey, child_level, parent_pref_len, c.head],
        )?;
        merged += 1;
    }

    Ok(merged)
}
