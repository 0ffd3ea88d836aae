// [apps/orchestrator/src/summary.rs]
//! `--summary`: a read-only rollup of every range-set's chunk counts.

use rusqlite::Connection;

struct Row {
    name: String,
    chunk_bits: u32,
    total: i64,
    done: i64,
    found: i64,
    running: i64,
    since: Option<String>,
}

/// Prints one line per range-set with its chunk totals, or a short notice if
/// the ledger has none yet.
pub fn show_summary(conn: &Connection) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "SELECT rs.name, rs.chunk_bits, COUNT(c.id) AS total, \
                SUM(CASE WHEN c.status='done'    THEN 1 ELSE 0 END) AS done, \
                SUM(CASE WHEN c.status='found'   THEN 1 ELSE 0 END) AS found, \
                SUM(CASE WHEN c.status='running' THEN 1 ELSE 0 END) AS running, \
                MIN(c.claimed_ts) AS since \
           FROM rangesets rs \
      LEFT JOIN chunks c ON c.rangeset_id = rs.id \
          GROUP BY rs.id \
          ORDER BY rs.name",
    )?;
    let rows: Vec<Row> = stmt
        .query_map([], |row| {
            Ok(Row {
                name: row.get(0)?,
                chunk_bits: row.get(1)?,
                total: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                done: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                found: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                running: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                since: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    if rows.is_empty() {
        println!("No rangesets yet.");
        return Ok(());
    }

    println!("\n=== Summary ===");
    for r in rows {
        let dstr = if r.total > 0 { format!("{}+{}/{}", r.done, r.found, r.total) } else { "0/0".to_string() };
        let since = r.since.as_deref().unwrap_or("N/A");
        println!(
            "{:<12} bits={:<2}  chunks={:<12}  running={:<4}  since={}",
            r.name, r.chunk_bits, dstr, r.running, since
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use prospector_ledger::chunks::try_insert_chunk;
    use prospector_ledger::open_in_memory;
    use prospector_ledger::rangeset::upsert_rangeset;

    #[test]
    fn runs_clean_against_an_empty_ledger() {
        let conn = open_in_memory().unwrap();
        show_summary(&conn).unwrap();
    }

    #[test]
    fn rolls_up_chunk_counts_per_rangeset() {
        let conn = open_in_memory().unwrap();
        let rs = upsert_rangeset(&conn, "r1", &BigUint::from(0u32), &BigUint::from(999u32), 4, false).unwrap();
        try_insert_chunk(&conn, &rs, 0).unwrap();
        try_insert_chunk(&conn, &rs, 1).unwrap();
        show_summary(&conn).unwrap();
    }
}
