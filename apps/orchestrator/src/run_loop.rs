// [apps/orchestrator/src/run_loop.rs]
//! The orchestration loop: pick a chunk, claim its tiles, run a kangaroo
//! worker against it, record the outcome, repeat until the range-set is
//! exhausted or the operator asks to stop.

use std::sync::atomic::{AtomicBool, Ordering};

use prospector_core_bigint::prelude::decimal_to_biguint;
use prospector_ledger::chunks::{finish_chunk, map_status_for_schema, mark_started, update_progress};
use prospector_ledger::models::{ChunkStatus, RangeSet};
use prospector_ledger::rangeset::upsert_rangeset;
use prospector_worker::{run_kangaroo, RunRequest};
use rusqlite::Connection;

use crate::cli::Args;

/// Set by the top-level SIGINT/SIGTERM handler; checked once per loop
/// iteration so the orchestrator stops between chunks rather than mid-run.
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Installs SIGINT/SIGTERM handling: forwards the signal to whatever
/// kangaroo subprocess is currently running (so it shuts down cleanly) and
/// marks the loop to stop at its next chunk boundary.
pub fn install_signal_handlers() -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        STOP_REQUESTED.store(true, Ordering::SeqCst);
        prospector_worker::forward_signal_to_active_group(libc::SIGINT);
    })?;
    Ok(())
}

fn stop_requested() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}

/// Derives the range-set to work from CLI args, creating it if this is the
/// first run with these bounds under this name.
pub fn resolve_rangeset(conn: &Connection, args: &Args) -> anyhow::Result<RangeSet> {
    let range_name = match &args.range_name {
        Some(n) => n.clone(),
        None => {
            let (min_dec, max_dec, pubkey) = match (&args.min_dec, &args.max_dec, &args.pubkey) {
                (Some(mn), Some(mx), Some(pk)) => (mn, mx, pk),
                _ => anyhow::bail!("--min-dec, --max-dec and --pubkey are required when --range-name is omitted"),
            };
            prospector_ledger::util::auto_rangeset_name(pubkey, min_dec, max_dec, args.chunk_bits)
        }
    };

    let (min_dec, max_dec) = match (&args.min_dec, &args.max_dec) {
        (Some(mn), Some(mx)) => (mn, mx),
        _ => anyhow::bail!("--min-dec and --max-dec are required"),
    };
    if args.pubkey.is_none() {
        anyhow::bail!("--pubkey is required");
    }

    let min_dec = decimal_to_biguint(min_dec)?;
    let max_dec = decimal_to_biguint(max_dec)?;
    Ok(upsert_rangeset(conn, &range_name, &min_dec, &max_dec, args.chunk_bits, args.force_reinit_range)?)
}

/// Runs the claim -> run -> record loop until the range-set is exhausted,
/// the operator stops it, or `--stop-on-found` fires after a match.
pub fn run(conn: &Connection, args: &Args, rs: &RangeSet) -> anyhow::Result<()> {
    let total_chunks = rs.total_chunks();
    let tile_levels = args.parsed_tile_levels();
    let picker = args.effective_picker();

    loop {
        if stop_requested() {
            println!("\nStop requested. Exiting loop.");
            break;
        }

        let _ = prospector_tiles::reap_expired(conn, args.lease_ttl_s);

        let Some(chunk) = prospector_picker::claim_or_resume_chunk(
            conn,
            rs,
            picker,
            args.sequential_rules,
            args.sequential_rules_max_tries,
        )?
        else {
            println!("\nRange-set exhausted (no chunks left).");
            let total_rows: i64 = conn.query_row("SELECT COUNT(*) FROM chunks WHERE rangeset_id=?1", [rs.id], |r| r.get(0))?;
            let done_rows: i64 = conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE rangeset_id=?1 AND status IN ('done','found')",
                [rs.id],
                |r| r.get(0),
            )?;
            println!("Done: {done_rows}/{total_chunks} (claimed total rows: {total_rows})");
            break;
        };

        let pubkey = args.pubkey.as_deref().expect("resolve_rangeset already validated --pubkey");
        mark_started(
            conn,
            chunk.id,
            pubkey,
            Some(args.threads as i64),
            args.dp.map(|v| v as i64),
            args.max_step,
            args.dp.is_some(),
        )?;

        let claimed = prospector_tiles::claim_for_chunk(
            conn,
            &tile_levels,
            &chunk.start_dec,
            &chunk.end_dec,
            rs.id,
            chunk.id,
            args.lease_ttl_s,
            Some(pubkey),
        );
        let claimed_any = match claimed {
            Ok(n) => n > 0,
            Err(_) => false,
        };
        if !claimed_any {
            conn.execute("DELETE FROM chunks WHERE id=?1", [chunk.id])?;
            continue;
        }

        let set_idx_text = format!("{}/{}", chunk.chunk_index, total_chunks);
        let req = RunRequest {
            kangaroo_path: &args.kangaroo,
            threads: args.threads,
            start_dec: &chunk.start_dec,
            end_dec: &chunk.end_dec,
            pubkey_hex: pubkey,
            dp: args.dp,
            m_factor: args.max_step,
        };

        let result = run_kangaroo(conn, rs, &req, chunk.id, &set_idx_text, args.banner_refresh_s, args.lease_refresh_s)?;

        let planned_stop = args.max_step.is_some();
        let chunk_final = if result.found_priv_hex.is_some() {
            ChunkStatus::Found
        } else if result.status == "done" {
            ChunkStatus::Done
        } else if result.status == "aborted" && planned_stop && !stop_requested() {
            ChunkStatus::Done
        } else {
            ChunkStatus::Aborted
        };

        update_progress(
            conn,
            chunk.id,
            result.now_mks,
            Some(result.avg_mks),
            result.dead,
            result.expected_ops.as_deref(),
            Some(result.raw.as_str()),
        )?;
        finish_chunk(conn, chunk.id, chunk_final)?;
        let mapped = map_status_for_schema(conn, chunk_final)?;

        if matches!(chunk_final, ChunkStatus::Done | ChunkStatus::Found) {
            prospector_tiles::finalize(conn, chunk.id, &mapped)?;
        }

        if stop_requested() {
            println!("\nStop requested. Exiting loop.");
            break;
        }

        if result.found_priv_hex.is_some() && args.stop_on_found {
            println!("Stopping (found).");
            break;
        }

        if args.rest > 0 {
            std::thread::sleep(std::time::Duration::from_millis(args.rest));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use prospector_ledger::chunks::try_insert_chunk;
    use prospector_ledger::open_in_memory;

    fn parse(argv: &[&str]) -> Args {
        let mut full = vec!["orchestrator"];
        full.extend_from_slice(argv);
        Args::parse_from(full)
    }

    #[test]
    fn resolve_rangeset_requires_pubkey() {
        let conn = open_in_memory().unwrap();
        let args = parse(&["--db", "x.sqlite", "--min-dec", "0", "--max-dec", "15", "--range-name", "r1"]);
        let err = resolve_rangeset(&conn, &args).unwrap_err();
        assert!(err.to_string().contains("pubkey"));
    }

    #[test]
    fn resolve_rangeset_derives_name_when_omitted() {
        let conn = open_in_memory().unwrap();
        let args = parse(&["--db", "x.sqlite", "--min-dec", "0", "--max-dec", "15", "--pubkey", "02abc"]);
        let rs = resolve_rangeset(&conn, &args).unwrap();
        assert!(!rs.name.is_empty());
    }

    #[test]
    fn run_stops_cleanly_once_every_chunk_is_terminal() {
        let conn = open_in_memory().unwrap();
        let args = parse(&[
            "--db",
            "x.sqlite",
            "--min-dec",
            "0",
            "--max-dec",
            "15",
            "--chunk-bits",
            "4",
            "--pubkey",
            "02abc",
            "--range-name",
            "r1",
        ]);
        let rs = resolve_rangeset(&conn, &args).unwrap();
        let chunk = try_insert_chunk(&conn, &rs, 0).unwrap().unwrap();
        conn.execute("UPDATE chunks SET status='done' WHERE id=?1", [chunk.id]).unwrap();

        // No unclaimed chunks remain, so the loop exits before ever spawning
        // a worker process.
        run(&conn, &args, &rs).unwrap();
    }
}
