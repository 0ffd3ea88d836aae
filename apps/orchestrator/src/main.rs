// [apps/orchestrator/src/main.rs]
//! Entry point: parse arguments, dispatch to a maintenance one-shot or the
//! summary view, or open the ledger and run the claim/run loop to
//! exhaustion.

use clap::Parser;
use prospector_orchestrator::cli::Args;
use prospector_orchestrator::{maintenance, run_loop, summary, telemetry};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init_tracing("prospector_orchestrator", args.verbosity_delta());

    if args.summary {
        let conn = prospector_ledger::open(&args.db)?;
        summary::show_summary(&conn)?;
        return Ok(());
    }

    if args.backfill_tiles || args.compact_tiles {
        let conn = prospector_ledger::open(&args.db)?;
        let tile_levels = args.parsed_tile_levels();
        if args.backfill_tiles {
            let range_name = if args.all { None } else { args.range_name.as_deref() };
            maintenance::backfill_driver(&conn, range_name, &tile_levels, args.lease_ttl_s)?;
        }
        if args.compact_tiles {
            let merged = maintenance::compact_tiles(&conn, &tile_levels)?;
            println!("\nCompaction: merged {merged} parent groups.");
        }
        return Ok(());
    }

    let conn = prospector_ledger::open(&args.db)?;
    run_loop::install_signal_handlers()?;

    let rs = match run_loop::resolve_rangeset(&conn, &args) {
        Ok(rs) => rs,
        Err(e) => {
            eprintln!("DB error: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run_loop::run(&conn, &args, &rs) {
        eprintln!("Fatal: {e}");
        std::process::exit(2);
    }

    Ok(())
}
