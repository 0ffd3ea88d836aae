// [libs/domain/worker/src/process.rs]
//! Spawns the kangaroo binary in its own process group, streams its stdout,
//! keeps tile leases warm, repaints the banner, and escalates signals
//! (INT → TERM → KILL) to bring it down cleanly on request.

use std::io::{BufRead, BufReader};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{Duration, Instant};

use num_bigint::BigUint;
use prospector_ledger::models::RangeSet;
use rusqlite::Connection;

use crate::banner::{print_banner, CursorGuard, LiveStats};
use crate::errors::Result;
use crate::parse::{is_progress_line, parse_progress_line, pow2_to_float, Header};

/// The process group of the currently-running worker, if any — signal
/// handlers installed by the orchestrator binary read this to forward
/// Ctrl-C/SIGTERM to the child rather than just dying themselves.
static ACTIVE_PGID: AtomicI32 = AtomicI32::new(0);

/// Forwards `signal` to the active worker's process group, if one is
/// running. No-op otherwise. Exposed so the orchestrator's top-level signal
/// handler can call it directly.
pub fn forward_signal_to_active_group(signal: i32) {
    let pgid = ACTIVE_PGID.load(Ordering::SeqCst);
    if pgid != 0 {
        unsafe {
            libc::killpg(pgid, signal);
        }
    }
}

/// Parameters for one kangaroo invocation.
pub struct RunRequest<'a> {
    /// Path to the kangaroo binary.
    pub kangaroo_path: &'a str,
    /// Worker thread count (`-t`).
    pub threads: u32,
    /// Inclusive chunk start, decimal.
    pub start_dec: &'a BigUint,
    /// Inclusive chunk end, decimal.
    pub end_dec: &'a BigUint,
    /// Target public key, hex-encoded.
    pub pubkey_hex: &'a str,
    /// Forced distinguished-point bits (`-d`), if the operator pinned one.
    pub dp: Option<u64>,
    /// Forced jump-distance multiplier (`-m`), if the operator pinned one.
    pub m_factor: Option<f64>,
}

/// Outcome of one worker run.
pub struct RunResult {
    /// Terminal status: `"found"`, `"done"`, or `"aborted"`.
    pub status: &'static str,
    /// Recovered private key, hex, if the worker found one.
    pub found_priv_hex: Option<String>,
    /// Average throughput across the run, in mega-keys/second.
    pub avg_mks: f64,
    /// Last reported instantaneous throughput, in mega-keys/second.
    pub now_mks: Option<f64>,
    /// Wall-clock seconds the worker ran.
    pub elapsed_s: i64,
    /// Last reported dead-kangaroo count, if the worker printed one.
    pub dead: Option<i64>,
    /// The worker's startup banner fields (threads, suggested DP, expected
    /// operations, ...), as ingested over the run.
    pub header: Header,
    /// Expected total operations as the worker printed it (e.g. `"2^66"`),
    /// if its header reported one.
    pub expected_ops: Option<String>,
    /// Every line of stdout the worker produced, newline-joined.
    pub raw: String,
}

/// Spawns `req.kangaroo_path`, streams its output, and blocks until it
/// finishes or is killed. Refreshes `chunk_id`'s tile leases on
/// `lease_refresh_s` and repaints the banner on `banner_refresh_s`.
#[allow(clippy::too_many_arguments)]
pub fn run_kangaroo(
    conn: &Connection,
    rs: &RangeSet,
    req: &RunRequest<'_>,
    chunk_id: i64,
    set_idx_text: &str,
    banner_refresh_s: f64,
    lease_refresh_s: u64,
) -> Result<RunResult> {
    let mut cmd = Command::new(req.kangaroo_path);
    cmd.arg("-t").arg(req.threads.to_string());
    cmd.arg("--start-dec").arg(req.start_dec.to_string());
    cmd.arg("--end-dec").arg(req.end_dec.to_string());
    cmd.arg("--pubkey").arg(req.pubkey_hex);
    if let Some(dp) = req.dp {
        cmd.arg("-d").arg(dp.to_string());
    }
    if let Some(m) = req.m_factor {
        cmd.arg("-m").arg(m.to_string());
    }
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::inherit());
    // New process group so INT/TERM/KILL can be forwarded to the whole
    // subtree rather than racing the child's own signal handling.
    cmd.process_group(0);

    let mut child: Child = cmd.spawn().map_err(|source| crate::errors::WorkerError::Spawn {
        path: req.kangaroo_path.to_string(),
        source,
    })?;

    let pgid = child.id() as i32;
    ACTIVE_PGID.store(pgid, Ordering::SeqCst);
    let _cursor = CursorGuard::new();

    let stdout = child.stdout.take().expect("stdout was piped");
    let reader = BufReader::new(stdout);

    let mut header = Header::default();
    let mut now_mks_hist: Vec<f64> = Vec::new();
    let mut now_mks_last: Option<f64> = None;
    let mut dead_last: Option<i64> = None;
    let mut last_count_str: Option<String> = None;
    let mut expected_total_ops: Option<f64> = None;
    let mut found_priv: Option<String> = None;
    let mut raw_lines: Vec<String> = Vec::new();

    let start = Instant::now();
    let mut last_banner = Instant::now() - Duration::from_secs(3600);
    let mut last_lease_refresh = Instant::now();
    let lease_refresh_interval = Duration::from_secs(lease_refresh_s.max(1));
    let banner_refresh_interval = Duration::from_secs_f64(banner_refresh_s.max(0.1));

    for line in reader.lines() {
        let line = line?;
        raw_lines.push(line.clone());
        let s = line.trim();

        if last_lease_refresh.elapsed() >= lease_refresh_interval {
            let _ = prospector_tiles::refresh_leases(conn, chunk_id);
            last_lease_refresh = Instant::now();
        }

        if Header::is_header_line(s) {
            header.ingest(s);
            if expected_total_ops.is_none() {
                if let Some(ops) = header.fields.get("ops") {
                    if let Some(base) = pow2_to_float(ops) {
                        expected_total_ops = Some(base * req.m_factor.unwrap_or(1.0));
                    }
                }
            }
            if last_banner.elapsed() >= Duration::from_millis(100) {
                print_banner(
                    rs,
                    req.start_dec,
                    req.end_dec,
                    &header,
                    &Default::default(),
                    &LiveStats { avg_mks: 0.0, elapsed_s: Some(start.elapsed().as_secs() as i64), eta_s: None },
                    req.pubkey_hex,
                    set_idx_text,
                    req.dp,
                    req.m_factor,
                    None,
                );
                last_banner = Instant::now();
            }
            continue;
        }

        if is_progress_line(s) {
            let prog = parse_progress_line(s);
            if let Some(mks) = prog.now_mks {
                now_mks_hist.push(mks);
                now_mks_last = Some(mks);
            }
            if prog.dead.is_some() {
                dead_last = prog.dead;
            }
            if prog.count.is_some() {
                last_count_str = prog.count.clone();
            }

            if last_banner.elapsed() >= banner_refresh_interval {
                let elapsed_s = start.elapsed().as_secs() as i64;
                let avg_mks = average(&now_mks_hist);
                let eta_s = last_count_str
                    .as_deref()
                    .and_then(pow2_to_float)
                    .zip(expected_total_ops)
                    .filter(|_| avg_mks > 0.0)
                    .map(|(done, total)| ((total - done).max(0.0) / (avg_mks * 1_000_000.0)) as i64);
                print_banner(
                    rs,
                    req.start_dec,
                    req.end_dec,
                    &header,
                    &crate::parse::Progress { now_mks: prog.now_mks, count: prog.count.clone(), dead: dead_last },
                    &LiveStats { avg_mks, elapsed_s: Some(elapsed_s), eta_s },
                    req.pubkey_hex,
                    set_idx_text,
                    req.dp,
                    req.m_factor,
                    None,
                );
                last_banner = Instant::now();
            }
            continue;
        }

        if let Some(tail) = s.split("Priv:").nth(1) {
            let priv_hex = tail.trim().split_whitespace().next().unwrap_or("").to_string();
            if !priv_hex.is_empty() {
                found_priv = Some(priv_hex);
            }
            let elapsed_s = start.elapsed().as_secs() as i64;
            let avg_mks = average(&now_mks_hist);
            print_banner(
                rs,
                req.start_dec,
                req.end_dec,
                &header,
                &Default::default(),
                &LiveStats { avg_mks, elapsed_s: Some(elapsed_s), eta_s: None },
                req.pubkey_hex,
                set_idx_text,
                req.dp,
                req.m_factor,
                found_priv.as_deref(),
            );
            safe_kill_group(&mut child, pgid);
            break;
        }
    }

    let _ = child.wait();
    ACTIVE_PGID.store(0, Ordering::SeqCst);

    let rc = child.try_wait().ok().flatten().and_then(|s| s.code()).unwrap_or(0);
    let status = if found_priv.is_some() {
        "found"
    } else if rc == 0 {
        "done"
    } else {
        "aborted"
    };

    let expected_ops = header.fields.get("ops").cloned();

    Ok(RunResult {
        status,
        found_priv_hex: found_priv,
        avg_mks: average(&now_mks_hist),
        now_mks: now_mks_last,
        elapsed_s: start.elapsed().as_secs() as i64,
        dead: dead_last,
        header,
        expected_ops,
        raw: raw_lines.join("\n"),
    })
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// INT → TERM → KILL escalator against a process group, waiting briefly
/// between each signal for the worker to exit on its own.
fn safe_kill_group(child: &mut Child, pgid: i32) {
    if child.try_wait().ok().flatten().is_some() {
        return;
    }
    unsafe {
        libc::killpg(pgid, libc::SIGINT);
    }
    if wait_for_exit(child, 20) {
        return;
    }
    unsafe {
        libc::killpg(pgid, libc::SIGTERM);
    }
    if wait_for_exit(child, 30) {
        return;
    }
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

fn wait_for_exit(child: &mut Child, attempts: u32) -> bool {
    for _ in 0..attempts {
        if child.try_wait().ok().flatten().is_some() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    child.try_wait().ok().flatten().is_some()
}
