// [libs/domain/worker/src/banner.rs]
//! The persistent, in-place progress banner shown while a worker runs, plus
//! the cursor-visibility guard it's always rendered under.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use num_bigint::BigUint;
use prospector_core_bigint::prelude::hex64_upper;
use prospector_ledger::models::RangeSet;

use crate::parse::{Header, Progress};

static CURSOR_HIDDEN: AtomicBool = AtomicBool::new(false);
static BANNER_PAINTED_ONCE: AtomicBool = AtomicBool::new(false);

/// Hides the terminal cursor on construction and restores it on drop, even
/// if the worker run panics or is interrupted partway through — matches the
/// `atexit`-registered cursor restore of the system this banner is modeled
/// on, expressed as RAII instead of a global exit hook.
pub struct CursorGuard;

impl CursorGuard {
    /// Hides the cursor, if not already hidden.
    pub fn new() -> Self {
        if !CURSOR_HIDDEN.swap(true, Ordering::SeqCst) {
            let _ = write!(std::io::stdout(), "\x1b[?25l");
            let _ = std::io::stdout().flush();
        }
        CursorGuard
    }
}

impl Default for CursorGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        if CURSOR_HIDDEN.swap(false, Ordering::SeqCst) {
            let _ = write!(std::io::stdout(), "\x1b[?25h");
            let _ = std::io::stdout().flush();
        }
    }
}

/// Live elapsed/ETA fields layered on top of the worker's own progress
/// report — computed by the caller since only it tracks wall-clock start
/// time and the running average.
#[derive(Debug, Default, Clone)]
pub struct LiveStats {
    /// Rolling average MK/s since this chunk started.
    pub avg_mks: f64,
    /// Seconds elapsed since this chunk's worker was spawned.
    pub elapsed_s: Option<i64>,
    /// Estimated seconds remaining, if enough is known to project one.
    pub eta_s: Option<i64>,
}

fn fmt_secs(total: Option<i64>) -> String {
    match total {
        None => "?".to_string(),
        Some(t) if t < 0 => "?".to_string(),
        Some(t) => {
            let h = t / 3600;
            let m = (t % 3600) / 60;
            let s = t % 60;
            if h > 0 {
                format!("{h:02}:{m:02}:{s:02}")
            } else {
                format!("{m:02}:{s:02}")
            }
        }
    }
}

/// Renders the full-screen progress banner, clearing the screen the first
/// time it's called in this process and repainting in place afterward.
#[allow(clippy::too_many_arguments)]
pub fn print_banner(
    rs: &RangeSet,
    start_dec: &BigUint,
    end_dec: &BigUint,
    header: &Header,
    prog: &Progress,
    live: &LiveStats,
    pubkey_hex: &str,
    set_idx_text: &str,
    dp_forced: Option<u64>,
    m_factor: Option<f64>,
    found_priv_hex: Option<&str>,
) {
    let start_hex = hex64_upper(start_dec);
    let end_hex = hex64_upper(end_dec);

    let suggested_dp = header.fields.get("suggested_dp").map(String::as_str).unwrap_or("?");
    let dp_line = match dp_forced {
        Some(dp) => format!("DP: running={dp}  suggested={suggested_dp}"),
        None => format!("DP: running=auto  suggested={suggested_dp}"),
    };

    let mut lines: Vec<String> = Vec::new();
    if let Some(found) = found_priv_hex {
        lines.push(format!("\x1b[1;32m{}", "=".repeat(72)));
        lines.push(format!("FOUND PRIVATE KEY: {found}"));
        lines.push(format!("{}\x1b[0m", "=".repeat(72)));
    }

    lines.push(format!("PubKey: {pubkey_hex}"));
    lines.push(format!("set={}  idx={}", rs.name, set_idx_text));
    lines.push(format!("Threads: {}", header.fields.get("threads").map(String::as_str).unwrap_or("?")));
    lines.push(format!("Set Min (DEC): {}", rs.min_dec));
    lines.push(format!("Set Max (DEC): {}", rs.max_dec));
    lines.push(format!("Chunk Bits: {}", rs.chunk_bits));
    lines.push(format!("Chunk Start (DEC): {start_dec}"));
    lines.push(format!("Chunk End   (DEC): {end_dec}"));
    lines.push(format!("Chunk Start (HEX): 0x{start_hex}"));
    lines.push(format!("Chunk End   (HEX): 0x{end_hex}"));
    lines.push(dp_line);
    if let Some(dp_size) = header.fields.get("dp_size") {
        lines.push(format!("DP size: {dp_size}"));
    }
    if let Some(m) = m_factor {
        lines.push(format!("MaxStep (m): {m}"));
    }
    if let Some(ops) = header.fields.get("ops") {
        lines.push(format!("Expected ops: {ops}"));
    }
    if let Some(ram) = header.fields.get("ram") {
        lines.push(format!("Expected RAM: {ram}"));
    }

    if prog.count.is_some() || prog.dead.is_some() {
        let count = prog.count.clone().unwrap_or_else(|| "?".to_string());
        let dead = prog.dead.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string());
        lines.push(format!("Progress: {count}  Dead: {dead}"));
    }
    if prog.now_mks.is_some() {
        lines.push(format!("Speed: {:.2} MK/s (Avg {:.2} MK/s)", prog.now_mks.unwrap_or(0.0), live.avg_mks));
    }
    if let Some(elapsed) = live.elapsed_s {
        if live.eta_s.is_some() {
            lines.push(format!("Time: {}  ETA≈ {}", fmt_secs(Some(elapsed)), fmt_secs(live.eta_s)));
        } else {
            lines.push(format!("Time: {}", fmt_secs(Some(elapsed))));
        }
    }

    let mut out = std::io::stdout();
    if !BANNER_PAINTED_ONCE.swap(true, Ordering::SeqCst) {
        let _ = write!(out, "\x1b[2J\x1b[H");
    } else {
        let _ = write!(out, "\x1b[H\x1b[J");
    }
    let _ = writeln!(out, "{}", lines.join("\n"));
    let _ = out.flush();
}
