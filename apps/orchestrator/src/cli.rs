// [apps/orchestrator/src/cli.rs]
//! Command-line surface, matched flag-for-flag against the tool this
//! orchestrator descends from: same names, same defaults, same deprecated
//! `--sequential` alias.

use clap::{Parser, ValueEnum};

/// Chunk-selection strategy named on `--picker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PickerArg {
    /// Uniformly random claim among unclaimed chunks.
    Random,
    /// Strict index order, optionally rules-directed.
    Sequential,
    /// Midpoint-of-largest-unclaimed-gap claim.
    Entropy,
}

impl From<PickerArg> for prospector_picker::Picker {
    fn from(p: PickerArg) -> Self {
        match p {
            PickerArg::Random => prospector_picker::Picker::Random,
            PickerArg::Sequential => prospector_picker::Picker::Sequential,
            PickerArg::Entropy => prospector_picker::Picker::Entropy,
        }
    }
}

/// Kangaroo CPU orchestrator (global tiles, no overlaps).
#[derive(Debug, Parser)]
#[command(name = "orchestrator", about = "Kangaroo CPU orchestrator (global tiles, no overlaps).")]
pub struct Args {
    /// SQLite database path.
    #[arg(long)]
    pub db: String,

    /// Logical set name (e.g., B27).
    #[arg(long = "range-name")]
    pub range_name: Option<String>,

    /// Minimum decimal (inclusive).
    #[arg(long = "min-dec")]
    pub min_dec: Option<String>,

    /// Maximum decimal (inclusive).
    #[arg(long = "max-dec")]
    pub max_dec: Option<String>,

    /// Chunk width in bits.
    #[arg(long = "chunk-bits", default_value_t = 48)]
    pub chunk_bits: u32,

    /// Purge an existing range-set's chunks and tiles when its stored
    /// bounds/width don't match these flags, instead of refusing to start.
    #[arg(long = "force-reinit-range")]
    pub force_reinit_range: bool,

    /// Target compressed pubkey hex (66 hex chars).
    #[arg(long)]
    pub pubkey: Option<String>,

    /// Kangaroo CPU threads (-t).
    #[arg(long, default_value_t = 8)]
    pub threads: u32,

    /// Pass -d to kangaroo (optional).
    #[arg(long)]
    pub dp: Option<u64>,

    /// Pass -m to kangaroo (optional, multiplier on expected ops).
    #[arg(long = "max-step")]
    pub max_step: Option<f64>,

    /// Rest between chunks in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub rest: u64,

    /// Exit when rangeset is exhausted (default behavior regardless).
    #[arg(long)]
    pub stop: bool,

    /// Exit immediately after first match.
    #[arg(long = "stop-on-found")]
    pub stop_on_found: bool,

    /// Path to kangaroo binary. Falls back to `KANGAROO_BIN` in the
    /// environment when the flag is omitted.
    #[arg(long, env = "KANGAROO_BIN", default_value = "./kangaroo")]
    pub kangaroo: String,

    /// Print summary and exit.
    #[arg(long)]
    pub summary: bool,

    /// Chunk selection strategy.
    #[arg(long, value_enum, default_value_t = PickerArg::Random)]
    pub picker: PickerArg,

    /// (Deprecated) same as --picker sequential.
    #[arg(long)]
    pub sequential: bool,

    /// Enable rules-based validate-and-jump for the sequential picker.
    #[arg(long = "sequential-rules")]
    pub sequential_rules: bool,

    /// Max additional forward claim attempts after the jump target.
    #[arg(long = "sequential-rules-max-tries", default_value_t = 1024)]
    pub sequential_rules_max_tries: u64,

    /// Comma-separated tile levels L (multiples of 4). Tile size=2^L.
    #[arg(long = "tile-levels", default_value = "52,48,44,40")]
    pub tile_levels: String,

    /// Lease TTL in seconds for running tiles.
    #[arg(long = "lease-ttl-s", default_value_t = 900)]
    pub lease_ttl_s: i64,

    /// How often to refresh tile leases while running.
    #[arg(long = "lease-refresh-s", default_value_t = 60)]
    pub lease_refresh_s: u64,

    /// Seconds between banner refreshes (persistent, in-place).
    #[arg(long = "banner-refresh-s", default_value_t = 2.0)]
    pub banner_refresh_s: f64,

    /// Seal historical done/found chunks into tiles and exit.
    #[arg(long = "backfill-tiles")]
    pub backfill_tiles: bool,

    /// Coalesce fully covered fine tiles into coarser parents and exit.
    #[arg(long = "compact-tiles")]
    pub compact_tiles: bool,

    /// With --backfill-tiles/--compact-tiles, process all rangesets.
    #[arg(long)]
    pub all: bool,

    /// Raise log verbosity (stackable: -v, -vv).
    #[arg(short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Lower log verbosity (stackable: -q, -qq).
    #[arg(short, action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Args {
    /// Net verbosity after applying `-v`/`-q`, clamped to the `tracing`
    /// level range: negative lowers toward `error`, positive raises toward
    /// `trace`, relative to the binary's default level.
    pub fn verbosity_delta(&self) -> i8 {
        self.verbose as i8 - self.quiet as i8
    }

    /// Parses `--tile-levels` into its numeric levels, ignoring blank
    /// entries the way the comma-split source tolerates a trailing comma.
    pub fn parsed_tile_levels(&self) -> Vec<u32> {
        self.tile_levels
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect()
    }

    /// Resolves the effective picker, honoring the deprecated `--sequential`
    /// alias.
    pub fn effective_picker(&self) -> prospector_picker::Picker {
        if self.sequential {
            prospector_picker::Picker::Sequential
        } else {
            self.picker.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        let mut full = vec!["orchestrator"];
        full.extend_from_slice(argv);
        Args::parse_from(full)
    }

    #[test]
    fn defaults_match_reference_tool() {
        let args = parse(&["--db", "x.sqlite"]);
        assert_eq!(args.chunk_bits, 48);
        assert_eq!(args.threads, 8);
        assert_eq!(args.rest, 0);
        assert_eq!(args.kangaroo, "./kangaroo");
        assert_eq!(args.picker, PickerArg::Random);
        assert_eq!(args.sequential_rules_max_tries, 1024);
        assert_eq!(args.tile_levels, "52,48,44,40");
        assert_eq!(args.lease_ttl_s, 900);
        assert_eq!(args.lease_refresh_s, 60);
        assert_eq!(args.banner_refresh_s, 2.0);
    }

    #[test]
    fn tile_levels_parse_ignores_blank_entries() {
        let args = parse(&["--db", "x.sqlite", "--tile-levels", "52,48,,44,"]);
        assert_eq!(args.parsed_tile_levels(), vec![52, 48, 44]);
    }

    #[test]
    fn deprecated_sequential_flag_overrides_picker() {
        let args = parse(&["--db", "x.sqlite", "--picker", "entropy", "--sequential"]);
        assert_eq!(args.effective_picker(), prospector_picker::Picker::Sequential);
    }

    #[test]
    fn picker_flag_is_honored_without_deprecated_alias() {
        let args = parse(&["--db", "x.sqlite", "--picker", "entropy"]);
        assert_eq!(args.effective_picker(), prospector_picker::Picker::Entropy);
    }

    #[test]
    fn verbosity_nets_stacked_flags_against_each_other() {
        let args = parse(&["--db", "x.sqlite", "-v", "-v", "-q"]);
        assert_eq!(args.verbosity_delta(), 1);
    }
}
