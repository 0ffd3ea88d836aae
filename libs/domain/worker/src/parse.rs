// [libs/domain/worker/src/parse.rs]
//! Line-oriented parsing of a kangaroo worker's stdout: the one-shot header
//! block and the repeating `[...]` progress lines.

use std::collections::HashMap;

/// Fields pulled from the worker's startup banner (thread count, suggested
/// DP, expected operation count, etc).
#[derive(Debug, Default, Clone)]
pub struct Header {
    /// Raw key/value pairs as parsed — callers look up what they need by
    /// name rather than this crate committing to a fixed struct shape,
    /// since the worker's own header format is someone else's contract.
    pub fields: HashMap<String, String>,
}

impl Header {
    /// Appends `line` to the header, if it matches a recognized field
    /// prefix, and returns whether anything changed.
    pub fn ingest(&mut self, line: &str) -> bool {
        let line = line.trim();
        let pairs: &[(&str, &str)] = &[
            ("Number of CPU thread:", "threads"),
            ("Suggested DP:", "suggested_dp"),
            ("Expected operations:", "ops"),
            ("Range width:", "width"),
            ("Expected RAM:", "ram"),
            ("DP size:", "dp_size"),
        ];
        for (prefix, key) in pairs {
            if let Some(rest) = line.strip_prefix(prefix) {
                self.fields.insert((*key).to_string(), rest.trim().to_string());
                return true;
            }
        }
        false
    }

    /// Whether `line` is recognized as part of the startup banner at all
    /// (including fields this struct doesn't retain, like "Kangaroo v...").
    pub fn is_header_line(line: &str) -> bool {
        const PREFIXES: &[&str] = &[
            "Kangaroo v",
            "Start:",
            "Stop :",
            "Keys :",
            "Number of CPU thread:",
            "Range width:",
            "Jump Avg distance:",
            "Number of kangaroos:",
            "Suggested DP:",
            "Expected operations:",
            "Expected RAM:",
            "DP size:",
        ];
        PREFIXES.iter().any(|p| line.starts_with(p))
    }
}

/// Parsed fields from one `[Count ...][Dead ...][... MK/s]`-style progress
/// line.
#[derive(Debug, Default, Clone)]
pub struct Progress {
    /// Instantaneous mega-keys/second, if present.
    pub now_mks: Option<f64>,
    /// `Count` field, as printed (often itself a `2^n`-style expression).
    pub count: Option<String>,
    /// `Dead` kangaroo count.
    pub dead: Option<i64>,
}

/// Parses one progress line of the form
/// `[Count 2^34.1][Dead 3][123.4 MK/s][...]`.
pub fn parse_progress_line(line: &str) -> Progress {
    let mut out = Progress::default();
    for part in line.trim().split(']') {
        let p = part.trim_matches(|c| c == '[' || c == ' ');
        if p.is_empty() {
            continue;
        }
        if p.ends_with("MK/s") && !p.contains("GPU") {
            if let Some(num) = p.split_whitespace().next() {
                out.now_mks = num.parse().ok();
            }
        } else if let Some(rest) = p.strip_prefix("Count ") {
            out.count = Some(rest.trim().to_string());
        } else if let Some(rest) = p.strip_prefix("Dead ") {
            out.dead = rest.split_whitespace().next().and_then(|s| s.parse().ok());
        }
    }
    out
}

/// Interprets a `"2^n"` or plain-float expression as a linear value —
/// kangaroo reports expected-operation counts and progress counts this way.
pub fn pow2_to_float(expr: &str) -> Option<f64> {
    let t = expr.trim();
    if t.is_empty() {
        return None;
    }
    let exponent: f64 = t.strip_prefix("2^").unwrap_or(t).parse().ok()?;
    Some(2.0f64.powf(exponent))
}

/// Whether `line` is a `[... MK/s ...]`-shaped progress line.
pub fn is_progress_line(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('[') && t.contains("MK/s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_ingests_known_fields() {
        let mut h = Header::default();
        assert!(h.ingest("Number of CPU thread: 8"));
        assert_eq!(h.fields.get("threads").map(String::as_str), Some("8"));
    }

    #[test]
    fn progress_line_parses_mks_dead_and_count() {
        let p = parse_progress_line("[Count 2^34.2][Dead 3][512.50 MK/s][00:01:02 (Avg 500.00 MK/s)]");
        assert_eq!(p.now_mks, Some(512.50));
        assert_eq!(p.dead, Some(3));
        assert_eq!(p.count.as_deref(), Some("2^34.2"));
    }

    #[test]
    fn pow2_parses_exponent_form() {
        assert_eq!(pow2_to_float("2^4"), Some(16.0));
        assert_eq!(pow2_to_float("3"), Some(8.0));
        assert_eq!(pow2_to_float(""), None);
    }

    #[test]
    fn is_progress_line_requires_mks_marker() {
        assert!(is_progress_line("[Count 5][10.0 MK/s]"));
        assert!(!is_progress_line("Number of CPU thread: 8"));
    }
}
