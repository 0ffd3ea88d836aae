// [apps/orchestrator/src/telemetry.rs]
//! Tracing setup for the orchestrator binary: compact, colored output on an
//! interactive terminal, flat JSON when `RUST_LOG` or the environment says
//! otherwise isn't enough. A single global panic hook captures anything that
//! tears down a worker-run mid-chunk so it ends up in the same log stream as
//! everything else.

use std::panic;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber for `service`. `verbosity_delta`
/// shifts the default level: positive raises toward `trace` (from `-v`),
/// negative lowers toward `error` (from `-q`). Safe to call exactly once per
/// process; a second call panics, matching `tracing_subscriber`'s own
/// contract.
pub fn init_tracing(service: &str, verbosity_delta: i8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let base = if cfg!(debug_assertions) { 1i8 } else { 0i8 };
        let level = match (base + verbosity_delta).clamp(-2, 2) {
            -2 => "error",
            -1 => "warn",
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        format!("{service}={level}").into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    let service = service.to_string();
    panic::set_hook(Box::new(move |info| {
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line())).unwrap_or_default();
        tracing::error!(service = %service, location = %location, "panic: {info}");
    }));
}
