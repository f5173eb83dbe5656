//! Tracing subscriber setup for the `routine` binary.
//!
//! Composed routines are written to stdout, so every log line goes to
//! stderr. `RUST_LOG` always wins over the level a caller asks for.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    init_with_level("info")
}

/// Install a compact stderr subscriber filtered at `default_level`
/// (e.g. "warn", "routine_core=debug") unless `RUST_LOG` is set.
pub fn init_with_level(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Debug-level logs captured by the test harness; safe to call from many tests.
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
