//! Logging bootstrap.
//!
//! Library crates log through the `log` facade. This installs a
//! `tracing-subscriber` formatter that also receives those records through
//! the `tracing-log` bridge.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` filter.
///
/// Returns `true` if this call installed the subscriber. Later calls, or a call
/// made after another subscriber was set by someone else, return `false`.
pub fn init() -> bool {
    let mut installed_now = false;
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
        installed_now = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok();
        installed_now
    });
    installed_now
}

/// Installs a subscriber writing through the test harness capture.
///
/// Safe to call from every test; only the first call does anything.
pub fn init_for_tests() {
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .is_ok()
    });
}
