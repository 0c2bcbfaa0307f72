//! Tracing subscriber setup for binaries and tests embedding podlite.

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber.
///
/// Respects `RUST_LOG`; falls back to `default_level` when unset or invalid.
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one is left in place.
pub fn init_logging(default_level: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let _ = init_logging("debug");
        // A subscriber is installed now, so a second call must not replace it
        assert!(!init_logging("trace"));
        tracing::debug!(component = "logging", "subscriber installed");
    }
}
