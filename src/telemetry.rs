//! Opt-in tracing setup for hosts embedding `replay-chart`.
//!
//! Every session operation logs through `tracing`; nothing is printed unless
//! the host installs a subscriber, either its own or the one built here.

/// Filter used when `RUST_LOG` is unset: session events at debug, the rest at info.
pub const DEFAULT_TRACING_FILTER: &str = "info,replay_chart=debug";

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_TRACING_FILTER`].
///
/// Returns `false` when the `telemetry` feature is off or a global subscriber
/// is already installed.
#[must_use]
pub fn init_default_tracing() -> bool {
    init_tracing_with_filter(DEFAULT_TRACING_FILTER)
}

/// Same as [`init_default_tracing`] with explicit fallback directives.
#[must_use]
pub fn init_tracing_with_filter(fallback_directives: &str) -> bool {
    #[cfg(feature = "telemetry")]
    {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback_directives));
        return tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init()
            .is_ok();
    }

    #[cfg(not(feature = "telemetry"))]
    {
        let _ = fallback_directives;
        false
    }
}
