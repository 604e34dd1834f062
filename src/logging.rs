//! Structured JSON logging setup, shared by every binary in this crate.

/// Environment variable consulted for the log filter directive (e.g. `sstv_ext=debug,warn`).
const LOG_ENV_VAR: &str = "SDREXT_LOG";

/// Fallback filter applied when `LOG_ENV_VAR` is unset: this crate's own spans at `info`,
/// everything else (axum, tower, tokio) at `warn`, so a default run surfaces session lifecycle
/// and decode events without the framework's own chatter.
const DEFAULT_FILTER: &str = "warn,sstv_ext=info";

#[cfg(feature = "logging")]
pub fn init() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = std::env::var(LOG_ENV_VAR)
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true),
        )
        .try_init();
}

/// No-op when the `logging` feature is disabled, so callers never need to special-case it.
#[cfg(not(feature = "logging"))]
pub fn init() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }

    #[test]
    fn default_filter_mentions_the_crate_target() {
        assert!(DEFAULT_FILTER.contains("sstv_ext"));
    }
}
