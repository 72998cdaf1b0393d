pub use tracing::{debug, error, info, instrument, trace, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt::{self, format::FmtSpan}};

/// Installs the global subscriber, filtered by `RUST_LOG` or `info` by default.
///
/// Panics if a global subscriber is already set.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Err(e) = install(env_filter) {
        panic!("failed to install tracing subscriber: {e}");
    }
}

/// Like [`init`] with an explicit filter directive, returning an error instead of panicking.
pub fn try_init_with(filter: &str) -> Result<(), TryInitError> {
    install(EnvFilter::new(filter))
}

fn install(env_filter: EnvFilter) -> Result<(), TryInitError> {
    let is_debug = env_filter.to_string().contains("debug")
        || std::env::var("RUST_LOG").unwrap_or_default().contains("debug");

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_timer(fmt::time::uptime())
        .with_span_events(if is_debug {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_an_error() {
        let _ = try_init_with("debug");
        assert!(try_init_with("info").is_err());
    }
}
