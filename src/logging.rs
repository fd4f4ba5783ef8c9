use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber: human-readable lines on stderr, filtered
/// by `RUST_LOG` when set and by `default_filter` otherwise.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .try_init();
}
