use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "pricewatch=info";

/// Install the stderr subscriber. `RUST_LOG` overrides the default filter.
pub(crate) fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    // A second init (tests) keeps the first subscriber.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
