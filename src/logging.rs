//! Diagnostic tracing for the binary.
//!
//! Tracing goes to stderr and is separate from the colored task output on
//! stdout. Library code only emits events; installing a subscriber is left to
//! the binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the level is `warn`, or `debug` for
/// this crate when `debug` is true. Calling this twice is a no-op.
pub fn init(debug: bool) {
    let fallback = if debug { "warn,planpatch=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
