//! Logging setup using tracing
//!
//! Library code only emits events; the binary installs the subscriber once.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Level used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing subscriber
///
/// Events are filtered through `RUST_LOG` (for example `RUST_LOG=debug` or
/// `RUST_LOG=linemail::smtp::session=debug`) and written to stderr, so the
/// client's prompts on stdout stay readable.
///
/// # Errors
/// Returns an error if a global subscriber is already installed
pub fn init() -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true),
        )
        .try_init()
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init();
}
