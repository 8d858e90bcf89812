//! Structured logging setup

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "identity_service=info,jwt_security=info,info";

/// Install the JSON `tracing` subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .json()
        .try_init();
}
