//! Logging setup.
//!
//! Core crate records go through `log`; the fmt subscriber picks them up
//! via the `tracing-log` bridge enabled by `tracing-subscriber` defaults.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
///
/// Does nothing if a subscriber is already set, so tests may call it freely.
pub fn init_logging(default_level: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},tower_http=info")));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_target(true))
        .try_init()
        .ok();
}
