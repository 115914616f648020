//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! The filter comes from `KEVA_LOG` (same syntax as `RUST_LOG`), falling back
//! to the level passed by the caller.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "KEVA_LOG";

/// Installs the global fmt subscriber.
///
/// Returns false if a subscriber was already installed (tests, or a second
/// call), which is not treated as an error.
pub fn init(default_level: Level) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
