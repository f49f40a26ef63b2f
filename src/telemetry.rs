//! Log subscriber setup for binaries, demos and tests.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the host's choice. [`init_tracing`] is a convenience for hosts that
//! want plain formatted output filtered by `SIZEWISE_LOG`.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive string.
pub const LOG_ENV: &str = "SIZEWISE_LOG";

/// Subscriber options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level used when `SIZEWISE_LOG` is unset or invalid
    pub default_level: LevelFilter,
    /// ANSI colors in output
    pub ansi: bool,
    /// Include the event target (module path)
    pub with_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: LevelFilter::INFO,
            ansi: true,
            with_target: true,
        }
    }
}

impl TracingConfig {
    /// Builds the filter, preferring `SIZEWISE_LOG` over the default level.
    #[must_use]
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(self.default_level.into())
            .with_env_var(LOG_ENV)
            .from_env_lossy()
    }
}

/// Installs a global formatted subscriber.
///
/// Returns `false` if a global subscriber was already set, which is not an
/// error: tests and embedding hosts often install their own first.
pub fn init_tracing(config: &TracingConfig) -> bool {
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.ansi)
        .with_target(config.with_target);
    tracing_subscriber::registry()
        .with(config.filter())
        .with(layer)
        .try_init()
        .is_ok()
}
