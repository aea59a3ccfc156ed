//! Logging initialization.
//!
//! Sets up a tracing-subscriber registry with an env filter and a fmt
//! layer. `RUST_LOG` wins over the configured level when set.

pub mod tracker;

use crate::error::{Error, Result};

/// Configuration for telemetry initialization.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is not set (e.g. "info", "busybee=debug").
    pub log_level: String,
    /// Single-line output instead of the full fmt layout.
    pub compact: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            compact: true,
        }
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the filter does not parse or a global subscriber
/// was already set (e.g. by another test in this process).
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            Error::Config(format!("bad log level {:?}: {e}", config.log_level))
        })?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if config.compact {
        registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    installed.map_err(|e| Error::Other(format!("failed to init tracing subscriber: {e}")))
}
