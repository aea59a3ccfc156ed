//! Process-wide default tracker.
//!
//! Created lazily on first use and kept for the life of the process. The
//! composition root can [`install`] its own tracker before anything asks
//! for one; otherwise the choice between the real and no-op tracker comes
//! from [`Config::from_env`].

use std::sync::{Arc, OnceLock};

use tracing::{error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::tracker::{BusyBee, NoOpBusyBee, RealBusyBee};

static DEFAULT: OnceLock<Arc<dyn BusyBee>> = OnceLock::new();

/// The process-wide tracker.
pub fn singleton() -> Arc<dyn BusyBee> {
    Arc::clone(DEFAULT.get_or_init(create_from_env))
}

/// Use `bee` as the process-wide tracker.
///
/// # Errors
///
/// Fails if the singleton was already created or installed.
pub fn install(bee: Arc<dyn BusyBee>) -> Result<()> {
    DEFAULT
        .set(bee)
        .map_err(|_| Error::Other("busybee singleton is already initialized".to_string()))
}

/// Real tracker on its own serial queue when enabled, no-op otherwise.
pub fn build_tracker(config: &Config) -> Result<Arc<dyn BusyBee>> {
    if !config.enabled {
        info!("busy tracking disabled, using no-op tracker");
        return Ok(Arc::new(NoOpBusyBee::new()));
    }
    let bee = RealBusyBee::from_config(config)?;
    info!(
        queue = %config.queue_name,
        ignored = ?config.ignored_categories,
        "busy tracking enabled"
    );
    Ok(Arc::new(bee))
}

fn create_from_env() -> Arc<dyn BusyBee> {
    match Config::from_env().and_then(|config| build_tracker(&config)) {
        Ok(bee) => bee,
        Err(e) => {
            error!(error = %e, "could not create busy tracker, falling back to no-op");
            Arc::new(NoOpBusyBee::new())
        }
    }
}
