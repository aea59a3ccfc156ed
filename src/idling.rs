//! Bridge between a test harness that waits for idleness and the tracker.
//!
//! A harness either polls [`IdlingResource::is_idle_now`] or registers a
//! transition callback and waits to be pushed. [`wait_for_idle`] does both:
//! it wakes on the push notification and re-checks on every poll tick, so
//! a missed or replaced callback only costs one poll interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::tracker::BusyBee;

/// What a test harness needs to wait for idleness.
pub trait IdlingResource: Send + Sync {
    /// Shown in harness diagnostics when the wait times out.
    fn name(&self) -> String;

    fn is_idle_now(&self) -> bool;

    /// Called on the next transition to idle.
    fn register_idle_transition_callback(&self, callback: Arc<dyn Fn() + Send + Sync>);
}

/// Exposes a [`BusyBee`] as an [`IdlingResource`].
pub struct BusyBeeIdlingResource {
    bee: Arc<dyn BusyBee>,
}

impl BusyBeeIdlingResource {
    pub fn new(bee: Arc<dyn BusyBee>) -> Self {
        Self { bee }
    }
}

impl IdlingResource for BusyBeeIdlingResource {
    fn name(&self) -> String {
        self.bee.name()
    }

    fn is_idle_now(&self) -> bool {
        self.bee.is_not_busy()
    }

    fn register_idle_transition_callback(&self, callback: Arc<dyn Fn() + Send + Sync>) {
        self.bee
            .register_no_longer_busy_callback(Arc::new(move || callback()));
    }
}

/// How long [`wait_for_idle`] waits, and how often it re-checks.
#[derive(Debug, Clone)]
pub struct IdleWaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for IdleWaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Wait until `resource` reports idle.
///
/// # Errors
///
/// [`Error::InvalidArgument`] for a zero timeout or poll interval,
/// [`Error::Timeout`] if the resource is still busy when the timeout ends.
pub async fn wait_for_idle(resource: &dyn IdlingResource, config: &IdleWaitConfig) -> Result<()> {
    if config.timeout.is_zero() || config.poll_interval.is_zero() {
        return Err(Error::InvalidArgument(format!(
            "idle wait needs a non-zero timeout and poll interval, got {config:?}"
        )));
    }

    let notify = Arc::new(Notify::new());
    let waker = Arc::clone(&notify);
    resource.register_idle_transition_callback(Arc::new(move || waker.notify_one()));

    let deadline = tokio::time::Instant::now() + config.timeout;
    loop {
        if resource.is_idle_now() {
            return Ok(());
        }

        tokio::select! {
            _ = notify.notified() => {
                debug!(resource = %resource.name(), "notified of idle transition");
            }
            _ = tokio::time::sleep(config.poll_interval) => {}
            _ = tokio::time::sleep_until(deadline) => {
                if resource.is_idle_now() {
                    return Ok(());
                }
                warn!(resource = %resource.name(), "timed out waiting for idle");
                return Err(Error::Timeout(config.timeout));
            }
        }
    }
}
