//! # busybee
//!
//! Tracks whether an application has outstanding asynchronous work, so UI
//! tests can wait for it to go idle before asserting on its state.
//!
//! Callers mark operations busy and completed, optionally tagged with a
//! [`Category`]. The tracker reports busy while any operation in a category
//! it pays attention to is outstanding, and calls back on every transition
//! to idle.

pub mod config;
pub mod error;
pub mod executor;
pub mod idling;
pub mod model;
pub mod operations;
pub mod singleton;
pub mod telemetry;
pub mod tracker;
pub mod wrapper;

pub use error::{Error, Result};
pub use executor::{Executor, Immediate, Job, SerialQueue};
pub use idling::{BusyBeeIdlingResource, IdleWaitConfig, IdlingResource, wait_for_idle};
pub use model::{Category, Operation};
pub use operations::OperationSet;
pub use singleton::singleton;
pub use tracker::{BusyBee, NoLongerBusyCallback, NoOpBusyBee, OperationMatcher, Pending, RealBusyBee};
pub use wrapper::{BusyGuard, ExecutorWrapper, TrackedExecutor, track};
