//! Tracker that tracks nothing.

use std::sync::Arc;

use super::{BusyBee, NoLongerBusyCallback, OperationMatcher};
use crate::error::Result;
use crate::model::{Category, Operation};

/// Used when tracking is disabled: every mutation is a no-op and the
/// tracker always reports idle.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpBusyBee;

impl NoOpBusyBee {
    pub fn new() -> Self {
        Self
    }
}

impl BusyBee for NoOpBusyBee {
    fn name(&self) -> String {
        "NO-OP BusyBee".to_string()
    }

    fn busy_with_in(&self, _operation: Operation, _category: Category) -> Result<()> {
        Ok(())
    }

    fn completed(&self, _operation: Operation) {}

    fn completed_everything_in_category(&self, _category: Category) {}

    fn completed_everything(&self) {}

    fn completed_everything_matching(&self, _matcher: OperationMatcher) -> Result<usize> {
        Ok(0)
    }

    fn ignore_category(&self, _category: Category) {}

    fn pay_attention_to_category(&self, _category: Category) {}

    fn register_no_longer_busy_callback(&self, _callback: Arc<dyn NoLongerBusyCallback>) {}

    fn is_busy(&self) -> bool {
        false
    }

    fn to_string_verbose(&self) -> String {
        "NO-OP BusyBee".to_string()
    }

    fn is_tracking(&self) -> bool {
        false
    }
}
