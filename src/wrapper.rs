//! Helpers that mark work as busy for exactly as long as it runs.
//!
//! [`BusyGuard`] is the building block: busy on acquire, completed on drop,
//! whichever way the scope exits (including unwinding). [`track`] applies
//! it to a future and [`ExecutorWrapper`] to every job an executor runs.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::executor::{Executor, Job};
use crate::model::{Category, Operation};
use crate::tracker::BusyBee;

/// Keeps an operation outstanding until dropped.
pub struct BusyGuard {
    bee: Arc<dyn BusyBee>,
    operation: Operation,
}

impl BusyGuard {
    /// Mark `operation` busy in `category`.
    pub fn acquire(bee: Arc<dyn BusyBee>, operation: Operation, category: Category) -> Result<Self> {
        bee.busy_with_in(operation.clone(), category)?;
        Ok(Self { bee, operation })
    }

    /// Mark `operation` busy in `category` without blocking the task's
    /// thread while the serializing context catches up.
    pub async fn acquire_async(
        bee: Arc<dyn BusyBee>,
        operation: Operation,
        category: Category,
    ) -> Result<Self> {
        bee.busy_with_in_async(operation.clone(), category).await?;
        Ok(Self { bee, operation })
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.bee.completed(self.operation.clone());
    }
}

/// Run `future` with the tracker busy until it resolves or is dropped.
pub async fn track<F>(bee: Arc<dyn BusyBee>, category: Category, future: F) -> Result<F::Output>
where
    F: Future,
{
    let _guard = BusyGuard::acquire_async(bee, Operation::task(), category).await?;
    Ok(future.await)
}

/// An executor whose jobs keep the tracker busy from submission until they
/// finish running.
pub struct TrackedExecutor {
    bee: Arc<dyn BusyBee>,
    category: Category,
    delegate: Arc<dyn Executor>,
}

impl Executor for TrackedExecutor {
    fn execute(&self, job: Job) {
        let operation = Operation::task();
        debug!(%operation, category = %self.category, "submitting tracked job");

        let guard = match BusyGuard::acquire(Arc::clone(&self.bee), operation, self.category.clone()) {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!(error = %e, "could not mark job busy, running it untracked");
                None
            }
        };
        // A delegate that drops the job also drops the guard.
        self.delegate.execute(Box::new(move || {
            let _guard = guard;
            job();
        }));
    }

    fn is_current(&self) -> bool {
        self.delegate.is_current()
    }
}

/// Builder for [`TrackedExecutor`].
///
/// ```no_run
/// use std::sync::Arc;
/// use busybee::{Category, Executor, ExecutorWrapper, RealBusyBee};
///
/// let bee = Arc::new(RealBusyBee::immediate());
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let executor = ExecutorWrapper::with(bee)
///     .execute_in_category(Category::Network)
///     .wrap_executor(Arc::new(runtime.handle().clone()))
///     .build()
///     .unwrap();
/// executor.execute(Box::new(|| println!("tracked")));
/// ```
pub struct ExecutorWrapper {
    bee: Arc<dyn BusyBee>,
    category: Category,
    delegate: Option<Arc<dyn Executor>>,
}

impl ExecutorWrapper {
    pub fn with(bee: Arc<dyn BusyBee>) -> Self {
        Self {
            bee,
            category: Category::default(),
            delegate: None,
        }
    }

    pub fn execute_in_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn wrap_executor(mut self, delegate: Arc<dyn Executor>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Build the wrapped executor. A no-op tracker gets the original
    /// executor back unchanged.
    pub fn build(self) -> Result<Arc<dyn Executor>> {
        let delegate = self.delegate.ok_or_else(|| {
            Error::InvalidArgument("ExecutorWrapper needs an executor to wrap".to_string())
        })?;
        if !self.bee.is_tracking() {
            return Ok(delegate);
        }
        Ok(Arc::new(TrackedExecutor {
            bee: self.bee,
            category: self.category,
            delegate,
        }))
    }
}
