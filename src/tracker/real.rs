//! The tracking implementation.
//!
//! Every mutation runs on one serializing [`Executor`] and applies under the
//! state lock, then republishes the busy flag. The flag is the only thing
//! read without the lock. A busy-to-idle edge hands the registered callback
//! to the same job after the lock is released, so the callback can call
//! back into the tracker.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::{Span, debug, error, info};
use uuid::Uuid;

use super::{BusyBee, NoLongerBusyCallback, OperationMatcher, Pending};
use crate::config::Config;
use crate::error::{Error, Result, panic_message};
use crate::executor::{Executor, Immediate, SerialQueue};
use crate::model::{Category, Operation};
use crate::operations::OperationSet;
use crate::telemetry::tracker::{record_transition, start_tracker_span};

/// Tracks outstanding operations per category.
pub struct RealBusyBee {
    shared: Arc<Shared>,
    executor: Arc<dyn Executor>,
}

struct Shared {
    id: String,
    state: Mutex<TrackerState>,
    /// Published after every mutation; read without the lock.
    busy: AtomicBool,
    span: Span,
}

#[derive(Default)]
struct TrackerState {
    operations: OperationSet<Category, Operation>,
    ignored: HashSet<Category>,
    callback: Option<Arc<dyn NoLongerBusyCallback>>,
}

impl TrackerState {
    /// Busy iff some category that is not ignored has an operation.
    fn is_busy(&self) -> bool {
        self.operations
            .categories()
            .any(|category| !self.ignored.contains(category) && !self.operations.is_empty_in(category))
    }
}

impl RealBusyBee {
    /// Create a tracker whose mutations run on `executor`.
    ///
    /// `executor` must run jobs one at a time in submission order.
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self::with_ignored(executor, [])
    }

    /// Create a tracker that starts out ignoring `ignored`.
    pub fn with_ignored(
        executor: Arc<dyn Executor>,
        ignored: impl IntoIterator<Item = Category>,
    ) -> Self {
        let id = Uuid::new_v4().to_string()[..8].to_string();
        let span = start_tracker_span(&id);
        let state = TrackerState {
            ignored: ignored.into_iter().collect(),
            ..TrackerState::default()
        };
        Self {
            shared: Arc::new(Shared {
                id,
                state: Mutex::new(state),
                busy: AtomicBool::new(false),
                span,
            }),
            executor,
        }
    }

    /// Tracker that applies every mutation on the calling thread.
    pub fn immediate() -> Self {
        Self::new(Arc::new(Immediate))
    }

    /// Tracker backed by its own [`SerialQueue`], set up from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let queue = SerialQueue::spawn(config.queue_name.clone())?;
        Ok(Self::with_ignored(
            Arc::new(queue),
            config.ignored_categories.iter().cloned(),
        ))
    }

    /// Queue a mutation without waiting for it.
    fn submit<F>(&self, mutation: F)
    where
        F: FnOnce(&Shared) + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        self.executor.execute(Box::new(move || mutation(&shared)));
    }

    /// Queue a mutation and wait for its result. Runs inline when already
    /// on the serializing context.
    fn join<T, F>(&self, mutation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Shared) -> T + Send + 'static,
    {
        if self.executor.is_current() {
            return Ok(mutation(&self.shared));
        }
        let (tx, rx) = sync_channel(1);
        let shared = Arc::clone(&self.shared);
        self.executor.execute(Box::new(move || {
            let _ = tx.send(mutation(&shared));
        }));
        rx.recv().map_err(|_| Error::ContextStopped)
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // State is only changed through OperationSet calls that keep both
        // indices in step, so a poisoned lock still guards consistent data.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `mutation`, republish the busy flag and fire the callback on a
    /// busy-to-idle edge.
    fn apply<T>(&self, mutation: impl FnOnce(&mut TrackerState) -> T) -> T {
        let (result, fire) = {
            let mut state = self.lock();
            let result = mutation(&mut state);

            let now_busy = state.is_busy();
            let was_busy = self.busy.swap(now_busy, Ordering::SeqCst);
            let fire = match (was_busy, now_busy) {
                (false, true) => {
                    record_transition(&self.span, "idle", "busy");
                    None
                }
                (true, false) => {
                    record_transition(&self.span, "busy", "idle");
                    state.callback.clone()
                }
                _ => None,
            };
            (result, fire)
        };

        if let Some(callback) = fire {
            self.notify(callback.as_ref());
        }
        result
    }

    fn register(&self, operation: Operation, category: Category) -> Result<()> {
        self.apply(|state| {
            let added = state.operations.add(category.clone(), operation.clone())?;
            if added {
                info!(tracker = %self.id, %operation, %category, "busy with operation");
            } else {
                debug!(tracker = %self.id, %operation, %category, "operation already active");
            }
            Ok(())
        })
    }

    fn notify(&self, callback: &dyn NoLongerBusyCallback) {
        info!(tracker = %self.id, "all operations are now finished, we are now idle");
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback.no_longer_busy())) {
            let err = Error::Callback(panic_message(payload.as_ref()));
            error!(tracker = %self.id, error = %err, "no-longer-busy callback panicked");
        }
    }

    fn log_completed(&self, removed: &[Operation]) {
        for operation in removed {
            info!(tracker = %self.id, %operation, "completed, removed from active operations");
        }
    }
}

impl BusyBee for RealBusyBee {
    fn name(&self) -> String {
        let state = self.shared.lock();
        format!(
            "RealBusyBee@{} with operations: {}",
            self.shared.id, state.operations
        )
    }

    fn busy_with_in(&self, operation: Operation, category: Category) -> Result<()> {
        self.join(move |shared| shared.register(operation, category))?
    }

    fn busy_with_in_async(&self, operation: Operation, category: Category) -> Pending<()> {
        if self.executor.is_current() {
            return Pending::ready(self.shared.register(operation, category));
        }
        let (tx, rx) = oneshot::channel();
        let abandoned = operation.clone();
        self.submit(move |shared| {
            let result = shared.register(operation.clone(), category);
            let registered = result.is_ok();
            if tx.send(result).is_err() && registered {
                debug!(tracker = %shared.id, %operation, "registration abandoned, completing it");
                shared.apply(|state| state.operations.remove(&operation));
            }
        });

        let shared = Arc::clone(&self.shared);
        let executor = Arc::clone(&self.executor);
        Pending::waiting(rx).on_abandon(move || {
            let bee = RealBusyBee { shared, executor };
            bee.completed(abandoned);
        })
    }

    fn completed(&self, operation: Operation) {
        self.submit(move |shared| {
            shared.apply(|state| {
                if state.operations.remove(&operation) {
                    shared.log_completed(std::slice::from_ref(&operation));
                } else {
                    debug!(tracker = %shared.id, %operation, "completed unknown operation");
                }
            })
        });
    }

    fn completed_everything_in_category(&self, category: Category) {
        self.submit(move |shared| {
            shared.apply(|state| {
                let removed = state.operations.retain_in(&category, |_| false);
                shared.log_completed(&removed);
            })
        });
    }

    fn completed_everything(&self) {
        self.submit(|shared| {
            shared.apply(|state| {
                let removed = state.operations.retain(|_| false);
                shared.log_completed(&removed);
            })
        });
    }

    fn completed_everything_matching(&self, mut matcher: OperationMatcher) -> Result<usize> {
        self.join(move |shared| -> Result<usize> {
            // The matcher runs without the state lock so it can read or
            // mutate the tracker. Each match is removed before the next
            // operation is offered to it.
            let mut snapshot: Vec<Operation> =
                shared.lock().operations.all_values().into_iter().collect();
            snapshot.sort();

            let mut removed = 0;
            for operation in snapshot {
                let matched = catch_unwind(AssertUnwindSafe(|| matcher(&operation)))
                    .map_err(|payload| Error::Predicate(panic_message(payload.as_ref())))?;
                if matched && shared.apply(|state| state.operations.remove(&operation)) {
                    shared.log_completed(std::slice::from_ref(&operation));
                    removed += 1;
                }
            }
            Ok(removed)
        })?
    }

    fn ignore_category(&self, category: Category) {
        self.submit(move |shared| {
            shared.apply(|state| {
                if state.ignored.insert(category.clone()) {
                    info!(tracker = %shared.id, %category, "ignoring category");
                }
            })
        });
    }

    fn pay_attention_to_category(&self, category: Category) {
        self.submit(move |shared| {
            shared.apply(|state| {
                if state.ignored.remove(&category) {
                    info!(tracker = %shared.id, %category, "paying attention to category");
                }
            })
        });
    }

    fn register_no_longer_busy_callback(&self, callback: Arc<dyn NoLongerBusyCallback>) {
        self.submit(move |shared| {
            shared.apply(|state| {
                if state.callback.replace(callback).is_some() {
                    debug!(tracker = %shared.id, "replaced no-longer-busy callback");
                }
            })
        });
    }

    fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst)
    }

    fn to_string_verbose(&self) -> String {
        let state = self.shared.lock();
        let operations = &state.operations;

        let mut categories: Vec<&Category> = operations.categories().collect();
        categories.sort();
        let mut ignored: Vec<&Category> = state.ignored.iter().collect();
        ignored.sort();

        let mut out = String::new();
        out.push_str("\n***********************");
        out.push_str("\n**BusyBee Information**");
        out.push_str("\n***********************");
        let _ = write!(out, "\nTotal Operations: {}", operations.len());
        let _ = write!(
            out,
            "\nIgnored Categories: {}",
            ignored
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        out.push_str("\nList of operations in progress:");
        out.push_str("\n****************************");
        for category in categories {
            let _ = write!(out, "\nCATEGORY: ======= {category} =======");
            let mut in_category: Vec<Operation> =
                operations.values_in(category).into_iter().collect();
            in_category.sort();
            for operation in in_category {
                let _ = write!(out, "\n{operation}");
            }
        }
        out.push_str("\n****************************\n");
        out
    }

    fn flush(&self) -> Result<()> {
        self.join(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignored_categories_apply_from_construction() {
        let bee = RealBusyBee::with_ignored(Arc::new(Immediate), [Category::Network]);
        bee.busy_with_in("fetch".into(), Category::Network).unwrap();
        assert!(bee.is_not_busy());

        bee.busy_with("render".into()).unwrap();
        assert!(bee.is_busy());
    }

    #[test]
    fn state_busy_ignores_empty_categories() {
        let mut state = TrackerState::default();
        state
            .operations
            .add(Category::Dialog, Operation::from("confirm"))
            .unwrap();
        assert!(state.is_busy());

        state.operations.remove(&Operation::from("confirm"));
        assert!(!state.is_busy());
    }

    #[test]
    fn verbose_output_lists_operations_by_category() {
        let bee = RealBusyBee::immediate();
        bee.busy_with("load".into()).unwrap();
        bee.busy_with_in("fetch".into(), Category::Network).unwrap();
        bee.ignore_category(Category::Dialog);

        let verbose = bee.to_string_verbose();
        assert!(verbose.contains("Total Operations: 2"));
        assert!(verbose.contains("Ignored Categories: DIALOG"));
        assert!(verbose.contains("CATEGORY: ======= NETWORK =======\nfetch"));
        assert!(verbose.contains("CATEGORY: ======= GENERAL =======\nload"));
    }
}
