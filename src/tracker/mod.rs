//! The busy tracker contract and its two implementations.
//!
//! [`RealBusyBee`] tracks outstanding operations; [`NoOpBusyBee`] is the
//! stand-in used when tracking is switched off. Both are used through
//! `Arc<dyn BusyBee>` so call sites never know which one they have.

pub mod noop;
pub mod real;

pub use noop::NoOpBusyBee;
pub use real::RealBusyBee;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::model::{Category, Operation};

/// Notified when the tracker goes from busy to idle.
pub trait NoLongerBusyCallback: Send + Sync {
    fn no_longer_busy(&self);
}

impl<F> NoLongerBusyCallback for F
where
    F: Fn() + Send + Sync,
{
    fn no_longer_busy(&self) {
        self()
    }
}

/// Decides which operations a bulk completion removes.
pub type OperationMatcher = Box<dyn FnMut(&Operation) -> bool + Send>;

/// Tracks whether the application has outstanding asynchronous work.
///
/// Registration and the matcher-driven completion wait for their result so
/// errors reach the caller. Every other mutation is queued and returns
/// immediately; reads never wait.
pub trait BusyBee: Send + Sync {
    /// Diagnostic name, including the operations currently outstanding.
    fn name(&self) -> String;

    /// Mark `operation` as outstanding in [`Category::General`].
    fn busy_with(&self, operation: Operation) -> Result<()> {
        self.busy_with_in(operation, Category::default())
    }

    /// Mark `operation` as outstanding in `category`.
    ///
    /// Repeating a registration under the same category is a no-op.
    /// Registering an operation that is outstanding under another category
    /// fails with [`Error::InvalidState`](crate::error::Error::InvalidState).
    fn busy_with_in(&self, operation: Operation, category: Category) -> Result<()>;

    /// Same as [`busy_with_in`](BusyBee::busy_with_in), but resolves once the
    /// registration has applied instead of blocking the calling thread.
    fn busy_with_in_async(&self, operation: Operation, category: Category) -> Pending<()> {
        Pending::ready(self.busy_with_in(operation, category))
    }

    /// The operation is done. Completing an unknown operation is a no-op.
    fn completed(&self, operation: Operation);

    fn completed_everything_in_category(&self, category: Category);

    fn completed_everything(&self);

    /// Complete every outstanding operation `matcher` selects, in any
    /// category. Returns how many were removed.
    ///
    /// The matcher is called without the tracker's lock held, so it may
    /// call back into the tracker. Operations registered while it runs are
    /// not offered to it.
    ///
    /// A panicking matcher surfaces as
    /// [`Error::Predicate`](crate::error::Error::Predicate); operations
    /// removed before the panic stay removed.
    fn completed_everything_matching(&self, matcher: OperationMatcher) -> Result<usize>;

    /// Stop counting `category` towards busy.
    fn ignore_category(&self, category: Category);

    /// Count `category` towards busy again. Never fires the callback.
    fn pay_attention_to_category(&self, category: Category);

    /// Replace the no-longer-busy callback. Only the latest one is kept.
    fn register_no_longer_busy_callback(&self, callback: Arc<dyn NoLongerBusyCallback>);

    fn is_busy(&self) -> bool;

    fn is_not_busy(&self) -> bool {
        !self.is_busy()
    }

    /// Everything outstanding, grouped by category, for debugging hung tests.
    fn to_string_verbose(&self) -> String;

    /// False for the no-op variant.
    fn is_tracking(&self) -> bool {
        true
    }

    /// Wait until every mutation submitted before this call has applied.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Result of a mutation queued on the serializing context.
///
/// Resolves to [`Error::ContextStopped`] if the context drops the job.
/// Dropping it before it resolves runs the abandon hook if the mutation
/// succeeded, so a cancelled registration does not stay busy forever.
pub struct Pending<T> {
    state: PendingState<T>,
    on_abandon: Option<Box<dyn FnOnce() + Send>>,
}

enum PendingState<T> {
    Ready(Option<Result<T>>),
    Waiting(oneshot::Receiver<Result<T>>),
}

impl<T> Pending<T> {
    pub fn ready(result: Result<T>) -> Self {
        Self {
            state: PendingState::Ready(Some(result)),
            on_abandon: None,
        }
    }

    pub fn waiting(receiver: oneshot::Receiver<Result<T>>) -> Self {
        Self {
            state: PendingState::Waiting(receiver),
            on_abandon: None,
        }
    }

    /// Run `hook` if a successful result is dropped without being awaited.
    pub fn on_abandon(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_abandon = Some(Box::new(hook));
        self
    }
}

// The result is only ever moved out, never pinned.
impl<T> Unpin for Pending<T> {}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let polled = match &mut this.state {
            PendingState::Ready(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(Error::Other("pending result already taken".to_string()))
            })),
            PendingState::Waiting(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|received| received.unwrap_or_else(|_| Err(Error::ContextStopped))),
        };
        if polled.is_ready() {
            this.on_abandon = None;
        }
        polled
    }
}

impl<T> Drop for Pending<T> {
    fn drop(&mut self) {
        if let PendingState::Waiting(receiver) = &mut self.state {
            // After close the sender sees the drop; anything already sent
            // is still waiting here.
            receiver.close();
            if let Ok(Ok(_)) = receiver.try_recv() {
                if let Some(hook) = self.on_abandon.take() {
                    hook();
                }
            }
        }
    }
}
