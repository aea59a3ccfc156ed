//! Execution contexts for tracker mutations and wrapped work.
//!
//! The tracker only needs *a* serializing context: something that runs
//! submitted jobs one at a time, in submission order. [`SerialQueue`] is the
//! production one (a dedicated worker thread); [`Immediate`] runs jobs
//! inline and is what unit tests use.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{Result, panic_message};

/// A unit of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run jobs.
pub trait Executor: Send + Sync {
    /// Submit a job. Does not wait for it to run.
    fn execute(&self, job: Job);

    /// Whether the calling thread is the one this executor runs jobs on.
    ///
    /// Callers that need a job's result use this to run inline instead of
    /// waiting on themselves.
    fn is_current(&self) -> bool {
        false
    }
}

/// Runs every job on the caller's thread, right away.
#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

impl Executor for Immediate {
    fn execute(&self, job: Job) {
        job();
    }

    fn is_current(&self) -> bool {
        true
    }
}

/// Runs jobs on the tokio blocking pool of a runtime.
impl Executor for tokio::runtime::Handle {
    fn execute(&self, job: Job) {
        drop(self.spawn_blocking(job));
    }
}

/// A single worker thread draining a FIFO queue of jobs.
///
/// Jobs never overlap and run in the order they were submitted. A job that
/// panics is logged and the worker moves on to the next one.
pub struct SerialQueue {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl SerialQueue {
    /// Spawn the worker thread.
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let thread_name = name.clone();
        let worker = thread::Builder::new().name(name.clone()).spawn(move || {
            debug!(queue = %thread_name, "serial queue started");
            while let Some(job) = receiver.blocking_recv() {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                    error!(
                        queue = %thread_name,
                        panic = %panic_message(payload.as_ref()),
                        "job panicked on serial queue"
                    );
                }
            }
            debug!(queue = %thread_name, "serial queue stopped");
        })?;
        let worker_id = worker.thread().id();

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop accepting jobs, run everything already queued, then join the
    /// worker. Jobs submitted afterwards are dropped.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(sender);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        // Joining ourselves would never return.
        if let Some(worker) = worker {
            if !self.is_current() && worker.join().is_err() {
                error!(queue = %self.name, "serial queue worker panicked");
            }
        }
    }
}

impl Executor for SerialQueue {
    fn execute(&self, job: Job) {
        let guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(sender) => {
                if sender.send(job).is_err() {
                    error!(queue = %self.name, "serial queue worker is gone, job dropped");
                }
            }
            None => warn!(queue = %self.name, "serial queue shut down, job dropped"),
        }
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.worker_id
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc::sync_channel;

    #[test]
    fn immediate_runs_inline() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let h = Arc::clone(&hits);
        Immediate.execute(Box::new(move || h.lock().unwrap().push(1)));
        assert_eq!(*hits.lock().unwrap(), vec![1]);
        assert!(Immediate.is_current());
    }

    #[test]
    fn serial_queue_runs_jobs_in_order() {
        let queue = SerialQueue::spawn("test-order").unwrap();
        let hits = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let h = Arc::clone(&hits);
            queue.execute(Box::new(move || h.lock().unwrap().push(i)));
        }
        queue.shutdown();

        assert_eq!(*hits.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn serial_queue_survives_panicking_job() {
        let queue = SerialQueue::spawn("test-panic").unwrap();
        queue.execute(Box::new(|| panic!("boom")));

        let (tx, rx) = sync_channel(1);
        queue.execute(Box::new(move || tx.send(()).unwrap()));
        rx.recv().unwrap();
        queue.shutdown();
    }

    #[test]
    fn serial_queue_knows_its_own_thread() {
        let queue = Arc::new(SerialQueue::spawn("test-current").unwrap());
        assert!(!queue.is_current());

        let (tx, rx) = sync_channel(1);
        let q = Arc::clone(&queue);
        queue.execute(Box::new(move || tx.send(q.is_current()).unwrap()));
        assert!(rx.recv().unwrap());
        queue.shutdown();
    }
}
