//! Concurrency tests: many caller threads against one tracker backed by a
//! serial queue.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use busybee::{BusyBee, Category, Executor, Operation, RealBusyBee, SerialQueue};
use tracing::Level;

const CALLERS: u64 = 100;

fn queued_bee(name: &str) -> (Arc<RealBusyBee>, Arc<SerialQueue>) {
    let queue = Arc::new(SerialQueue::spawn(name).expect("spawn serial queue"));
    let bee = Arc::new(RealBusyBee::new(queue.clone()));
    (bee, queue)
}

fn counting_callback(bee: &dyn BusyBee) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    bee.register_no_longer_busy_callback(Arc::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
    }));
    count
}

#[test]
fn concurrent_busy_then_completed_ends_idle() {
    let (bee, queue) = queued_bee("busybee-concurrent");
    let count = counting_callback(bee.as_ref());

    // Transitions are recorded on the queue thread; capture them there.
    let (subscriber, events) = common::capture();
    queue.execute(Box::new(move || {
        std::mem::forget(tracing::subscriber::set_default(subscriber));
    }));

    let handles: Vec<_> = (0..CALLERS)
        .map(|i| {
            let bee = Arc::clone(&bee);
            thread::spawn(move || {
                let op = Operation::Id(i);
                bee.busy_with_in(op.clone(), Category::Network)
                    .expect("unique operation registers");
                bee.completed(op);
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("caller thread panicked");
    }

    bee.flush().unwrap();
    assert!(bee.is_not_busy());

    let transitions = common::with_message(&events, "state_transition");
    let to_idle = transitions
        .iter()
        .filter(|event| event.field("to") == Some("idle"))
        .count();
    let to_busy = transitions.len() - to_idle;
    let fired = count.load(Ordering::SeqCst);
    assert!(to_idle >= 1, "never went idle");
    assert_eq!(to_busy, to_idle, "ended idle, so every busy edge has an idle edge");
    assert_eq!(fired, to_idle, "callback must fire exactly once per idle edge");
    queue.shutdown();
}

#[test]
fn callback_fires_once_when_concurrent_work_drains_under_a_holder() {
    let (bee, queue) = queued_bee("busybee-holder");
    bee.busy_with("holder".into()).unwrap();
    let count = counting_callback(bee.as_ref());

    let handles: Vec<_> = (0..CALLERS)
        .map(|i| {
            let bee = Arc::clone(&bee);
            thread::spawn(move || {
                let op = Operation::Id(i);
                bee.busy_with(op.clone()).unwrap();
                bee.completed(op);
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("caller thread panicked");
    }
    bee.flush().unwrap();
    assert!(bee.is_busy());
    assert_eq!(count.load(Ordering::SeqCst), 0);

    bee.completed("holder".into());
    bee.flush().unwrap();
    assert!(bee.is_not_busy());
    assert_eq!(count.load(Ordering::SeqCst), 1);
    queue.shutdown();
}

#[test]
fn per_caller_order_allows_reusing_an_identity() {
    let (bee, queue) = queued_bee("busybee-reuse");

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let bee = Arc::clone(&bee);
            thread::spawn(move || {
                let op = Operation::Id(t);
                for round in 0..50 {
                    let category = if round % 2 == 0 {
                        Category::Network
                    } else {
                        Category::Dialog
                    };
                    // Fails if the previous completion had not applied yet.
                    bee.busy_with_in(op.clone(), category).unwrap();
                    bee.completed(op.clone());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("caller thread panicked");
    }

    bee.flush().unwrap();
    assert!(bee.is_not_busy());
    queue.shutdown();
}

#[test]
fn callback_runs_on_the_serializing_thread() {
    let (bee, queue) = queued_bee("busybee-callback-thread");
    let seen = Arc::new(Mutex::new(None));
    let s = Arc::clone(&seen);
    bee.register_no_longer_busy_callback(Arc::new(move || {
        *s.lock().unwrap() = thread::current().name().map(str::to_string);
    }));

    bee.busy_with("op".into()).unwrap();
    bee.completed("op".into());
    bee.flush().unwrap();

    assert_eq!(
        seen.lock().unwrap().as_deref(),
        Some("busybee-callback-thread")
    );
    queue.shutdown();
}

#[test]
fn callback_can_register_work_from_the_serializing_thread() {
    let (bee, queue) = queued_bee("busybee-reentrant");
    let weak = Arc::downgrade(&bee);
    bee.register_no_longer_busy_callback(Arc::new(move || {
        if let Some(bee) = weak.upgrade() {
            bee.busy_with("follow-up".into()).unwrap();
        }
    }));

    bee.busy_with("op".into()).unwrap();
    bee.completed("op".into());
    bee.flush().unwrap();

    assert!(bee.is_busy());
    queue.shutdown();
}

#[test]
fn registration_after_shutdown_reports_stopped_context() {
    let (bee, queue) = queued_bee("busybee-stopped");
    queue.shutdown();

    let err = bee.busy_with("late".into()).unwrap_err();
    assert!(matches!(err, busybee::Error::ContextStopped));
    assert!(bee.is_not_busy());
}

#[test]
fn matcher_can_read_tracker_from_the_serializing_thread() {
    let (bee, queue) = queued_bee("busybee-matcher");
    bee.busy_with("a".into()).unwrap();
    bee.busy_with_in("b".into(), Category::Network).unwrap();

    let inner = Arc::clone(&bee);
    let removed = bee
        .completed_everything_matching(Box::new(move |op: &Operation| {
            inner.to_string_verbose().contains(&format!("\n{op}"))
        }))
        .unwrap();

    assert_eq!(removed, 2);
    bee.flush().unwrap();
    assert!(bee.is_not_busy());
    queue.shutdown();
}

#[test]
fn completion_after_shutdown_is_dropped_with_a_warning() {
    let (bee, queue) = queued_bee("busybee-dropped");
    bee.busy_with("orphan".into()).unwrap();
    queue.shutdown();

    let (subscriber, events) = common::capture();
    tracing::subscriber::with_default(subscriber, || bee.completed("orphan".into()));

    let dropped = common::with_message(&events, "serial queue shut down, job dropped");
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].level, Level::WARN);
    assert!(bee.is_busy());
}
