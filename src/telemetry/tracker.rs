//! Tracker span helpers.
//!
//! Each tracker instance owns a span; busy/idle transitions are recorded
//! as events inside it so a hung test's log shows when the app last went
//! idle.

use tracing::Span;

/// Start the long-lived span for one tracker instance.
pub fn start_tracker_span(name: &str) -> Span {
    tracing::info_span!("busybee.tracker", "tracker.name" = name)
}

/// Record a busy/idle transition on the tracker's span.
pub fn record_transition(span: &Span, from: &str, to: &str) {
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}
