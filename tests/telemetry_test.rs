//! Integration tests for telemetry initialization and span helpers.

mod common;

use busybee::telemetry::{TelemetryConfig, init_telemetry, tracker};
use tracing::Level;

#[test]
fn telemetry_initializes_once_per_process() {
    // Only one global subscriber can be set; a second attempt reports an
    // error instead of panicking.
    let _ = init_telemetry(TelemetryConfig::default());
    let second = init_telemetry(TelemetryConfig {
        log_level: "debug".to_string(),
        compact: false,
    });
    assert!(second.is_err());
}

#[test]
fn tracker_span_records_transition() {
    let (subscriber, events) = common::capture();
    tracing::subscriber::with_default(subscriber, || {
        let span = tracker::start_tracker_span("RealBusyBee@test");
        tracker::record_transition(&span, "busy", "idle");
    });

    let transitions = common::with_message(&events, "state_transition");
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].level, Level::INFO);
    assert_eq!(transitions[0].field("from"), Some("busy"));
    assert_eq!(transitions[0].field("to"), Some("idle"));
}
