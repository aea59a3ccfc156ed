//! Capturing tracing layer shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt as _};

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

pub type Captured = Arc<Mutex<Vec<CapturedEvent>>>;

struct CaptureLayer {
    events: Captured,
}

struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_string(), format!("{value:?}"));
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldVisitor(&mut fields));
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CapturedEvent {
                level: *event.metadata().level(),
                fields,
            });
    }
}

/// A subscriber that records every event, and the buffer it records into.
pub fn capture() -> (impl Subscriber + Send + Sync + 'static, Captured) {
    let events: Captured = Arc::default();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer {
        events: Arc::clone(&events),
    });
    (subscriber, events)
}

/// Events whose `message` is `message`.
pub fn with_message(events: &Captured, message: &str) -> Vec<CapturedEvent> {
    events
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .filter(|event| event.field("message") == Some(message))
        .cloned()
        .collect()
}
