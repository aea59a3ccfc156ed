//! Error types for busybee.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A value is already associated with a different category.
    #[error(
        "'{value}' is already registered under '{existing}', cannot register it under '{requested}': remove the old mapping first"
    )]
    InvalidState {
        value: String,
        existing: String,
        requested: String,
    },

    #[error("no-longer-busy callback failed: {0}")]
    Callback(String),

    #[error("operation matcher failed: {0}")]
    Predicate(String),

    #[error("timed out after {0:?} waiting for idle")]
    Timeout(Duration),

    #[error("serializing context has stopped")]
    ContextStopped,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Render a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
