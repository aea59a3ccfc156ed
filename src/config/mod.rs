//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on values that do not parse.
//! Nothing is required; every variable has a default.

use crate::error::{Error, Result};
use crate::model::Category;

pub const ENABLED_VAR: &str = "BUSYBEE_ENABLED";
pub const IGNORE_VAR: &str = "BUSYBEE_IGNORE";
pub const QUEUE_NAME_VAR: &str = "BUSYBEE_QUEUE_NAME";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Real tracker when true, no-op tracker otherwise.
    pub enabled: bool,
    /// Categories left out of the busy computation from the start.
    pub ignored_categories: Vec<Category>,
    /// Name of the serializing worker thread.
    pub queue_name: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            ignored_categories: Vec::new(),
            queue_name: "busybee".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            enabled: match optional_var(ENABLED_VAR) {
                Some(raw) => parse_bool(ENABLED_VAR, &raw)?,
                None => defaults.enabled,
            },
            ignored_categories: match optional_var(IGNORE_VAR) {
                Some(raw) => parse_categories(&raw)?,
                None => defaults.ignored_categories,
            },
            queue_name: optional_var(QUEUE_NAME_VAR).unwrap_or(defaults.queue_name),
            log_level: optional_var(LOG_LEVEL_VAR).unwrap_or(defaults.log_level),
        })
    }
}

/// Unset and blank variables both count as absent.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "environment variable {name} must be a boolean, got {raw:?}"
        ))),
    }
}

/// Comma-separated category names; empty segments are skipped.
pub fn parse_categories(raw: &str) -> Result<Vec<Category>> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.parse::<Category>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(parse_bool("X", "on").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(matches!(parse_bool("X", "maybe"), Err(Error::Config(_))));
    }

    #[test]
    fn parse_categories_skips_blank_segments() {
        let categories = parse_categories("network, ,Dialog,uploads,").unwrap();
        assert_eq!(
            categories,
            vec![
                Category::Network,
                Category::Dialog,
                Category::custom("uploads")
            ]
        );
    }
}
