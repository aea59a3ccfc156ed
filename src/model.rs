//! Core data model.
//!
//! An operation is a caller-identified unit of outstanding work. A category
//! groups operations so they can be completed in bulk or left out of the
//! busy computation altogether.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::Error;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// Identity of a unit of outstanding work.
///
/// Identity is equality: two operations that compare equal are the same
/// operation as far as the tracker is concerned. An identity can be reused
/// once it has been completed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    /// A caller-chosen label (e.g. "load-profile").
    Named(String),
    /// A caller-chosen numeric key.
    Id(u64),
    /// A minted handle, unique per call to [`Operation::task`].
    Task(Uuid),
}

impl Operation {
    /// Mint a fresh operation that is equal to nothing else.
    pub fn task() -> Self {
        Self::Task(Uuid::new_v4())
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Operation::Named(_))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Named(name) => write!(f, "{name}"),
            Operation::Id(id) => write!(f, "#{id}"),
            // Short display: first 8 chars of UUID
            Operation::Task(id) => write!(f, "task-{}", &id.to_string()[..8]),
        }
    }
}

impl From<&str> for Operation {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for Operation {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<u64> for Operation {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl From<Uuid> for Operation {
    fn from(id: Uuid) -> Self {
        Self::Task(id)
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Tag grouping operations for bulk completion and for the ignore policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Where operations land when no category is given.
    #[default]
    General,
    Network,
    Dialog,
    Animation,
    /// Application-defined category. Build it with [`Category::custom`] so
    /// built-in names map to their variant.
    Custom(String),
}

impl Category {
    /// Category named `name`; built-in names match case-insensitively.
    pub fn custom(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.trim().to_ascii_lowercase().as_str() {
            "general" => Category::General,
            "network" => Category::Network,
            "dialog" => Category::Dialog,
            "animation" => Category::Animation,
            _ => Category::Custom(name),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::General => "GENERAL",
            Category::Network => "NETWORK",
            Category::Dialog => "DIALOG",
            Category::Animation => "ANIMATION",
            Category::Custom(name) => name,
        };
        write!(f, "{s}")
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::Config("empty category name".to_string()));
        }
        Ok(Category::custom(trimmed))
    }
}
