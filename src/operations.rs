//! Category-partitioned operation set.
//!
//! A bidirectional association between outstanding values and the key
//! (category) each one belongs to. The forward index answers "what is in
//! this category" and the reverse index answers "which category is this
//! in"; both are updated together on every add and remove.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use crate::error::{Error, Result};

/// Every value maps to exactly one key at a time. Keys stay known after
/// their last value is removed.
#[derive(Debug, Clone)]
pub struct OperationSet<K, V> {
    forward: HashMap<K, HashSet<V>>,
    reverse: HashMap<V, K>,
}

impl<K, V> Default for OperationSet<K, V> {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }
}

impl<K, V> OperationSet<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Eq + Hash + Clone + fmt::Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `key`.
    ///
    /// Returns `Ok(false)` without touching anything when the exact mapping
    /// already exists. Fails with [`Error::InvalidState`] when `value` is
    /// outstanding under a different key; remove it first to re-key it.
    pub fn add(&mut self, key: K, value: V) -> Result<bool> {
        match self.reverse.get(&value) {
            Some(existing) if *existing == key => return Ok(false),
            Some(existing) => {
                return Err(Error::InvalidState {
                    value: value.to_string(),
                    existing: existing.to_string(),
                    requested: key.to_string(),
                });
            }
            None => {}
        }
        self.forward
            .entry(key.clone())
            .or_default()
            .insert(value.clone());
        self.reverse.insert(value, key);
        Ok(true)
    }

    /// The key `value` is currently registered under.
    pub fn category_of(&self, value: &V) -> Option<&K> {
        self.reverse.get(value)
    }

    /// Unregister `value`. Returns whether it was present.
    pub fn remove(&mut self, value: &V) -> bool {
        let Some(key) = self.reverse.remove(value) else {
            return false;
        };
        if let Some(values) = self.forward.get_mut(&key) {
            values.remove(value);
        }
        true
    }

    /// Snapshot of every value across all keys.
    pub fn all_values(&self) -> HashSet<V> {
        self.reverse.keys().cloned().collect()
    }

    /// Snapshot of the values under `key`; empty for unknown keys.
    pub fn values_in(&self, key: &K) -> HashSet<V> {
        self.forward.get(key).cloned().unwrap_or_default()
    }

    /// Every key that has ever been used, including ones now empty.
    pub fn categories(&self) -> impl Iterator<Item = &K> {
        self.forward.keys()
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    /// True iff no values are outstanding (keys may remain).
    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    pub fn is_empty_in(&self, key: &K) -> bool {
        self.forward.get(key).is_none_or(HashSet::is_empty)
    }

    /// Visit every value, removing those for which `keep` returns false.
    ///
    /// Each removal updates both indices before the next value is visited,
    /// so if `keep` panics part way through, the values already removed
    /// stay removed and the set remains consistent. Returns the removed
    /// values.
    pub fn retain<F>(&mut self, keep: F) -> Vec<V>
    where
        F: FnMut(&V) -> bool,
    {
        let candidates: Vec<V> = self.reverse.keys().cloned().collect();
        self.retain_among(candidates, keep)
    }

    /// Like [`retain`](Self::retain), restricted to the values under `key`.
    pub fn retain_in<F>(&mut self, key: &K, keep: F) -> Vec<V>
    where
        F: FnMut(&V) -> bool,
    {
        let candidates: Vec<V> = self
            .forward
            .get(key)
            .map(|values| values.iter().cloned().collect())
            .unwrap_or_default();
        self.retain_among(candidates, keep)
    }

    fn retain_among<F>(&mut self, candidates: Vec<V>, mut keep: F) -> Vec<V>
    where
        F: FnMut(&V) -> bool,
    {
        let mut removed = Vec::new();
        for value in candidates {
            if !keep(&value) && self.remove(&value) {
                removed.push(value);
            }
        }
        removed
    }
}

/// Renders as a tree, keys and values sorted by their display form:
///
/// ```text
/// {
/// 'NETWORK'
///  ├─ 'fetch-a'
///  └─ 'fetch-b'
/// }
/// ```
impl<K, V> fmt::Display for OperationSet<K, V>
where
    K: fmt::Display,
    V: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut groups: Vec<(String, Vec<String>)> = self
            .forward
            .iter()
            .map(|(key, values)| {
                let mut rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
                rendered.sort();
                (key.to_string(), rendered)
            })
            .collect();
        groups.sort();

        writeln!(f, "{{")?;
        for (key, values) in groups {
            writeln!(f, "'{key}'")?;
            let last = values.len().saturating_sub(1);
            for (i, value) in values.iter().enumerate() {
                let branch = if i == last { "└─" } else { "├─" };
                writeln!(f, " {branch} '{value}'")?;
            }
        }
        write!(f, "}}")
    }
}
