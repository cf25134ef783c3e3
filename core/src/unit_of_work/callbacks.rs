//! Lifecycle callbacks keyed by `(phase, event)` and a caller-supplied id.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::document::Document;
use super::transaction::Transaction;

/// Whether a callback runs before or after its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Before,
    After,
}

/// Lifecycle point a callback is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    Undo,
    Redo,
    Commit,
}

/// A lifecycle callback. Receives the document and the transaction the
/// lifecycle point belongs to (the replay transaction for undo/redo).
pub type Callback<D> = Arc<dyn Fn(&mut D, &mut Transaction<D>) + Send + Sync>;

/// Ordered callback lists per `(phase, event)`.
///
/// Registering under an id that is already present replaces the earlier
/// callback in place, so the latest registration wins without changing the
/// firing order.
pub struct CallbackMap<D: Document> {
    entries: HashMap<(Phase, Event), Vec<(String, Callback<D>)>>,
}

impl<D: Document> CallbackMap<D> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, phase: Phase, event: Event, id: impl Into<String>, callback: Callback<D>) {
        let id = id.into();
        let list = self.entries.entry((phase, event)).or_default();
        match list.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = callback,
            None => list.push((id, callback)),
        }
    }

    /// Removes and returns the callbacks registered for `(phase, event)`.
    pub fn take(&mut self, phase: Phase, event: Event) -> Vec<Callback<D>> {
        self.entries
            .remove(&(phase, event))
            .map(|list| list.into_iter().map(|(_, cb)| cb).collect())
            .unwrap_or_default()
    }

    /// Returns the callbacks registered for `(phase, event)` without removing them.
    pub fn get(&self, phase: Phase, event: Event) -> Vec<Callback<D>> {
        self.entries
            .get(&(phase, event))
            .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of callbacks registered for `(phase, event)`.
    pub fn count(&self, phase: Phase, event: Event) -> usize {
        self.entries.get(&(phase, event)).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    /// Copies `other`'s callbacks for `event` into this map. With `overwrite`,
    /// ids present in both take `other`'s callback; otherwise only new ids
    /// are added.
    pub fn absorb(&mut self, other: &Self, event: Event, overwrite: bool) {
        for phase in [Phase::Before, Phase::After] {
            let Some(incoming) = other.entries.get(&(phase, event)) else {
                continue;
            };
            for (id, callback) in incoming {
                let exists = self
                    .entries
                    .get(&(phase, event))
                    .is_some_and(|list| list.iter().any(|(existing, _)| existing == id));
                if overwrite || !exists {
                    self.insert(phase, event, id.clone(), callback.clone());
                }
            }
        }
    }

    /// Drops every callback attached to `event`.
    pub fn clear_event(&mut self, event: Event) {
        self.entries.retain(|(_, e), _| *e != event);
    }
}

impl<D: Document> Clone for CallbackMap<D> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<D: Document> Default for CallbackMap<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> fmt::Debug for CallbackMap<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for ((phase, event), list) in &self.entries {
            let ids: Vec<&str> = list.iter().map(|(id, _)| id.as_str()).collect();
            map.entry(&(phase, event), &ids);
        }
        map.finish()
    }
}
