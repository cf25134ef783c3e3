//! Undoable actions stored by the [`UndoManager`](super::UndoManager).
//!
//! - [`UndoableAction`]: a replayable, mergeable history step
//! - [`CompoundAction`]: several actions undone/redone as one step
//!
//! The engine's own step is [`UndoLogEntry`](super::UndoLogEntry), built from
//! a transaction's consolidated log. Callers may contribute additional,
//! self-contained actions to a transaction with
//! [`Transaction::add`](super::Transaction::add); they are bundled with the
//! log entry into a [`CompoundAction`].

use std::any::Any;
use std::fmt;

use super::document::Document;
use super::error::UowResult;
use super::transaction::Transaction;

/// Helper trait for downcasting trait objects to concrete types.
///
/// Automatically implemented for all `'static` types. Used by
/// [`UndoableAction::merge`] to inspect the concrete type of the incoming
/// action. Call it through the trait object (`(*next).as_any()`), not the
/// box, or the box itself is what gets downcast.
pub trait AsAny: 'static {
    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A replayable history step.
///
/// Both directions run inside a replay transaction supplied by the undo
/// manager; implementations re-apply recorded state through adapters rather
/// than re-executing the original mutation.
pub trait UndoableAction<D: Document>: fmt::Debug + AsAny + Send {
    /// Restores the document to the state before this step.
    fn undo(&mut self, doc: &mut D, tx: &mut Transaction<D>) -> UowResult;

    /// Re-applies this step after an undo.
    fn redo(&mut self, doc: &mut D, tx: &mut Transaction<D>) -> UowResult;

    /// A short, human-readable description for display in the edit menu.
    fn description(&self) -> &str;

    /// Tries to absorb `next`, taking ownership.
    ///
    /// Returns `None` if `next` was consumed, or `Some(next)` to hand it back.
    /// Default: no merging.
    fn merge(&mut self, next: Box<dyn UndoableAction<D>>) -> Option<Box<dyn UndoableAction<D>>> {
        Some(next)
    }

    /// Whether this step changes document content (as opposed to UI state
    /// such as selection). Steps that don't are ignored by save tracking.
    fn modifies_content(&self) -> bool {
        true
    }
}

/// Several actions treated as one history step.
///
/// Undo runs the children in reverse order, redo runs them forward.
pub struct CompoundAction<D: Document> {
    description: String,
    actions: Vec<Box<dyn UndoableAction<D>>>,
}

impl<D: Document> CompoundAction<D> {
    pub fn new(description: impl Into<String>, actions: Vec<Box<dyn UndoableAction<D>>>) -> Self {
        Self {
            description: description.into(),
            actions,
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl<D: Document> UndoableAction<D> for CompoundAction<D> {
    fn undo(&mut self, doc: &mut D, tx: &mut Transaction<D>) -> UowResult {
        for action in self.actions.iter_mut().rev() {
            action.undo(doc, tx)?;
        }
        Ok(())
    }

    fn redo(&mut self, doc: &mut D, tx: &mut Transaction<D>) -> UowResult {
        for action in &mut self.actions {
            action.redo(doc, tx)?;
        }
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn modifies_content(&self) -> bool {
        self.actions.iter().any(|a| a.modifies_content())
    }
}

impl<D: Document> fmt::Debug for CompoundAction<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompoundAction")
            .field("description", &self.description)
            .field("actions", &self.actions)
            .finish()
    }
}
