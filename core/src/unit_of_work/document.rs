//! The document seam and trackable handles.
//!
//! A [`Document`] is the identity-resolution root of a diagram: every
//! trackable entity lives inside it and is addressed through a [`Target`]
//! (type tag + stable id). The engine never holds references to entities;
//! adapters resolve the live entity by id whenever a step is recorded or
//! replayed, since replay can happen after arbitrary structural change.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use super::adapter::AdapterRegistry;
use super::error::UowResult;
use super::history::{self, UndoManager};

/// A document whose entities are tracked by the unit-of-work engine.
///
/// The associated types close the set of trackable kinds at compile time:
/// `Kind` is the entity-type tag, `Snapshot` is the application's sum type of
/// per-kind state captures (its variant doubles as the snapshot-kind
/// discriminator).
///
/// # Example
///
/// ```ignore
/// impl Document for Diagram {
///     type Kind = ElementKind;
///     type Id = String;
///     type Snapshot = ElementSnapshot;
///
///     fn document_id(&self) -> &str { &self.id }
///     fn adapters(&self) -> Arc<AdapterRegistry<Self>> { self.adapters.clone() }
///     fn undo_manager(&mut self) -> &mut UndoManager<Self> { &mut self.undo_manager }
///     fn selection(&self) -> Vec<String> { self.selection.clone() }
///     fn set_selection(&mut self, ids: Vec<String>) { self.selection = ids; }
/// }
/// ```
pub trait Document: Sized + 'static {
    /// Entity-type tag used to select adapters.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    /// Stable entity identifier.
    type Id: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    /// Full-state capture of one entity.
    type Snapshot: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Stable identifier of this document, used to key per-document state
    /// such as the remote transaction.
    fn document_id(&self) -> &str;

    /// The adapter registry this document was constructed with.
    fn adapters(&self) -> Arc<AdapterRegistry<Self>>;

    /// The undo manager receiving committed undo-log entries.
    fn undo_manager(&mut self) -> &mut UndoManager<Self>;

    /// Currently selected entity ids.
    fn selection(&self) -> Vec<Self::Id>;

    /// Replaces the current selection.
    fn set_selection(&mut self, ids: Vec<Self::Id>);

    /// Undoes the most recent undo-manager entry.
    ///
    /// The entry is replayed inside a fresh silent transaction, so adapter
    /// hooks still run for every replayed step.
    fn undo(&mut self) -> UowResult {
        history::undo_document(self)
    }

    /// Redoes the most recently undone entry.
    fn redo(&mut self) -> UowResult {
        history::redo_document(self)
    }
}

/// Handle to a trackable entity: its type tag and stable id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target<K, I> {
    pub kind: K,
    pub id: I,
}

impl<K, I> Target<K, I> {
    pub fn new(kind: K, id: I) -> Self {
        Self { kind, id }
    }
}

impl<K: fmt::Debug, I: fmt::Debug> fmt::Display for Target<K, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.kind, self.id)
    }
}

/// The [`Target`] type of a document.
pub type TargetOf<D> = Target<<D as Document>::Kind, <D as Document>::Id>;
