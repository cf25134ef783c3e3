//! Per-kind adapters and the registry that resolves them.
//!
//! - [`Adapter`]: snapshot/restore and commit-time hooks for one entity kind
//! - [`ChildAdapter`]: structural insert/remove for one `(parent, child)` pair
//! - [`AdapterRegistry`]: explicit lookup table, built once per document
//!
//! Adapters are strategies, not entities: they hold no per-entity state and
//! resolve the live entity through the document every time they are called.

use std::collections::HashMap;
use std::fmt;

use super::document::Document;
use super::error::{UowError, UowResult};
use super::operation::OperationOf;
use super::transaction::Transaction;

/// Snapshot, restore and notification strategy for one entity kind.
///
/// `restore` and `update` must be idempotent and must not open a nested
/// transaction; any secondary effects they cause are recorded on the `tx`
/// they receive.
pub trait Adapter<D: Document>: Send + Sync {
    /// Captures the full state of the entity, or `None` if it does not exist.
    fn snapshot(&self, doc: &D, id: &D::Id) -> Option<D::Snapshot>;

    /// Applies `snapshot` to the live entity `id`.
    fn restore(
        &self,
        doc: &mut D,
        id: &D::Id,
        snapshot: &D::Snapshot,
        tx: &mut Transaction<D>,
    ) -> UowResult;

    /// Returns `true` if the entity currently exists in the document.
    fn contains(&self, doc: &D, id: &D::Id) -> bool {
        self.snapshot(doc, id).is_some()
    }

    /// Resolves `id` through the document and restores `snapshot` onto it.
    ///
    /// Used by undo/redo replay of `Update` operations.
    fn update(
        &self,
        doc: &mut D,
        id: &D::Id,
        snapshot: &D::Snapshot,
        tx: &mut Transaction<D>,
    ) -> UowResult {
        if !self.contains(doc, id) {
            return Err(UowError::TargetNotFound(format!("{id:?}")));
        }
        self.restore(doc, id, snapshot, tx)
    }

    /// Called with operations not yet notified, mid-transaction or at commit.
    fn on_notify(&self, _doc: &mut D, _ops: &[OperationOf<D>], _tx: &Transaction<D>) {}

    /// Called with all of this kind's operations before any after-commit hook runs.
    fn on_before_commit(&self, _doc: &mut D, _ops: &[OperationOf<D>], _tx: &Transaction<D>) {}

    /// Called with all of this kind's operations after notification.
    fn on_after_commit(&self, _doc: &mut D, _ops: &[OperationOf<D>], _tx: &Transaction<D>) {}
}

/// Structural membership strategy for one `(parent kind, child kind)` pair.
///
/// Only used during undo/redo replay of `Add` and `Remove` operations.
pub trait ChildAdapter<D: Document>: Send + Sync {
    /// Re-creates `child` from `snapshot` and inserts it into `parent` at `index`.
    fn add(
        &self,
        doc: &mut D,
        parent: &D::Id,
        child: &D::Id,
        snapshot: &D::Snapshot,
        index: usize,
        tx: &mut Transaction<D>,
    ) -> UowResult;

    /// Detaches `child` from `parent`.
    fn remove(
        &self,
        doc: &mut D,
        parent: &D::Id,
        child: &D::Id,
        tx: &mut Transaction<D>,
    ) -> UowResult;
}

/// Lookup table from entity kinds to adapters.
///
/// # Example
///
/// ```ignore
/// let registry = AdapterRegistry::new()
///     .with_adapter(Kind::Layer, LayerAdapter)
///     .with_adapter(Kind::Node, NodeAdapter)
///     .with_child_adapter(Kind::Layer, Kind::Node, LayerNodeAdapter);
/// let registry = Arc::new(registry);
/// ```
pub struct AdapterRegistry<D: Document> {
    adapters: HashMap<D::Kind, Box<dyn Adapter<D>>>,
    child_adapters: HashMap<(D::Kind, D::Kind), Box<dyn ChildAdapter<D>>>,
}

impl<D: Document> AdapterRegistry<D> {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            child_adapters: HashMap::new(),
        }
    }

    /// Registers the adapter for `kind`, replacing any previous one.
    pub fn with_adapter(mut self, kind: D::Kind, adapter: impl Adapter<D> + 'static) -> Self {
        self.adapters.insert(kind, Box::new(adapter));
        self
    }

    /// Registers the child adapter for `(parent, child)`, replacing any previous one.
    pub fn with_child_adapter(
        mut self,
        parent: D::Kind,
        child: D::Kind,
        adapter: impl ChildAdapter<D> + 'static,
    ) -> Self {
        self.child_adapters.insert((parent, child), Box::new(adapter));
        self
    }

    /// Returns the adapter for `kind`.
    ///
    /// # Panics
    ///
    /// Panics if no adapter is registered for `kind`.
    #[track_caller]
    pub fn adapter(&self, kind: D::Kind) -> &dyn Adapter<D> {
        match self.adapters.get(&kind) {
            Some(adapter) => adapter.as_ref(),
            None => panic!("no adapter registered for {kind:?}"),
        }
    }

    /// Returns the child adapter for `(parent, child)`.
    ///
    /// # Panics
    ///
    /// Panics if no child adapter is registered for the pair.
    #[track_caller]
    pub fn child_adapter(&self, parent: D::Kind, child: D::Kind) -> &dyn ChildAdapter<D> {
        match self.child_adapters.get(&(parent, child)) {
            Some(adapter) => adapter.as_ref(),
            None => panic!("no child adapter registered for {parent:?} -> {child:?}"),
        }
    }

    pub fn try_adapter(&self, kind: D::Kind) -> Option<&dyn Adapter<D>> {
        self.adapters.get(&kind).map(|a| a.as_ref())
    }

    pub fn try_child_adapter(&self, parent: D::Kind, child: D::Kind) -> Option<&dyn ChildAdapter<D>> {
        self.child_adapters.get(&(parent, child)).map(|a| a.as_ref())
    }
}

impl<D: Document> Default for AdapterRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> fmt::Debug for AdapterRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.adapters.keys().collect::<Vec<_>>())
            .field("child_pairs", &self.child_adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
