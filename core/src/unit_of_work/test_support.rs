//! Minimal document used by the unit tests: one layer of integer items.

use std::collections::HashMap;
use std::sync::Arc;

use super::action::UndoableAction;
use super::adapter::{Adapter, AdapterRegistry, ChildAdapter};
use super::document::{Document, Target, TargetOf};
use super::error::{UowError, UowResult};
use super::history::UndoManager;
use super::operation::OperationOf;
use super::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Kind {
    Layer,
    Item,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Snap {
    Layer(Vec<String>),
    Item(i32),
}

pub(crate) fn item(id: &str) -> TargetOf<Board> {
    Target::new(Kind::Item, id.to_string())
}

pub(crate) fn layer() -> TargetOf<Board> {
    Target::new(Kind::Layer, "layer".to_string())
}

pub(crate) struct Board {
    pub registry: Arc<AdapterRegistry<Board>>,
    pub history: UndoManager<Board>,
    pub items: HashMap<String, i32>,
    pub layer: Vec<String>,
    pub selection: Vec<String>,
    /// Scratch value driven by [`SetValue`].
    pub value: i32,
    /// Hook and action trace, in call order.
    pub trace: Vec<String>,
}

impl Board {
    pub fn new() -> Self {
        let registry = AdapterRegistry::new()
            .with_adapter(Kind::Layer, LayerAdapter)
            .with_adapter(Kind::Item, ItemAdapter)
            .with_child_adapter(Kind::Layer, Kind::Item, LayerItems);
        Self {
            registry: Arc::new(registry),
            history: UndoManager::default(),
            items: HashMap::new(),
            layer: Vec::new(),
            selection: Vec::new(),
            value: 0,
            trace: Vec::new(),
        }
    }

    /// Inserts an item without recording anything.
    pub fn insert_item(&mut self, id: &str, value: i32) {
        self.items.insert(id.to_string(), value);
        self.layer.push(id.to_string());
    }

    pub fn set_item(&mut self, id: &str, value: i32) {
        self.items.insert(id.to_string(), value);
    }

    pub fn wire_item(&mut self, id: &str, value: i32, index: usize) {
        self.items.insert(id.to_string(), value);
        let index = index.min(self.layer.len());
        self.layer.insert(index, id.to_string());
    }

    pub fn detach_item(&mut self, id: &str) {
        self.items.remove(id);
        self.layer.retain(|existing| existing != id);
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.layer.iter().position(|existing| existing == id)
    }
}

impl Document for Board {
    type Kind = Kind;
    type Id = String;
    type Snapshot = Snap;

    fn document_id(&self) -> &str {
        "board"
    }

    fn adapters(&self) -> Arc<AdapterRegistry<Self>> {
        self.registry.clone()
    }

    fn undo_manager(&mut self) -> &mut UndoManager<Self> {
        &mut self.history
    }

    fn selection(&self) -> Vec<String> {
        self.selection.clone()
    }

    fn set_selection(&mut self, ids: Vec<String>) {
        self.selection = ids;
    }
}

fn trace_hook(doc: &mut Board, hook: &str, kind: Kind, ops: &[OperationOf<Board>]) {
    doc.trace.push(format!("{hook} {kind:?} {}", ops.len()));
}

struct ItemAdapter;

impl Adapter<Board> for ItemAdapter {
    fn snapshot(&self, doc: &Board, id: &String) -> Option<Snap> {
        doc.items.get(id).map(|v| Snap::Item(*v))
    }

    fn restore(&self, doc: &mut Board, id: &String, snapshot: &Snap, tx: &mut Transaction<Board>) -> UowResult {
        let Snap::Item(value) = snapshot else {
            return Err(UowError::InvalidState(format!("not an item snapshot: {snapshot:?}")));
        };
        tx.snapshot(doc, &item(id));
        doc.items.insert(id.clone(), *value);
        tx.update_element(doc, item(id));
        Ok(())
    }

    fn on_notify(&self, doc: &mut Board, ops: &[OperationOf<Board>], _tx: &Transaction<Board>) {
        trace_hook(doc, "notify", Kind::Item, ops);
    }

    fn on_before_commit(&self, doc: &mut Board, ops: &[OperationOf<Board>], _tx: &Transaction<Board>) {
        trace_hook(doc, "before-commit", Kind::Item, ops);
    }

    fn on_after_commit(&self, doc: &mut Board, ops: &[OperationOf<Board>], _tx: &Transaction<Board>) {
        trace_hook(doc, "after-commit", Kind::Item, ops);
    }
}

struct LayerAdapter;

impl Adapter<Board> for LayerAdapter {
    fn snapshot(&self, doc: &Board, _id: &String) -> Option<Snap> {
        Some(Snap::Layer(doc.layer.clone()))
    }

    fn restore(&self, doc: &mut Board, _id: &String, snapshot: &Snap, _tx: &mut Transaction<Board>) -> UowResult {
        let Snap::Layer(order) = snapshot else {
            return Err(UowError::InvalidState(format!("not a layer snapshot: {snapshot:?}")));
        };
        doc.layer = order.clone();
        Ok(())
    }

    fn on_before_commit(&self, doc: &mut Board, ops: &[OperationOf<Board>], _tx: &Transaction<Board>) {
        trace_hook(doc, "before-commit", Kind::Layer, ops);
    }

    fn on_after_commit(&self, doc: &mut Board, ops: &[OperationOf<Board>], _tx: &Transaction<Board>) {
        trace_hook(doc, "after-commit", Kind::Layer, ops);
    }
}

struct LayerItems;

impl ChildAdapter<Board> for LayerItems {
    fn add(
        &self,
        doc: &mut Board,
        _parent: &String,
        child: &String,
        snapshot: &Snap,
        index: usize,
        tx: &mut Transaction<Board>,
    ) -> UowResult {
        let Snap::Item(value) = snapshot else {
            return Err(UowError::InvalidState(format!("not an item snapshot: {snapshot:?}")));
        };
        doc.wire_item(child, *value, index);
        tx.add_element(doc, item(child), layer(), index);
        Ok(())
    }

    fn remove(&self, doc: &mut Board, _parent: &String, child: &String, tx: &mut Transaction<Board>) -> UowResult {
        let index = doc
            .index_of(child)
            .ok_or_else(|| UowError::TargetNotFound(child.clone()))?;
        tx.remove_element(doc, item(child), layer(), index);
        doc.detach_item(child);
        Ok(())
    }
}

/// Records its replay direction in the board trace.
#[derive(Debug)]
pub(crate) struct TraceAction {
    name: String,
}

impl TraceAction {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl UndoableAction<Board> for TraceAction {
    fn undo(&mut self, doc: &mut Board, _tx: &mut Transaction<Board>) -> UowResult {
        doc.trace.push(format!("undo {}", self.name));
        Ok(())
    }

    fn redo(&mut self, doc: &mut Board, _tx: &mut Transaction<Board>) -> UowResult {
        doc.trace.push(format!("redo {}", self.name));
        Ok(())
    }

    fn description(&self) -> &str {
        &self.name
    }
}

/// A mergeable action: consecutive `SetValue`s keep the first old value and
/// take the latest new value.
#[derive(Debug)]
pub(crate) struct SetValue {
    pub old_value: i32,
    pub new_value: i32,
}

impl UndoableAction<Board> for SetValue {
    fn undo(&mut self, doc: &mut Board, _tx: &mut Transaction<Board>) -> UowResult {
        doc.value = self.old_value;
        Ok(())
    }

    fn redo(&mut self, doc: &mut Board, _tx: &mut Transaction<Board>) -> UowResult {
        doc.value = self.new_value;
        Ok(())
    }

    fn description(&self) -> &str {
        "Set value"
    }

    fn merge(&mut self, next: Box<dyn UndoableAction<Board>>) -> Option<Box<dyn UndoableAction<Board>>> {
        if let Some(next) = (*next).as_any().downcast_ref::<SetValue>() {
            self.new_value = next.new_value;
            return None;
        }
        Some(next)
    }
}
