//! Shared fixture for unit-of-work integration tests.
//!
//! A small diagram: layers holding ordered node ids, a node-id lookup
//! (node -> owning layer) and a derived spatial index that is kept current
//! only through adapter hooks. Every hook call is recorded in a shared
//! [`HookLog`] so tests can assert dispatch order.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use rstest::fixture;

use trellis_core::config::HistoryConfig;
use trellis_core::unit_of_work::{
    Adapter, AdapterRegistry, ChildAdapter, Document, OperationOf, Target, TargetOf, Transaction,
    UndoManager, UowError, UowResult,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Diagram model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Layer,
    Node,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub label: String,
    pub x: i32,
    pub y: i32,
}

impl Node {
    pub fn at(label: &str, x: i32, y: i32) -> Self {
        Self {
            label: label.to_string(),
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementSnapshot {
    Layer { name: String },
    Node(Node),
}

pub type HookLog = Arc<Mutex<Vec<String>>>;

pub fn node(id: &str) -> TargetOf<Diagram> {
    Target::new(Kind::Node, id.to_string())
}

pub fn layer(id: &str) -> TargetOf<Diagram> {
    Target::new(Kind::Layer, id.to_string())
}

/// Observable document state, compared across undo/redo.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramState {
    pub nodes: BTreeMap<String, Node>,
    pub layers: BTreeMap<String, Layer>,
    pub lookup: BTreeMap<String, String>,
    pub spatial: BTreeMap<String, (i32, i32)>,
}

pub struct Diagram {
    id: String,
    adapters: Arc<AdapterRegistry<Diagram>>,
    pub history: UndoManager<Diagram>,
    pub layers: HashMap<String, Layer>,
    pub nodes: HashMap<String, Node>,
    pub lookup: HashMap<String, String>,
    pub spatial: HashMap<String, (i32, i32)>,
    pub selection: Vec<String>,
    pub hooks: HookLog,
}

impl Diagram {
    pub fn new(id: &str, config: &HistoryConfig) -> Self {
        let hooks: HookLog = Arc::new(Mutex::new(Vec::new()));
        let adapters = AdapterRegistry::new()
            .with_adapter(
                Kind::Layer,
                LayerAdapter {
                    hooks: hooks.clone(),
                },
            )
            .with_adapter(
                Kind::Node,
                NodeAdapter {
                    hooks: hooks.clone(),
                },
            )
            .with_child_adapter(Kind::Layer, Kind::Node, LayerNodes);

        let mut layers = HashMap::new();
        layers.insert(
            "L".to_string(),
            Layer {
                name: "Layer 1".to_string(),
                children: Vec::new(),
            },
        );

        Self {
            id: id.to_string(),
            adapters: Arc::new(adapters),
            history: UndoManager::from_config(config),
            layers,
            nodes: HashMap::new(),
            lookup: HashMap::new(),
            spatial: HashMap::new(),
            selection: Vec::new(),
            hooks,
        }
    }

    pub fn state(&self) -> DiagramState {
        DiagramState {
            nodes: self.nodes.clone().into_iter().collect(),
            layers: self.layers.clone().into_iter().collect(),
            lookup: self.lookup.clone().into_iter().collect(),
            spatial: self.spatial.clone().into_iter().collect(),
        }
    }

    pub fn children(&self, layer_id: &str) -> Vec<String> {
        self.layers
            .get(layer_id)
            .map(|l| l.children.clone())
            .unwrap_or_default()
    }

    pub fn hook_calls(&self) -> Vec<String> {
        self.hooks.lock().clone()
    }

    pub fn clear_hooks(&self) {
        self.hooks.lock().clear();
    }

    fn wire(&mut self, layer_id: &str, id: &str, node: Node, index: usize) {
        self.nodes.insert(id.to_string(), node);
        self.lookup.insert(id.to_string(), layer_id.to_string());
        if let Some(layer) = self.layers.get_mut(layer_id) {
            let index = index.min(layer.children.len());
            layer.children.insert(index, id.to_string());
        }
    }

    fn unwire(&mut self, id: &str) {
        self.nodes.remove(id);
        if let Some(layer_id) = self.lookup.remove(id)
            && let Some(layer) = self.layers.get_mut(&layer_id)
        {
            layer.children.retain(|child| child != id);
        }
    }

    fn index_of(&self, id: &str) -> Option<(String, usize)> {
        let layer_id = self.lookup.get(id)?;
        let index = self.layers.get(layer_id)?.children.iter().position(|c| c == id)?;
        Some((layer_id.clone(), index))
    }

    // ---- Edits, each recorded on the supplied transaction ----

    pub fn add_node(&mut self, tx: &mut Transaction<Diagram>, layer_id: &str, id: &str, value: Node) {
        let index = self.children(layer_id).len();
        self.insert_node(tx, layer_id, id, value, index);
    }

    pub fn insert_node(
        &mut self,
        tx: &mut Transaction<Diagram>,
        layer_id: &str,
        id: &str,
        value: Node,
        index: usize,
    ) {
        tx.execute_add(self, &[node(id)], &layer(layer_id), index, |diagram, _| {
            diagram.wire(layer_id, id, value, index);
        });
    }

    pub fn remove_node(&mut self, tx: &mut Transaction<Diagram>, id: &str) {
        let Some((layer_id, index)) = self.index_of(id) else {
            panic!("node {id} is not in the diagram");
        };
        tx.execute_remove(self, node(id), layer(&layer_id), index, |diagram, _| {
            diagram.unwire(id);
        });
    }

    pub fn move_node(&mut self, tx: &mut Transaction<Diagram>, id: &str, dx: i32, dy: i32) {
        tx.execute_update(self, node(id), |diagram, _| {
            if let Some(n) = diagram.nodes.get_mut(id) {
                n.x += dx;
                n.y += dy;
            }
        });
    }

    pub fn rename_layer(&mut self, tx: &mut Transaction<Diagram>, layer_id: &str, name: &str) {
        tx.execute_update(self, layer(layer_id), |diagram, _| {
            if let Some(l) = diagram.layers.get_mut(layer_id) {
                l.name = name.to_string();
            }
        });
    }
}

impl Document for Diagram {
    type Kind = Kind;
    type Id = String;
    type Snapshot = ElementSnapshot;

    fn document_id(&self) -> &str {
        &self.id
    }

    fn adapters(&self) -> Arc<AdapterRegistry<Self>> {
        self.adapters.clone()
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

// ============================================================================
// Adapters
// ============================================================================

fn record(hooks: &HookLog, hook: &str, kind: Kind, ops: &[OperationOf<Diagram>]) {
    hooks.lock().push(format!("{hook}:{kind:?}:{}", ops.len()));
}

struct NodeAdapter {
    hooks: HookLog,
}

impl Adapter<Diagram> for NodeAdapter {
    fn snapshot(&self, doc: &Diagram, id: &String) -> Option<ElementSnapshot> {
        doc.nodes.get(id).cloned().map(ElementSnapshot::Node)
    }

    fn restore(
        &self,
        doc: &mut Diagram,
        id: &String,
        snapshot: &ElementSnapshot,
        tx: &mut Transaction<Diagram>,
    ) -> UowResult {
        let ElementSnapshot::Node(value) = snapshot else {
            return Err(UowError::InvalidState(format!("expected a node snapshot for {id}")));
        };
        tx.snapshot(doc, &node(id));
        let live = doc
            .nodes
            .get_mut(id)
            .ok_or_else(|| UowError::TargetNotFound(id.clone()))?;
        *live = value.clone();
        tx.update_element(doc, node(id));
        Ok(())
    }

    /// Keeps the spatial index in step with every node operation.
    fn on_notify(&self, doc: &mut Diagram, ops: &[OperationOf<Diagram>], _tx: &Transaction<Diagram>) {
        record(&self.hooks, "notify", Kind::Node, ops);
        for op in ops {
            let id = &op.target().id;
            match doc.nodes.get(id) {
                Some(n) => {
                    doc.spatial.insert(id.clone(), (n.x, n.y));
                }
                None => {
                    doc.spatial.remove(id);
                }
            }
        }
    }

    fn on_before_commit(&self, _doc: &mut Diagram, ops: &[OperationOf<Diagram>], _tx: &Transaction<Diagram>) {
        record(&self.hooks, "before", Kind::Node, ops);
    }

    fn on_after_commit(&self, _doc: &mut Diagram, ops: &[OperationOf<Diagram>], _tx: &Transaction<Diagram>) {
        record(&self.hooks, "after", Kind::Node, ops);
    }
}

struct LayerAdapter {
    hooks: HookLog,
}

impl Adapter<Diagram> for LayerAdapter {
    fn snapshot(&self, doc: &Diagram, id: &String) -> Option<ElementSnapshot> {
        doc.layers.get(id).map(|l| ElementSnapshot::Layer {
            name: l.name.clone(),
        })
    }

    fn restore(
        &self,
        doc: &mut Diagram,
        id: &String,
        snapshot: &ElementSnapshot,
        _tx: &mut Transaction<Diagram>,
    ) -> UowResult {
        let ElementSnapshot::Layer { name } = snapshot else {
            return Err(UowError::InvalidState(format!("expected a layer snapshot for {id}")));
        };
        let live = doc
            .layers
            .get_mut(id)
            .ok_or_else(|| UowError::TargetNotFound(id.clone()))?;
        live.name = name.clone();
        Ok(())
    }

    fn on_notify(&self, _doc: &mut Diagram, ops: &[OperationOf<Diagram>], _tx: &Transaction<Diagram>) {
        record(&self.hooks, "notify", Kind::Layer, ops);
    }

    fn on_before_commit(&self, _doc: &mut Diagram, ops: &[OperationOf<Diagram>], _tx: &Transaction<Diagram>) {
        record(&self.hooks, "before", Kind::Layer, ops);
    }

    fn on_after_commit(&self, _doc: &mut Diagram, ops: &[OperationOf<Diagram>], _tx: &Transaction<Diagram>) {
        record(&self.hooks, "after", Kind::Layer, ops);
    }
}

struct LayerNodes;

impl ChildAdapter<Diagram> for LayerNodes {
    fn add(
        &self,
        doc: &mut Diagram,
        parent: &String,
        child: &String,
        snapshot: &ElementSnapshot,
        index: usize,
        tx: &mut Transaction<Diagram>,
    ) -> UowResult {
        let ElementSnapshot::Node(value) = snapshot else {
            return Err(UowError::InvalidState(format!("expected a node snapshot for {child}")));
        };
        if !doc.layers.contains_key(parent) {
            return Err(UowError::TargetNotFound(parent.clone()));
        }
        doc.wire(parent, child, value.clone(), index);
        tx.add_element(doc, node(child), layer(parent), index);
        Ok(())
    }

    fn remove(
        &self,
        doc: &mut Diagram,
        parent: &String,
        child: &String,
        tx: &mut Transaction<Diagram>,
    ) -> UowResult {
        let (_, index) = doc
            .index_of(child)
            .ok_or_else(|| UowError::TargetNotFound(child.clone()))?;
        tx.remove_element(doc, node(child), layer(parent), index);
        doc.unwire(child);
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

#[fixture]
pub fn diagram() -> Diagram {
    init_logging();
    Diagram::new("diagram-1", &HistoryConfig::default())
}

/// A diagram holding nodes `A`, `B`, `C` in layer `L`, with empty history.
#[fixture]
pub fn abc(diagram: Diagram) -> Diagram {
    let mut diagram = diagram;
    Transaction::execute(&mut diagram, |diagram, tx| {
        diagram.add_node(tx, "L", "A", Node::at("A", 0, 0));
        diagram.add_node(tx, "L", "B", Node::at("B", 10, 0));
        diagram.add_node(tx, "L", "C", Node::at("C", 20, 0));
    });
    diagram.clear_hooks();
    diagram
}
