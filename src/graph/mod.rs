//! Reference graph over the records of one XMI document.
//!
//! Nodes live in a `petgraph` arena and are addressed by their original
//! `xmi:id` through a side index. Edges run from a referenced record back to
//! the record that references it, so walking outgoing edges of a node visits
//! its *predecessors*: the records that pull it into their modules. Edges never
//! imply ownership; cycles in the reference structure are harmless.
//!
//! Sofa records are additionally enumerated under synthetic negative keys
//! starting at [`SofaKey::FIRST`], in document order.

pub mod build;
pub mod node;
pub mod references;

use std::collections::{BTreeMap, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

pub use build::build_graph;
pub use node::{
    GraphNode, ModuleLabel, RecordInfo, ReferenceAttr, SofaBinding, SofaInfo, SofaStatus,
};
pub use references::references;

/// A record identifier as it appears in `xmi:id` and reference attributes.
pub type XmiId = u64;

/// Synthetic key enumerating the Sofas of a document.
///
/// Keys are strictly decreasing from −2 and never collide with identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SofaKey(i64);

impl SofaKey {
    /// Key of the first Sofa in document order.
    pub const FIRST: SofaKey = SofaKey(-2);

    /// The key following this one.
    pub fn next(self) -> Self {
        SofaKey(self.0 - 1)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

/// The record graph of one document.
#[derive(Debug, Clone)]
pub struct XmiGraph {
    graph: DiGraph<GraphNode, ()>,
    by_id: HashMap<XmiId, NodeIndex>,
    sofas: BTreeMap<SofaKey, NodeIndex>,
    next_sofa_key: SofaKey,
}

impl Default for XmiGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl XmiGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            by_id: HashMap::new(),
            sofas: BTreeMap::new(),
            next_sofa_key: SofaKey::FIRST,
        }
    }

    /// Fetch the node for an identifier, creating a placeholder if needed.
    pub fn ensure_node(&mut self, id: XmiId) -> NodeIndex {
        if let Some(&idx) = self.by_id.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::placeholder(id));
        self.by_id.insert(id, idx);
        idx
    }

    /// Record that `referrer` references `target`.
    ///
    /// Self references are ignored and duplicate edges are collapsed.
    pub fn add_predecessor(&mut self, target: NodeIndex, referrer: NodeIndex) {
        if target != referrer {
            self.graph.update_edge(target, referrer, ());
        }
    }

    /// Enumerate a Sofa node under the next synthetic key.
    pub fn register_sofa(&mut self, idx: NodeIndex) -> SofaKey {
        let key = self.next_sofa_key;
        self.sofas.insert(key, idx);
        self.next_sofa_key = key.next();
        key
    }

    /// The Sofa node registered under a synthetic key.
    pub fn sofa(&self, key: SofaKey) -> Option<NodeIndex> {
        self.sofas.get(&key).copied()
    }

    /// Number of Sofas in the document.
    pub fn sofa_count(&self) -> usize {
        self.sofas.len()
    }

    pub fn index_of(&self, id: XmiId) -> Option<NodeIndex> {
        self.by_id.get(&id).copied()
    }

    /// Node by original identifier.
    pub fn get(&self, id: XmiId) -> Option<&GraphNode> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut GraphNode {
        &mut self.graph[idx]
    }

    /// Records that reference the given node.
    pub fn predecessors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Outgoing)
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    /// All nodes, placeholders included.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of reference edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
