//! Module label propagation.
//!
//! Membership starts from type interest: a record whose type is one of the
//! configured module types is labelled with that type, a record whose type
//! belongs to the base document gets the base-document label. Every other
//! record inherits the union of the labels of the records that reference it,
//! so supporting structures end up in the same module as the annotation that
//! needs them.
//!
//! Inheritance follows predecessor edges with an explicit stack. The result
//! for a node is the union of the fixed labels reachable through inheriting
//! nodes, which is well defined on cyclic graphs and independent of visiting
//! order.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::graph::NodeIndex;

use crate::graph::{GraphNode, ModuleLabel, XmiGraph};

/// Configuration of the label rules for one call.
#[derive(Debug, Clone, Copy)]
pub struct LabelRules<'a> {
    /// Types that form their own module.
    pub module_types: &'a BTreeSet<String>,
    /// Types stored with the base document when it is captured.
    pub base_document_types: &'a BTreeSet<String>,
    pub store_base_document: bool,
    /// Whether annotations outside both sets inherit labels from referrers.
    pub recursive: bool,
}

enum Rule {
    Fixed(BTreeSet<ModuleLabel>),
    Inherit,
}

impl LabelRules<'_> {
    fn rule_for(&self, node: &GraphNode) -> Rule {
        if !node.labels.is_empty() {
            return Rule::Fixed(node.labels.clone());
        }
        let Some(record) = &node.record else {
            return Rule::Fixed(BTreeSet::new());
        };

        if record.is_annotation() {
            if self.module_types.contains(&record.type_name) {
                Rule::Fixed(BTreeSet::from([ModuleLabel::for_type(&record.type_name)]))
            } else if self.store_base_document
                && self.base_document_types.contains(&record.type_name)
            {
                Rule::Fixed(BTreeSet::from([ModuleLabel::BaseDocument]))
            } else if self.recursive {
                Rule::Inherit
            } else {
                Rule::Fixed(BTreeSet::new())
            }
        } else if record.is_sofa() {
            // Sofas reach modules only through the base document.
            if self.store_base_document {
                Rule::Fixed(BTreeSet::from([ModuleLabel::BaseDocument]))
            } else {
                Rule::Fixed(BTreeSet::new())
            }
        } else {
            Rule::Inherit
        }
    }
}

/// Assign module labels to every node of the graph.
///
/// Nodes that already carry labels keep them, so running this twice on the
/// same graph changes nothing.
pub fn label_nodes(graph: &mut XmiGraph, rules: &LabelRules<'_>) {
    let mut memo: HashMap<NodeIndex, BTreeSet<ModuleLabel>> = HashMap::new();
    let indices: Vec<_> = graph.node_indices().collect();
    for &idx in &indices {
        resolve(graph, idx, rules, &mut memo);
    }

    let mut labelled = 0usize;
    for (idx, labels) in memo {
        if !labels.is_empty() {
            labelled += 1;
        }
        graph.node_mut(idx).labels = labels;
    }
    tracing::debug!(nodes = indices.len(), labelled, "assigned module labels");
}

fn resolve(
    graph: &XmiGraph,
    start: NodeIndex,
    rules: &LabelRules<'_>,
    memo: &mut HashMap<NodeIndex, BTreeSet<ModuleLabel>>,
) -> BTreeSet<ModuleLabel> {
    if let Some(labels) = memo.get(&start) {
        return labels.clone();
    }
    if let Rule::Fixed(labels) = rules.rule_for(graph.node(start)) {
        memo.insert(start, labels.clone());
        return labels;
    }

    let mut labels = BTreeSet::new();
    let mut visited = HashSet::from([start]);
    let mut stack: Vec<NodeIndex> = graph.predecessors(start).collect();
    while let Some(idx) = stack.pop() {
        if !visited.insert(idx) {
            continue;
        }
        // Memoized entries are complete closures; no need to expand them.
        if let Some(known) = memo.get(&idx) {
            labels.extend(known.iter().cloned());
            continue;
        }
        match rules.rule_for(graph.node(idx)) {
            Rule::Fixed(fixed) => {
                labels.extend(fixed.iter().cloned());
                memo.insert(idx, fixed);
            }
            Rule::Inherit => stack.extend(graph.predecessors(idx)),
        }
    }

    memo.insert(start, labels.clone());
    labels
}
