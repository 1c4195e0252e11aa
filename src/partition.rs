//! Module partitioning: group labelled records into modules.
//!
//! A record with several labels appears in several modules. The module sets
//! hold node indices into the shared graph, so nothing is duplicated until
//! serialization.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::NodeIndex;

use crate::graph::{ModuleLabel, XmiGraph};

/// Module label to member records, members in document order.
pub type Modules = BTreeMap<ModuleLabel, Vec<NodeIndex>>;

/// Group the graph's records by label, keeping only the requested modules.
///
/// Placeholder nodes of dangling references never become members.
pub fn partition(graph: &XmiGraph, requested: &BTreeSet<ModuleLabel>) -> Modules {
    let mut modules = Modules::new();
    for idx in graph.node_indices() {
        let node = graph.node(idx);
        if !node.is_materialized() {
            continue;
        }
        for label in node.labels.iter().filter(|l| requested.contains(*l)) {
            modules.entry(label.clone()).or_default().push(idx);
        }
    }

    for (label, members) in modules.iter_mut() {
        members.sort_by_key(|&idx| {
            graph
                .node(idx)
                .record
                .as_ref()
                .map_or(usize::MAX, |r| r.byte_offset())
        });
        tracing::debug!(module = %label, records = members.len(), "partitioned module");
    }

    modules
}
