//! Sofa reconciliation.
//!
//! A document may be split many times over its lifetime as new annotation
//! modules are added. Every stored record refers to its Sofa by numeric
//! identifier, so a Sofa's identifier has to stay fixed once it has been
//! written. The caller owns a map from each Sofa's durable `sofaID` to the
//! identifier it was stored under and threads it through every call.

use std::collections::{BTreeMap, BTreeSet};

use crate::alloc::IdAllocator;
use crate::graph::{SofaKey, SofaStatus, XmiGraph, XmiId};

/// Durable Sofa identity (`sofaID`) to committed identifier.
pub type SofaIdMap = BTreeMap<String, XmiId>;

/// Resolve every Sofa of the graph against the persistent map.
///
/// Known Sofas reuse their committed identifier. Unknown Sofas are committed
/// under their identifier in this document when the base document is being
/// stored, or marked [`SofaStatus::Unresolved`] otherwise. Every resolved
/// identifier is reserved in the allocator.
pub fn reconcile_sofas(
    graph: &mut XmiGraph,
    sofa_ids: &mut SofaIdMap,
    store_base_document: bool,
    alloc: &mut IdAllocator,
) {
    let committed: BTreeSet<XmiId> = sofa_ids.values().copied().collect();
    for &id in &committed {
        alloc.reserve(id);
    }

    let mut key = SofaKey::FIRST;
    while let Some(idx) = graph.sofa(key) {
        key = key.next();
        let node = graph.node_mut(idx);
        let old_id = node.old_id;
        let Some(info) = node.sofa_info.as_mut() else {
            continue;
        };

        let status = match sofa_ids.get(&info.sofa_id) {
            Some(&id) => SofaStatus::Resolved(id),
            None if store_base_document => {
                // The document's own identifier unless another Sofa already owns it.
                let id = if alloc.reserve(old_id) {
                    old_id
                } else {
                    let fresh = alloc.allocate();
                    tracing::warn!(
                        sofa_id = %info.sofa_id,
                        old_id,
                        fresh,
                        "Sofa identifier already taken, assigning a fresh one"
                    );
                    fresh
                };
                sofa_ids.insert(info.sofa_id.clone(), id);
                SofaStatus::Resolved(id)
            }
            None => SofaStatus::Unresolved,
        };

        info.status = status;
        match status {
            SofaStatus::Resolved(id) => {
                alloc.reserve(id);
                node.new_id = Some(id);
                tracing::debug!(sofa_id = %info.sofa_id, old_id, id, "resolved Sofa");
            }
            _ => {
                tracing::debug!(sofa_id = %info.sofa_id, old_id, "Sofa is not stored");
            }
        }
    }
}
