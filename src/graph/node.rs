//! Graph node types.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::catalog::{CAS_NULL, CAS_SOFA, CAS_VIEW};

use super::XmiId;

/// Which module a node belongs to.
///
/// The base document is a reserved label that can never collide with a
/// user-supplied type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleLabel {
    /// Structural records stored with the document itself.
    BaseDocument,
    /// Records of interest to an annotation module named after a type.
    Type(String),
}

impl ModuleLabel {
    pub fn for_type(type_name: impl Into<String>) -> Self {
        Self::Type(type_name.into())
    }
}

impl fmt::Display for ModuleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BaseDocument => write!(f, "<base document>"),
            Self::Type(name) => write!(f, "{name}"),
        }
    }
}

/// A record's binding to a base-text stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SofaBinding {
    /// The record was only seen as a reference target so far.
    Unknown,
    /// The record carries no `sofa` attribute.
    NoSofa,
    /// The record is anchored to the Sofa with this original identifier.
    Bound(XmiId),
}

/// Outcome of Sofa reconciliation for one Sofa record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SofaStatus {
    /// Not reconciled yet.
    Pending,
    /// Stored (now or earlier) under this identifier.
    Resolved(XmiId),
    /// Present in this document but neither stored nor to be stored.
    Unresolved,
}

/// Extra state of a base-text record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SofaInfo {
    /// Durable identity of the Sofa across calls (its `sofaID`).
    pub sofa_id: String,
    pub status: SofaStatus,
}

/// One reference-valued attribute of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAttr {
    /// Attribute (feature) name.
    pub attribute: String,
    /// Referenced identifiers in attribute order.
    pub targets: Vec<XmiId>,
}

/// The parts of a node known only once its own record has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInfo {
    /// Fully qualified type name.
    pub type_name: String,
    /// Location of the serialized record in the source buffer.
    pub span: Range<usize>,
    /// Outgoing references.
    pub references: Vec<ReferenceAttr>,
}

impl RecordInfo {
    pub fn byte_offset(&self) -> usize {
        self.span.start
    }

    pub fn byte_length(&self) -> usize {
        self.span.len()
    }

    /// The null marker or a view: structural records without module semantics.
    pub fn is_structural(&self) -> bool {
        self.type_name == CAS_NULL || self.type_name == CAS_VIEW
    }

    pub fn is_sofa(&self) -> bool {
        self.type_name == CAS_SOFA
    }

    /// A genuine annotation-like record that can anchor a module.
    pub fn is_annotation(&self) -> bool {
        !self.is_structural() && !self.is_sofa()
    }
}

/// One record of the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// Identifier in the source document.
    pub old_id: XmiId,
    /// Identifier assigned during serialization.
    pub new_id: Option<XmiId>,
    /// `None` while the node is a dangling reference target.
    pub record: Option<RecordInfo>,
    pub sofa: SofaBinding,
    /// `Some` for base-text records.
    pub sofa_info: Option<SofaInfo>,
    /// Modules this node has been assigned to.
    pub labels: BTreeSet<ModuleLabel>,
}

impl GraphNode {
    /// A node known only by identifier.
    pub fn placeholder(old_id: XmiId) -> Self {
        Self {
            old_id,
            new_id: None,
            record: None,
            sofa: SofaBinding::Unknown,
            sofa_info: None,
            labels: BTreeSet::new(),
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.type_name.as_str())
    }

    pub fn is_sofa(&self) -> bool {
        self.sofa_info.is_some()
    }

    /// Whether the node's own record was encountered.
    pub fn is_materialized(&self) -> bool {
        self.record.is_some()
    }

    /// Reconciled identifier of a Sofa node.
    pub fn resolved_sofa_id(&self) -> Option<XmiId> {
        match self.sofa_info.as_ref()?.status {
            SofaStatus::Resolved(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(type_name: &str) -> RecordInfo {
        RecordInfo {
            type_name: type_name.into(),
            span: 10..25,
            references: Vec::new(),
        }
    }

    #[test]
    fn record_classification() {
        assert!(record(CAS_NULL).is_structural());
        assert!(record(CAS_VIEW).is_structural());
        assert!(record(CAS_SOFA).is_sofa());
        assert!(!record(CAS_SOFA).is_annotation());
        assert!(record("a.Gene").is_annotation());
    }

    #[test]
    fn span_accessors() {
        let r = record("a.Gene");
        assert_eq!(r.byte_offset(), 10);
        assert_eq!(r.byte_length(), 15);
    }

    #[test]
    fn base_document_label_sorts_first() {
        let mut labels = BTreeSet::new();
        labels.insert(ModuleLabel::for_type("a.Gene"));
        labels.insert(ModuleLabel::BaseDocument);
        assert_eq!(labels.iter().next(), Some(&ModuleLabel::BaseDocument));
    }

    #[test]
    fn placeholder_is_not_materialized() {
        let node = GraphNode::placeholder(7);
        assert!(!node.is_materialized());
        assert_eq!(node.sofa, SofaBinding::Unknown);
        assert_eq!(node.resolved_sofa_id(), None);
    }
}
