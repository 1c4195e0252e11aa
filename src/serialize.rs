//! Identifier assignment and module serialization.
//!
//! Records are emitted as the exact bytes they occupied in the source, with
//! identifier-valued attributes of the start tag rewritten by text
//! substitution. Everything else in a record, nested content included, is
//! left byte-identical.
//!
//! Identifiers are assigned for all modules before any bytes are written, so
//! a reference from one module to a record in another resolves to the
//! identifier that record was stored under in this call.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::alloc::IdAllocator;
use crate::document::{SOFA_ATTR, XmiDocument};
use crate::error::{SplitError, SplitterResult};
use crate::graph::{GraphNode, ModuleLabel, SofaBinding, SofaStatus, XmiGraph, XmiId};
use crate::partition::Modules;

static XMI_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\s)xmi:id="[0-9]+""#).unwrap());
static SOFA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(\s)sofa="[0-9]+""#).unwrap());

/// Serialized content of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutput {
    /// Output name: the module type, or the base document module's name.
    pub name: String,
    pub label: ModuleLabel,
    /// Concatenated record fragments.
    pub data: Vec<u8>,
    /// Number of records in `data`.
    pub records: usize,
}

/// Settings the serializer needs from the splitter configuration.
#[derive(Debug, Clone, Copy)]
pub struct SerializeOptions<'a> {
    pub document_module_name: &'a str,
    pub store_base_document: bool,
}

/// Assign identifiers to all module members and write the modules.
///
/// A record stored in several modules gets a separate identifier in each. A
/// reference from one module to a record stored only elsewhere resolves to
/// the record's first stored copy in module order.
///
/// Fails with [`SplitError::UnresolvableSofaReference`] before producing any
/// output if a module holds a record bound to a Sofa that is not stored.
pub fn serialize_modules(
    doc: &XmiDocument<'_>,
    graph: &mut XmiGraph,
    modules: &Modules,
    alloc: &mut IdAllocator,
    options: &SerializeOptions<'_>,
) -> SplitterResult<Vec<ModuleOutput>> {
    let mut assigned: Vec<(&ModuleLabel, String, HashMap<XmiId, XmiId>)> = Vec::new();
    let mut issued = HashSet::new();

    for (label, members) in modules {
        if *label == ModuleLabel::BaseDocument && !options.store_base_document {
            continue;
        }
        let name = match label {
            ModuleLabel::BaseDocument => options.document_module_name.to_string(),
            ModuleLabel::Type(name) => name.clone(),
        };

        let mut module_ids = HashMap::with_capacity(members.len());
        for &idx in members {
            check_sofa(graph, graph.node(idx), &name)?;
            let node = graph.node_mut(idx);
            let new_id = match node.resolved_sofa_id() {
                Some(id) => id,
                None => alloc.allocate(),
            };
            // First copy wins; later modules keep their own ids in `module_ids`.
            if node.new_id.is_none() {
                node.new_id = Some(new_id);
            }
            module_ids.insert(node.old_id, new_id);
            issued.insert(new_id);
        }
        assigned.push((label, name, module_ids));
    }
    issued.extend(graph.nodes().filter_map(GraphNode::resolved_sofa_id));

    let mut outputs = Vec::with_capacity(assigned.len());
    for (label, name, module_ids) in assigned {
        let mut rewriter = Rewriter::new(&module_ids, &issued);
        let members = &modules[label];
        let mut data = Vec::new();
        for &idx in members {
            let node = graph.node(idx);
            let Some(record) = &node.record else {
                continue;
            };
            let fragment = doc.fragment(&record.span);
            let rewritten = rewriter.rewrite(fragment, node, graph);
            data.extend_from_slice(rewritten.as_bytes());
        }
        tracing::debug!(
            module = %name,
            records = members.len(),
            bytes = data.len(),
            stale_references = rewriter.stale,
            "serialized module"
        );
        outputs.push(ModuleOutput {
            name,
            label: label.clone(),
            data,
            records: members.len(),
        });
    }

    Ok(outputs)
}

fn check_sofa(graph: &XmiGraph, node: &GraphNode, module: &str) -> SplitterResult<()> {
    let SofaBinding::Bound(sofa) = node.sofa else {
        return Ok(());
    };
    let unresolved = graph
        .get(sofa)
        .and_then(|s| s.sofa_info.as_ref())
        .is_some_and(|info| info.status == SofaStatus::Unresolved);
    if unresolved {
        return Err(SplitError::UnresolvableSofaReference {
            module: module.to_string(),
            record: node.old_id,
            sofa,
        });
    }
    Ok(())
}

/// Start-tag rewriting for the records of one module.
struct Rewriter<'a> {
    /// Source identifier to identifier within this module.
    module_ids: &'a HashMap<XmiId, XmiId>,
    /// Every identifier handed out or reused in this call.
    issued: &'a HashSet<XmiId>,
    patterns: HashMap<String, Regex>,
    /// References left at a source identifier that now names another record.
    stale: usize,
}

impl<'a> Rewriter<'a> {
    fn new(module_ids: &'a HashMap<XmiId, XmiId>, issued: &'a HashSet<XmiId>) -> Self {
        Self {
            module_ids,
            issued,
            patterns: HashMap::new(),
            stale: 0,
        }
    }

    fn rewrite(&mut self, fragment: &str, node: &GraphNode, graph: &XmiGraph) -> String {
        let (head, tail) = fragment.split_at(start_tag_len(fragment));
        let mut head = head.to_string();

        if let Some(&new_id) = self.module_ids.get(&node.old_id) {
            head = replace_value(&XMI_ID_RE, &head, "xmi:id", &new_id.to_string());
        }

        if let SofaBinding::Bound(sofa) = node.sofa {
            match graph.get(sofa).and_then(GraphNode::resolved_sofa_id) {
                Some(new_sofa) => {
                    head = replace_value(&SOFA_RE, &head, SOFA_ATTR, &new_sofa.to_string());
                }
                None => tracing::warn!(
                    record = node.old_id,
                    sofa,
                    "sofa attribute does not point at a stored Sofa, left unchanged"
                ),
            }
        }

        if let Some(record) = &node.record {
            for attr in record.references.iter().filter(|a| a.attribute != SOFA_ATTR) {
                let targets: Vec<XmiId> = attr
                    .targets
                    .iter()
                    .map(|&target| self.resolve(node, &attr.attribute, target, graph))
                    .collect();
                if targets == attr.targets {
                    continue;
                }
                let value = targets
                    .iter()
                    .map(XmiId::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                if let Some(pattern) = self.pattern(&attr.attribute) {
                    head = replace_value(pattern, &head, &attr.attribute, &value);
                }
            }
        }

        head.push_str(tail);
        head
    }

    /// New identifier of a referenced record: its copy in this module, else
    /// its first stored copy, else the source identifier.
    fn resolve(
        &mut self,
        node: &GraphNode,
        attribute: &str,
        target: XmiId,
        graph: &XmiGraph,
    ) -> XmiId {
        if let Some(&id) = self.module_ids.get(&target) {
            return id;
        }
        if let Some(id) = graph.get(target).and_then(|n| n.new_id) {
            return id;
        }
        if self.issued.contains(&target) {
            self.stale += 1;
            tracing::warn!(
                record = node.old_id,
                attribute,
                target,
                "referenced record is not stored and its source id now names another record"
            );
        }
        target
    }

    fn pattern(&mut self, attribute: &str) -> Option<&Regex> {
        if !self.patterns.contains_key(attribute) {
            let source = format!(r#"(\s){}="[^"]*""#, regex::escape(attribute));
            match Regex::new(&source) {
                Ok(re) => {
                    self.patterns.insert(attribute.to_string(), re);
                }
                Err(e) => {
                    tracing::warn!(attribute, error = %e, "cannot build attribute pattern");
                    return None;
                }
            }
        }
        self.patterns.get(attribute)
    }
}

fn replace_value(pattern: &Regex, text: &str, attribute: &str, value: &str) -> String {
    pattern
        .replacen(text, 1, |caps: &Captures<'_>| {
            format!("{}{attribute}=\"{value}\"", &caps[1])
        })
        .into_owned()
}

/// Length of the start tag of a fragment, `>` included.
///
/// Quoted attribute values may contain `>`.
fn start_tag_len(fragment: &str) -> usize {
    let mut quote: Option<u8> = None;
    for (i, &b) in fragment.as_bytes().iter().enumerate() {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return i + 1,
            _ => {}
        }
    }
    fragment.len()
}
