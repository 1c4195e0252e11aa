//! Splitter facade: one document in, independently storable modules out.
//!
//! A [`XmiSplitter`] holds only validated configuration. Everything a call
//! works on (the record graph, module grouping, reserved identifiers, the
//! updated Sofa map) lives in a [`SplitContext`] created at the start of
//! [`XmiSplitter::process`] and dropped at its end, so one splitter can be
//! shared freely between threads.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::alloc::IdAllocator;
use crate::catalog::TypeCatalog;
use crate::config::SplitterConfig;
use crate::document::XmiDocument;
use crate::error::{SplitError, SplitterResult};
use crate::graph::{ModuleLabel, XmiGraph, XmiId, build_graph};
use crate::label::{LabelRules, label_nodes};
use crate::partition::{Modules, partition};
use crate::serialize::{ModuleOutput, SerializeOptions, serialize_modules};
use crate::sofa::{SofaIdMap, reconcile_sofas};

/// Everything a split call produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResult {
    /// Module contents in module order.
    pub modules: Vec<ModuleOutput>,
    /// First identifier the next call may allocate from.
    pub next_free_id: XmiId,
    /// Namespace prefix to URI, needed to reassemble a full document.
    pub namespaces: BTreeMap<String, String>,
    /// Updated Sofa identity map to persist for the next call.
    pub sofa_ids: SofaIdMap,
}

impl SplitResult {
    /// Module output by name.
    pub fn module(&self, name: &str) -> Option<&ModuleOutput> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// The state to carry into the next call for the same document.
    pub fn state(&self) -> SplitState {
        SplitState {
            next_free_id: self.next_free_id,
            sofa_ids: self.sofa_ids.clone(),
            namespaces: self.namespaces.clone(),
        }
    }
}

/// Caller-owned state threaded from one call to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitState {
    pub next_free_id: XmiId,
    #[serde(default)]
    pub sofa_ids: SofaIdMap,
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
}

/// Scratch state of one `process` call.
#[derive(Debug)]
pub struct SplitContext {
    pub graph: XmiGraph,
    pub modules: Modules,
    pub alloc: IdAllocator,
    pub sofa_ids: SofaIdMap,
}

impl SplitContext {
    fn new(graph: XmiGraph, next_free_id: XmiId, sofa_ids: SofaIdMap) -> Self {
        Self {
            graph,
            modules: Modules::new(),
            alloc: IdAllocator::starting_from(next_free_id),
            sofa_ids,
        }
    }
}

/// Splits XMI documents into annotation modules.
#[derive(Debug, Clone)]
pub struct XmiSplitter {
    config: SplitterConfig,
    module_types: BTreeSet<String>,
    base_document_types: BTreeSet<String>,
    requested: BTreeSet<ModuleLabel>,
}

impl XmiSplitter {
    /// Create a splitter, rejecting inconsistent configurations.
    pub fn new(config: SplitterConfig) -> SplitterResult<Self> {
        let module_types: BTreeSet<String> = config.module_types.iter().cloned().collect();
        let base_document_types: BTreeSet<String> =
            config.base_document_types.iter().cloned().collect();

        let overlap: Vec<String> = module_types
            .intersection(&base_document_types)
            .cloned()
            .collect();
        if !overlap.is_empty() {
            return Err(SplitError::Configuration { overlap });
        }
        if config.store_base_document && module_types.contains(&config.document_module_name) {
            return Err(SplitError::ModuleNameClash {
                name: config.document_module_name.clone(),
            });
        }

        let mut requested: BTreeSet<ModuleLabel> = module_types
            .iter()
            .map(|t| ModuleLabel::for_type(t.as_str()))
            .collect();
        if config.store_base_document {
            requested.insert(ModuleLabel::BaseDocument);
        }

        Ok(Self {
            config,
            module_types,
            base_document_types,
            requested,
        })
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Labels of the modules this splitter materializes.
    pub fn requested_modules(&self) -> &BTreeSet<ModuleLabel> {
        &self.requested
    }

    /// Split one document.
    ///
    /// `next_free_id` is the lowest identifier this call may hand out and
    /// `sofa_ids` the map returned by the previous call for the same document
    /// (`None` on the first call). The call either returns a complete result
    /// or fails without output.
    pub fn process<C>(
        &self,
        xmi: &[u8],
        catalog: &C,
        next_free_id: XmiId,
        sofa_ids: Option<&SofaIdMap>,
    ) -> SplitterResult<SplitResult>
    where
        C: TypeCatalog + ?Sized,
    {
        let doc = XmiDocument::parse(xmi)?;
        let graph = build_graph(&doc, catalog)?;
        let mut ctx = SplitContext::new(graph, next_free_id, sofa_ids.cloned().unwrap_or_default());

        label_nodes(&mut ctx.graph, &self.label_rules());
        ctx.modules = partition(&ctx.graph, &self.requested);
        reconcile_sofas(
            &mut ctx.graph,
            &mut ctx.sofa_ids,
            self.config.store_base_document,
            &mut ctx.alloc,
        );
        let modules = serialize_modules(
            &doc,
            &mut ctx.graph,
            &ctx.modules,
            &mut ctx.alloc,
            &SerializeOptions {
                document_module_name: &self.config.document_module_name,
                store_base_document: self.config.store_base_document,
            },
        )?;

        tracing::info!(
            modules = modules.len(),
            records = modules.iter().map(|m| m.records).sum::<usize>(),
            first_id = next_free_id,
            next_free_id = ctx.alloc.next_free(),
            "split document"
        );

        Ok(SplitResult {
            modules,
            next_free_id: ctx.alloc.next_free(),
            namespaces: doc.namespaces().clone(),
            sofa_ids: ctx.sofa_ids,
        })
    }

    /// Split one document, continuing from a previous call's state.
    pub fn process_with_state<C>(
        &self,
        xmi: &[u8],
        catalog: &C,
        state: &SplitState,
    ) -> SplitterResult<SplitResult>
    where
        C: TypeCatalog + ?Sized,
    {
        self.process(xmi, catalog, state.next_free_id, Some(&state.sofa_ids))
    }

    fn label_rules(&self) -> LabelRules<'_> {
        LabelRules {
            module_types: &self.module_types,
            base_document_types: &self.base_document_types,
            store_base_document: self.config.store_base_document,
            recursive: self.config.recursive,
        }
    }
}
