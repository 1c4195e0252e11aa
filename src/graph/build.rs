//! Graph construction from a parsed document.

use crate::catalog::{CAS_SOFA, TypeCatalog};
use crate::document::{SOFA_ID_ATTR, XmiDocument};
use crate::error::{FormatError, FormatResult};

use super::references::referenced_ids;
use super::{RecordInfo, SofaBinding, SofaInfo, SofaStatus, XmiGraph, references};

/// Build the reference graph of a document in one forward pass.
///
/// Every element carrying an `xmi:id` becomes a node. Referenced identifiers
/// get a node even if their record never shows up; such dangling nodes stay
/// unmaterialized and are never labelled or emitted.
pub fn build_graph<C>(doc: &XmiDocument<'_>, catalog: &C) -> FormatResult<XmiGraph>
where
    C: TypeCatalog + ?Sized,
{
    let mut graph = XmiGraph::new();

    for record in doc.records() {
        let Some(id) = record.xmi_id()? else {
            continue;
        };
        let type_name = doc.type_name(record)?;
        let idx = graph.ensure_node(id);
        if graph.node(idx).is_materialized() {
            return Err(FormatError::DuplicateId { id });
        }

        let sofa = match record.sofa_ref()? {
            Some(sofa) => SofaBinding::Bound(sofa),
            None => SofaBinding::NoSofa,
        };
        let refs = references(record, &type_name, catalog);
        for target in referenced_ids(&refs).collect::<Vec<_>>() {
            let target = graph.ensure_node(target);
            graph.add_predecessor(target, idx);
        }

        let sofa_info = if type_name == CAS_SOFA {
            let sofa_id = record
                .attribute(SOFA_ID_ATTR)
                .ok_or(FormatError::MissingSofaId { id })?;
            Some(SofaInfo {
                sofa_id: sofa_id.to_string(),
                status: SofaStatus::Pending,
            })
        } else {
            None
        };
        let is_sofa = sofa_info.is_some();

        let node = graph.node_mut(idx);
        node.record = Some(RecordInfo {
            type_name,
            span: record.span.clone(),
            references: refs,
        });
        node.sofa = sofa;
        node.sofa_info = sofa_info;

        if is_sofa {
            graph.register_sofa(idx);
        }
    }

    let dangling: Vec<_> = graph
        .nodes()
        .filter(|n| !n.is_materialized())
        .map(|n| n.old_id)
        .collect();
    if !dangling.is_empty() {
        tracing::warn!(
            count = dangling.len(),
            ids = ?dangling,
            "document references records it does not contain"
        );
    }
    tracing::debug!(
        nodes = graph.len(),
        edges = graph.edge_count(),
        sofas = graph.sofa_count(),
        "built record graph"
    );

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FeatureRange, StaticTypeCatalog, TypeDescription};
    use crate::graph::SofaKey;

    const NS: &str = r#"xmlns:xmi="http://www.omg.org/XMI" xmlns:a="http:///a.ecore" xmlns:cas="http:///uima/cas.ecore""#;

    fn catalog() -> StaticTypeCatalog {
        StaticTypeCatalog::new()
            .with_type(
                TypeDescription::new("a.Gene")
                    .with_feature("sofa", FeatureRange::Reference)
                    .with_feature("species", FeatureRange::Reference),
            )
            .with_type(TypeDescription::new("a.Species"))
    }

    fn build(body: &str) -> FormatResult<XmiGraph> {
        let xml = format!(r#"<xmi:XMI {NS}>{body}</xmi:XMI>"#);
        let doc = XmiDocument::parse(xml.as_bytes())?;
        build_graph(&doc, &catalog())
    }

    #[test]
    fn wires_predecessor_edges() {
        let graph = build(concat!(
            r#"<cas:NULL xmi:id="0"/>"#,
            r#"<cas:Sofa xmi:id="1" sofaID="_InitialView" sofaString="x"/>"#,
            r#"<a:Species xmi:id="4" sofa="1"/>"#,
            r#"<a:Gene xmi:id="2" sofa="1" species="4"/>"#,
        ))
        .unwrap();

        assert_eq!(graph.len(), 4);
        let species = graph.index_of(4).unwrap();
        let gene = graph.index_of(2).unwrap();
        assert_eq!(graph.predecessors(species).collect::<Vec<_>>(), vec![gene]);

        let sofa = graph.index_of(1).unwrap();
        assert_eq!(graph.predecessors(sofa).collect::<Vec<_>>(), vec![gene]);
        assert_eq!(graph.sofa(SofaKey::FIRST), Some(sofa));
        assert_eq!(
            graph.node(sofa).sofa_info.as_ref().unwrap().sofa_id,
            "_InitialView"
        );
        assert_eq!(graph.node(sofa).sofa, SofaBinding::NoSofa);
        assert_eq!(graph.node(gene).sofa, SofaBinding::Bound(1));
    }

    #[test]
    fn forward_references_are_materialized_later() {
        let graph = build(concat!(
            r#"<a:Gene xmi:id="2" species="4"/>"#,
            r#"<a:Species xmi:id="4"/>"#,
        ))
        .unwrap();
        let species = graph.get(4).unwrap();
        assert!(species.is_materialized());
        assert_eq!(species.type_name(), Some("a.Species"));
    }

    #[test]
    fn dangling_references_stay_placeholders() {
        let graph = build(r#"<a:Gene xmi:id="2" species="99"/>"#).unwrap();
        let dangling = graph.get(99).unwrap();
        assert!(!dangling.is_materialized());
        assert_eq!(dangling.sofa, SofaBinding::Unknown);
    }

    #[test]
    fn elements_without_id_are_skipped() {
        let graph = build(r#"<xmi:Documentation exporter="x"/><a:Species xmi:id="3"/>"#).unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn multiple_sofas_are_enumerated_in_order() {
        let graph = build(concat!(
            r#"<cas:Sofa xmi:id="1" sofaID="_InitialView"/>"#,
            r#"<cas:Sofa xmi:id="7" sofaID="second"/>"#,
        ))
        .unwrap();
        assert_eq!(graph.sofa(SofaKey::FIRST), graph.index_of(1));
        assert_eq!(graph.sofa(SofaKey::FIRST.next()), graph.index_of(7));
    }

    #[test]
    fn rejects_duplicate_ids_and_nameless_sofas() {
        assert!(matches!(
            build(r#"<a:Species xmi:id="3"/><a:Species xmi:id="3"/>"#),
            Err(FormatError::DuplicateId { id: 3 })
        ));
        assert!(matches!(
            build(r#"<cas:Sofa xmi:id="1"/>"#),
            Err(FormatError::MissingSofaId { id: 1 })
        ));
    }
}
