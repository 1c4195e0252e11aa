//! End-to-end tests for the XMI splitter.
//!
//! These tests run whole documents through `XmiSplitter::process` and check
//! the module contents, identifier assignment, Sofa stability across calls,
//! and that references inside a module resolve inside that module.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use xmi_splitter::catalog::{FeatureRange, StaticTypeCatalog, TypeDescription};
use xmi_splitter::config::SplitterConfig;
use xmi_splitter::document::{SOFA_ATTR, XmiDocument};
use xmi_splitter::error::SplitError;
use xmi_splitter::graph::{ModuleLabel, XmiId};
use xmi_splitter::sofa::SofaIdMap;
use xmi_splitter::splitter::{SplitResult, SplitState, XmiSplitter};

const GENE: &str = "de.julielab.jcore.types.GeneMention";
const SENTENCE: &str = "de.julielab.jcore.types.Sentence";
const CHEMICAL: &str = "de.julielab.jcore.types.Chemical";
const ENTRY: &str = "de.julielab.jcore.types.ResourceEntry";

const NAMESPACES: &str = concat!(
    r#"xmlns:xmi="http://www.omg.org/XMI" xmlns:cas="http:///uima/cas.ecore" "#,
    r#"xmlns:types="http:///de/julielab/jcore/types.ecore""#,
);

fn document(body: &[&str]) -> Vec<u8> {
    let mut xmi = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<xmi:XMI {NAMESPACES} xmi:version=\"2.0\">\n"
    );
    for record in body {
        xmi.push_str("  ");
        xmi.push_str(record);
        xmi.push('\n');
    }
    xmi.push_str("</xmi:XMI>\n");
    xmi.into_bytes()
}

/// Null marker, one Sofa, one gene mention and one sentence.
fn simple_document() -> Vec<u8> {
    document(&[
        r#"<cas:NULL xmi:id="0"/>"#,
        r#"<cas:Sofa xmi:id="1" sofaNum="1" sofaID="view1" mimeType="text" sofaString="BRCA1 binds DNA."/>"#,
        r#"<types:GeneMention xmi:id="2" sofa="1" begin="0" end="5"/>"#,
        r#"<types:Sentence xmi:id="3" sofa="1" begin="0" end="16"/>"#,
        r#"<cas:View sofa="1" members="2 3"/>"#,
    ])
}

/// A gene mention pulling in an array of resource entries, plus a chemical
/// that shares one of the entries.
fn nested_document() -> Vec<u8> {
    document(&[
        r#"<cas:NULL xmi:id="0"/>"#,
        r#"<cas:Sofa xmi:id="1" sofaNum="1" sofaID="view1" mimeType="text" sofaString="BRCA1 binds aspirin."/>"#,
        r#"<types:GeneMention xmi:id="2" sofa="1" begin="0" end="5" resourceEntryList="4"/>"#,
        r#"<types:Sentence xmi:id="3" sofa="1" begin="0" end="20"/>"#,
        r#"<cas:FSArray xmi:id="4" elements="5 6"/>"#,
        r#"<types:ResourceEntry xmi:id="5" sofa="1" begin="0" end="5" entryId="672"/>"#,
        r#"<types:ResourceEntry xmi:id="6" sofa="1" begin="0" end="5" entryId="P38398"/>"#,
        r#"<types:Chemical xmi:id="7" sofa="1" begin="12" end="19" resourceEntryList="8"/>"#,
        r#"<cas:FSArray xmi:id="8" elements="6"/>"#,
        r#"<cas:View sofa="1" members="2 3 7"/>"#,
    ])
}

fn catalog() -> StaticTypeCatalog {
    let annotation = |name: &str| TypeDescription::new(name).with_feature("sofa", FeatureRange::Reference);
    StaticTypeCatalog::new()
        .with_type(
            annotation(GENE).with_feature("resourceEntryList", FeatureRange::ReferenceArray),
        )
        .with_type(
            annotation(CHEMICAL).with_feature("resourceEntryList", FeatureRange::ReferenceArray),
        )
        .with_type(annotation(SENTENCE))
        .with_type(annotation(ENTRY).with_feature("entryId", FeatureRange::Primitive))
}

fn splitter(config: SplitterConfig) -> XmiSplitter {
    XmiSplitter::new(config).unwrap()
}

fn module_text<'a>(result: &'a SplitResult, name: &str) -> &'a str {
    let module = result
        .module(name)
        .unwrap_or_else(|| panic!("no module {name}"));
    std::str::from_utf8(&module.data).unwrap()
}

/// Re-parse a module's fragments under the source document's namespaces.
fn reparse(result: &SplitResult, name: &str) -> Vec<u8> {
    format!(
        "<xmi:XMI {NAMESPACES}>{}</xmi:XMI>",
        module_text(result, name)
    )
    .into_bytes()
}

/// `(type name, new id, attribute map)` for every record of a module.
fn module_records(result: &SplitResult, name: &str) -> Vec<(String, XmiId, BTreeMap<String, String>)> {
    let bytes = reparse(result, name);
    let doc = XmiDocument::parse(&bytes).unwrap();
    doc.records()
        .iter()
        .map(|record| {
            let attrs = ["sofa", "resourceEntryList", "elements", "entryId"]
                .iter()
                .filter_map(|&a| record.attribute(a).map(|v| (a.to_string(), v.to_string())))
                .collect();
            (
                doc.type_name(record).unwrap(),
                record.xmi_id().unwrap().unwrap(),
                attrs,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Documented scenarios
// ---------------------------------------------------------------------------

#[test]
fn single_module_without_base_document() {
    let splitter = splitter(SplitterConfig::for_modules([GENE]).recursive(false));
    let sofa_ids = SofaIdMap::from([("view1".to_string(), 40)]);

    let result = splitter
        .process(&simple_document(), &catalog(), 10, Some(&sofa_ids))
        .unwrap();

    assert_eq!(result.modules.len(), 1);
    assert_eq!(
        module_text(&result, GENE),
        r#"<types:GeneMention xmi:id="10" sofa="40" begin="0" end="5"/>"#
    );
    assert_eq!(result.module(GENE).unwrap().records, 1);
    assert_eq!(result.next_free_id, 11);
    assert_eq!(result.sofa_ids, sofa_ids);
}

#[test]
fn unstored_sofa_is_an_error() {
    let splitter = splitter(SplitterConfig::for_modules([GENE]).recursive(false));

    let err = splitter
        .process(&simple_document(), &catalog(), 10, None)
        .unwrap_err();

    match err {
        SplitError::UnresolvableSofaReference {
            module,
            record,
            sofa,
        } => {
            assert_eq!(module, GENE);
            assert_eq!(record, 2);
            assert_eq!(sofa, 1);
        }
        other => panic!("expected unresolvable Sofa, got {other:?}"),
    }
}

#[test]
fn base_document_capture_keeps_sofa_identifier() {
    let splitter = splitter(
        SplitterConfig::for_modules([GENE])
            .with_base_document([SENTENCE])
            .recursive(false),
    );

    let result = splitter
        .process(&simple_document(), &catalog(), 100, None)
        .unwrap();

    let names: Vec<_> = result.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["_documents", GENE]);
    assert_eq!(result.modules[0].label, ModuleLabel::BaseDocument);

    let base = module_records(&result, "_documents");
    assert_eq!(base.len(), 2);
    assert_eq!(base[0].0, "uima.cas.Sofa");
    assert_eq!(base[0].1, 1);
    assert_eq!(base[1].0, SENTENCE);
    assert_eq!(base[1].2["sofa"], "1");

    let genes = module_records(&result, GENE);
    assert_eq!(genes.len(), 1);
    assert_eq!(genes[0].2["sofa"], "1");

    assert_eq!(result.sofa_ids, SofaIdMap::from([("view1".to_string(), 1)]));
    assert_eq!(result.next_free_id, 102);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn identifiers_are_unique_and_fresh() {
    let splitter = splitter(
        SplitterConfig::for_modules([GENE, CHEMICAL]).with_base_document([SENTENCE]),
    );
    let result = splitter
        .process(&nested_document(), &catalog(), 50, None)
        .unwrap();

    let sofa_ids: HashSet<XmiId> = result.sofa_ids.values().copied().collect();
    let mut seen = HashMap::new();
    for module in &result.modules {
        for (type_name, id, _) in module_records(&result, &module.name) {
            assert_ne!(id, 0);
            if type_name == "uima.cas.Sofa" {
                assert!(sofa_ids.contains(&id));
                continue;
            }
            assert!(id >= 50 && id < result.next_free_id, "id {id} out of range");
            assert!(!sofa_ids.contains(&id));
            // The shared entry appears in two modules under two identifiers.
            assert!(
                seen.insert(id, module.name.clone()).is_none(),
                "id {id} assigned twice"
            );
        }
    }
}

#[test]
fn recursive_modules_are_referentially_closed() {
    let splitter = splitter(
        SplitterConfig::for_modules([GENE, CHEMICAL]).with_base_document([SENTENCE]),
    );
    let result = splitter
        .process(&nested_document(), &catalog(), 50, None)
        .unwrap();

    for name in [GENE, CHEMICAL] {
        let records = module_records(&result, name);
        let ids: BTreeSet<XmiId> = records.iter().map(|(_, id, _)| *id).collect();
        for (type_name, id, attrs) in &records {
            for (attr, value) in attrs {
                if attr == SOFA_ATTR || attr == "entryId" {
                    continue;
                }
                for target in value.split_whitespace() {
                    let target: XmiId = target.parse().unwrap();
                    assert!(
                        ids.contains(&target),
                        "{name}: {type_name} {id} references {target} outside the module"
                    );
                }
            }
        }
    }

    let types = |name: &str| -> Vec<String> {
        module_records(&result, name)
            .into_iter()
            .map(|(t, _, _)| t)
            .collect()
    };
    assert_eq!(
        types(GENE),
        vec![GENE, "uima.cas.FSArray", ENTRY, ENTRY]
    );
    assert_eq!(types(CHEMICAL), vec![ENTRY, CHEMICAL, "uima.cas.FSArray"]);
}

#[test]
fn without_recursion_only_module_types_are_stored() {
    let splitter = splitter(
        SplitterConfig::for_modules([GENE])
            .with_base_document([SENTENCE])
            .recursive(false),
    );
    let result = splitter
        .process(&nested_document(), &catalog(), 50, None)
        .unwrap();

    let genes = module_records(&result, GENE);
    assert_eq!(genes.len(), 1);
    // The array is not stored, so the reference keeps its source value.
    assert_eq!(genes[0].2["resourceEntryList"], "4");
}

#[test]
fn sofa_identifier_is_stable_across_calls() {
    let first = splitter(SplitterConfig::for_modules([GENE]).with_base_document([SENTENCE]))
        .process(&simple_document(), &catalog(), 100, None)
        .unwrap();
    let state = first.state();
    assert_eq!(state.sofa_ids["view1"], 1);

    // The same document, re-serialized with different identifiers.
    let reserialized = document(&[
        r#"<cas:NULL xmi:id="0"/>"#,
        r#"<types:Chemical xmi:id="3" sofa="9" begin="12" end="15"/>"#,
        r#"<cas:Sofa xmi:id="9" sofaNum="1" sofaID="view1" mimeType="text" sofaString="BRCA1 binds DNA."/>"#,
        r#"<cas:View sofa="9" members="3"/>"#,
    ]);
    let second = splitter(SplitterConfig::for_modules([CHEMICAL]))
        .process_with_state(&reserialized, &catalog(), &state)
        .unwrap();

    let chemicals = module_records(&second, CHEMICAL);
    assert_eq!(chemicals.len(), 1);
    assert_eq!(chemicals[0].2["sofa"], "1");
    assert!(chemicals[0].1 >= first.next_free_id);
    assert_eq!(second.sofa_ids, first.sofa_ids);
    assert_eq!(second.next_free_id, first.next_free_id + 1);
}

#[test]
fn fresh_ids_skip_committed_sofa_ids() {
    let sofa_ids = SofaIdMap::from([("view1".to_string(), 11)]);
    let result = splitter(SplitterConfig::for_modules([GENE, SENTENCE]))
        .process(&simple_document(), &catalog(), 10, Some(&sofa_ids))
        .unwrap();

    let mut ids: Vec<XmiId> = result
        .modules
        .iter()
        .flat_map(|m| module_records(&result, &m.name))
        .map(|(_, id, _)| id)
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![10, 12]);
    assert_eq!(result.next_free_id, 13);
}

#[test]
fn nested_content_is_copied_verbatim() {
    let doc = document(&[
        r#"<cas:Sofa xmi:id="1" sofaNum="1" sofaID="view1" mimeType="text" sofaString="x"/>"#,
        r#"<types:GeneMention xmi:id="2" sofa="1" begin="0" end="1"><note xmi:id="2" sofa="1">a &amp; b</note></types:GeneMention>"#,
    ]);
    let sofa_ids = SofaIdMap::from([("view1".to_string(), 5)]);
    let result = splitter(SplitterConfig::for_modules([GENE]))
        .process(&doc, &catalog(), 20, Some(&sofa_ids))
        .unwrap();

    assert_eq!(
        module_text(&result, GENE),
        r#"<types:GeneMention xmi:id="20" sofa="5" begin="0" end="1"><note xmi:id="2" sofa="1">a &amp; b</note></types:GeneMention>"#
    );
}

#[test]
fn dangling_references_are_tolerated() {
    let doc = document(&[
        r#"<cas:Sofa xmi:id="1" sofaNum="1" sofaID="view1" mimeType="text" sofaString="x"/>"#,
        r#"<types:GeneMention xmi:id="2" sofa="1" begin="0" end="1" resourceEntryList="77"/>"#,
    ]);
    let result = splitter(SplitterConfig::for_modules([GENE]).with_base_document(Vec::<String>::new()))
        .process(&doc, &catalog(), 20, None)
        .unwrap();

    let genes = module_records(&result, GENE);
    assert_eq!(genes.len(), 1);
    assert_eq!(genes[0].2["resourceEntryList"], "77");
}

#[test]
fn namespaces_are_reported() {
    let sofa_ids = SofaIdMap::from([("view1".to_string(), 1)]);
    let result = splitter(SplitterConfig::for_modules([GENE]))
        .process(&simple_document(), &catalog(), 10, Some(&sofa_ids))
        .unwrap();
    assert_eq!(result.namespaces.len(), 3);
    assert_eq!(
        result.namespaces["types"],
        "http:///de/julielab/jcore/types.ecore"
    );
    assert_eq!(result.state().namespaces, result.namespaces);
}

#[test]
fn duplicate_identifiers_are_rejected() {
    let doc = document(&[
        r#"<cas:Sofa xmi:id="1" sofaNum="1" sofaID="view1" mimeType="text" sofaString="x"/>"#,
        r#"<types:GeneMention xmi:id="1" sofa="1" begin="0" end="1"/>"#,
    ]);
    let err = splitter(SplitterConfig::for_modules([GENE]))
        .process(&doc, &catalog(), 20, None)
        .unwrap_err();
    assert!(matches!(err, SplitError::Format(_)));
}

#[test]
fn same_input_gives_same_output() {
    let splitter = splitter(
        SplitterConfig::for_modules([GENE, CHEMICAL]).with_base_document([SENTENCE]),
    );
    let state = SplitState {
        next_free_id: 30,
        ..Default::default()
    };
    let a = splitter
        .process_with_state(&nested_document(), &catalog(), &state)
        .unwrap();
    let b = splitter
        .process_with_state(&nested_document(), &catalog(), &state)
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn catalog_and_config_load_from_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let types = dir.path().join("types.toml");
    std::fs::write(
        &types,
        format!(
            r#"
[[types]]
name = "{GENE}"
features = [{{ name = "sofa", range = "reference" }}]
"#
        ),
    )
    .unwrap();
    let config_path = dir.path().join("splitter.toml");
    SplitterConfig::for_modules([GENE])
        .with_base_document([SENTENCE])
        .save(&config_path)
        .unwrap();

    let catalog = StaticTypeCatalog::load(&types).unwrap();
    let config = SplitterConfig::load(&config_path).unwrap();
    let result = XmiSplitter::new(config)
        .unwrap()
        .process(&simple_document(), &catalog, 1, None)
        .unwrap();

    assert_eq!(module_records(&result, GENE)[0].2["sofa"], "1");
}

#[test]
fn one_splitter_serves_concurrent_calls() {
    let splitter = splitter(
        SplitterConfig::for_modules([GENE, CHEMICAL]).with_base_document([SENTENCE]),
    );
    let catalog = catalog();
    let xmi = nested_document();
    let expected = splitter.process(&xmi, &catalog, 1, None).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| splitter.process(&xmi, &catalog, 1, None).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

/// Two views, each with its own Sofa and one gene mention.
fn two_view_document() -> Vec<u8> {
    document(&[
        r#"<cas:NULL xmi:id="0"/>"#,
        r#"<cas:Sofa xmi:id="1" sofaNum="1" sofaID="view1" mimeType="text" sofaString="BRCA1 binds DNA."/>"#,
        r#"<types:GeneMention xmi:id="2" sofa="1" begin="0" end="5"/>"#,
        r#"<types:GeneMention xmi:id="3" sofa="7" begin="0" end="4"/>"#,
        r#"<cas:Sofa xmi:id="7" sofaNum="2" sofaID="view2" mimeType="text" sofaString="TP53 is mutated."/>"#,
        r#"<cas:View sofa="1" members="2"/>"#,
        r#"<cas:View sofa="7" members="3"/>"#,
    ])
}

#[test]
fn every_sofa_must_be_stored() {
    let sofa_ids = SofaIdMap::from([("view1".to_string(), 40)]);
    let err = splitter(SplitterConfig::for_modules([GENE]))
        .process(&two_view_document(), &catalog(), 10, Some(&sofa_ids))
        .unwrap_err();
    assert!(matches!(
        err,
        SplitError::UnresolvableSofaReference {
            record: 3,
            sofa: 7,
            ..
        }
    ));
}

#[test]
fn records_follow_their_own_sofa() {
    let sofa_ids = SofaIdMap::from([("view1".to_string(), 40), ("view2".to_string(), 11)]);
    let result = splitter(SplitterConfig::for_modules([GENE]))
        .process(&two_view_document(), &catalog(), 10, Some(&sofa_ids))
        .unwrap();

    let genes = module_records(&result, GENE);
    assert_eq!(genes.len(), 2);
    assert_eq!((genes[0].1, genes[0].2["sofa"].as_str()), (10, "40"));
    assert_eq!((genes[1].1, genes[1].2["sofa"].as_str()), (12, "11"));
    assert_eq!(result.sofa_ids, sofa_ids);
}

#[test]
fn captured_sofas_keep_distinct_ids() {
    let result = splitter(SplitterConfig::for_modules([GENE]).with_base_document(Vec::<String>::new()))
        .process(&two_view_document(), &catalog(), 100, None)
        .unwrap();

    let base = module_records(&result, "_documents");
    let sofas: Vec<XmiId> = base.iter().map(|(_, id, _)| *id).collect();
    assert_eq!(sofas, vec![1, 7]);
    assert_eq!(
        result.sofa_ids,
        SofaIdMap::from([("view1".to_string(), 1), ("view2".to_string(), 7)])
    );

    let genes = module_records(&result, GENE);
    assert_eq!(genes[0].2["sofa"], "1");
    assert_eq!(genes[1].2["sofa"], "7");
}

#[test]
fn captured_sofa_moves_off_a_committed_id() {
    // view1 was stored under 7 earlier, which is view2's id in this document.
    let sofa_ids = SofaIdMap::from([("view1".to_string(), 7)]);
    let result = splitter(SplitterConfig::for_modules([GENE]).with_base_document(Vec::<String>::new()))
        .process(&two_view_document(), &catalog(), 20, Some(&sofa_ids))
        .unwrap();

    let view2 = result.sofa_ids["view2"];
    assert_ne!(view2, 7);
    assert!(view2 >= 20);

    let base = module_records(&result, "_documents");
    let sofas: Vec<XmiId> = base.iter().map(|(_, id, _)| *id).collect();
    assert_eq!(sofas, vec![7, view2]);

    let genes = module_records(&result, GENE);
    assert_eq!(genes[0].2["sofa"], "7");
    assert_eq!(genes[1].2["sofa"], view2.to_string());
}
