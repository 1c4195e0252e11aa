//! Reference resolution: which identifiers does a record point at?

use crate::catalog::{CAS_NULL, CAS_VIEW, TypeCatalog};
use crate::document::{ELEMENTS_ATTR, RecordElement};

use super::{ReferenceAttr, XmiId};

/// Enumerate the reference-valued attributes of a record.
///
/// Absent, blank or malformed attributes count as "no reference". Types the
/// catalog does not know carry no references.
pub fn references<C>(record: &RecordElement, type_name: &str, catalog: &C) -> Vec<ReferenceAttr>
where
    C: TypeCatalog + ?Sized,
{
    if type_name == CAS_NULL || type_name == CAS_VIEW {
        return Vec::new();
    }
    let Some(description) = catalog.lookup(type_name) else {
        tracing::debug!(type_name, "type not in catalog, assuming no references");
        return Vec::new();
    };

    if description.reference_array {
        return parse_attribute(record, ELEMENTS_ATTR).into_iter().collect();
    }

    description
        .reference_features()
        .filter_map(|feature| parse_attribute(record, &feature.name))
        .collect()
}

/// All identifiers referenced through a set of attributes.
pub fn referenced_ids(attrs: &[ReferenceAttr]) -> impl Iterator<Item = XmiId> + '_ {
    attrs.iter().flat_map(|attr| attr.targets.iter().copied())
}

fn parse_attribute(record: &RecordElement, name: &str) -> Option<ReferenceAttr> {
    let value = record.attribute(name)?;
    if value.trim().is_empty() {
        return None;
    }
    match value
        .split_whitespace()
        .map(str::parse::<XmiId>)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(targets) => Some(ReferenceAttr {
            attribute: name.to_string(),
            targets,
        }),
        Err(_) => {
            tracing::warn!(
                element = %record.qname,
                attribute = name,
                value,
                "reference attribute is not a list of identifiers, ignoring"
            );
            None
        }
    }
}
