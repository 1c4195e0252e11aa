//! XMI document navigation.
//!
//! A single pass over the document with `quick-xml` yields the namespace table
//! declared on the root element and every direct child of the root together
//! with its attributes and the exact byte span of its serialized form. Nested
//! content of a record (child elements, text) is part of that span and is never
//! interpreted.
//!
//! Attribute values are kept as they appear in the source: entity references
//! are not expanded. Identifiers and Sofa references are plain digits, and the
//! `sofaID` of a Sofa only needs to be a stable key, so nothing downstream
//! needs the unescaped form.

use std::collections::BTreeMap;
use std::ops::Range;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{FormatError, FormatResult};
use crate::graph::XmiId;

/// Attribute holding a record's identifier.
pub const XMI_ID_ATTR: &str = "xmi:id";
/// Attribute binding a record to its Sofa.
pub const SOFA_ATTR: &str = "sofa";
/// Attribute holding a Sofa's durable identity.
pub const SOFA_ID_ATTR: &str = "sofaID";
/// Attribute listing the members of a reference array.
pub const ELEMENTS_ATTR: &str = "elements";

/// One direct child element of the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordElement {
    /// Qualified element name as written, e.g. `types:Gene`.
    pub qname: String,
    /// Byte range of the complete element in the source.
    pub span: Range<usize>,
    attributes: Vec<(String, String)>,
}

impl RecordElement {
    /// Raw value of an attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The record identifier, or `None` for non-record elements.
    pub fn xmi_id(&self) -> FormatResult<Option<XmiId>> {
        self.id_attribute(XMI_ID_ATTR)
    }

    /// The identifier of the Sofa this record is bound to, if any.
    pub fn sofa_ref(&self) -> FormatResult<Option<XmiId>> {
        self.id_attribute(SOFA_ATTR)
    }

    fn id_attribute(&self, name: &str) -> FormatResult<Option<XmiId>> {
        self.attribute(name)
            .map(|value| {
                value
                    .trim()
                    .parse::<XmiId>()
                    .map_err(|_| FormatError::InvalidId {
                        element: self.qname.clone(),
                        attribute: name.to_string(),
                        value: value.to_string(),
                    })
            })
            .transpose()
    }
}

/// A parsed XMI document borrowing the source text.
#[derive(Debug)]
pub struct XmiDocument<'a> {
    text: &'a str,
    namespaces: BTreeMap<String, String>,
    records: Vec<RecordElement>,
}

impl<'a> XmiDocument<'a> {
    /// Parse a document buffer.
    pub fn parse(bytes: &'a [u8]) -> FormatResult<Self> {
        let text = std::str::from_utf8(bytes).map_err(|source| FormatError::Utf8 { source })?;
        let mut reader = Reader::from_str(text);

        let mut namespaces = BTreeMap::new();
        let mut records = Vec::new();
        let mut open: Option<(usize, String, Vec<(String, String)>)> = None;
        let mut depth = 0usize;
        let mut root_seen = false;

        loop {
            let before = reader.buffer_position() as usize;
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(source) => {
                    return Err(FormatError::Xml {
                        position: reader.error_position() as u64,
                        source,
                    });
                }
            };
            match event {
                Event::Start(e) => {
                    match depth {
                        0 => {
                            collect_namespaces(&e, &mut namespaces, before)?;
                            root_seen = true;
                        }
                        1 => {
                            let qname = element_name(&e);
                            let start = tag_start(text, before, &qname)?;
                            let attributes = read_attributes(&e, before)?;
                            open = Some((start, qname, attributes));
                        }
                        _ => {}
                    }
                    depth += 1;
                }
                Event::Empty(e) => match depth {
                    0 => {
                        collect_namespaces(&e, &mut namespaces, before)?;
                        root_seen = true;
                    }
                    1 => {
                        let qname = element_name(&e);
                        let start = tag_start(text, before, &qname)?;
                        let attributes = read_attributes(&e, before)?;
                        records.push(RecordElement {
                            qname,
                            span: start..reader.buffer_position() as usize,
                            attributes,
                        });
                    }
                    _ => {}
                },
                Event::End(_) => {
                    // Unmatched end tags are rejected by the reader itself.
                    depth = depth.saturating_sub(1);
                    if depth == 1 {
                        if let Some((start, qname, attributes)) = open.take() {
                            records.push(RecordElement {
                                qname,
                                span: start..reader.buffer_position() as usize,
                                attributes,
                            });
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !root_seen {
            return Err(FormatError::MissingRoot);
        }
        if depth != 0 {
            return Err(FormatError::Unclosed { open: depth });
        }

        tracing::debug!(
            records = records.len(),
            namespaces = namespaces.len(),
            "parsed XMI document"
        );

        Ok(Self {
            text,
            namespaces,
            records,
        })
    }

    /// The complete source text.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// Namespace prefix to URI, as declared on the root element.
    pub fn namespaces(&self) -> &BTreeMap<String, String> {
        &self.namespaces
    }

    /// Direct children of the root element in document order.
    pub fn records(&self) -> &[RecordElement] {
        &self.records
    }

    /// The serialized text of a byte span.
    pub fn fragment(&self, span: &Range<usize>) -> &'a str {
        &self.text[span.clone()]
    }

    /// Fully qualified type name of a record element.
    pub fn type_name(&self, record: &RecordElement) -> FormatResult<String> {
        let Some((prefix, local)) = record.qname.split_once(':') else {
            return Ok(record.qname.clone());
        };
        let uri = self
            .namespaces
            .get(prefix)
            .ok_or_else(|| FormatError::UnknownPrefix {
                element: record.qname.clone(),
                prefix: prefix.to_string(),
            })?;
        Ok(format!("{}{local}", namespace_package(uri)))
    }
}

/// Convert an Ecore namespace URI into a type name prefix.
///
/// `http:///de/julielab/jcore/types.ecore` becomes `de.julielab.jcore.types.`.
pub fn namespace_package(uri: &str) -> String {
    let path = uri.strip_prefix("http:///").unwrap_or(uri);
    let path = path.strip_suffix(".ecore").unwrap_or(path);
    format!("{}.", path.replace('/', "."))
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Locate the `<` opening the tag that was read starting at `before`.
///
/// Depending on how the preceding text event was consumed, the reader's
/// position is either on the `<` or just past it.
fn tag_start(text: &str, before: usize, qname: &str) -> FormatResult<usize> {
    let upto = before.min(text.len().saturating_sub(1));
    text[..=upto]
        .rfind('<')
        .filter(|&start| text[start + 1..].starts_with(qname))
        .ok_or_else(|| FormatError::Span {
            element: qname.to_string(),
            position: before,
        })
}

fn read_attributes(e: &BytesStart<'_>, position: usize) -> FormatResult<Vec<(String, String)>> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(|source| FormatError::Attribute {
                position: position as u64,
                source,
            })?;
            Ok((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                String::from_utf8_lossy(&attr.value).into_owned(),
            ))
        })
        .collect()
}

fn collect_namespaces(
    e: &BytesStart<'_>,
    namespaces: &mut BTreeMap<String, String>,
    position: usize,
) -> FormatResult<()> {
    for (key, value) in read_attributes(e, position)? {
        if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.insert(prefix.to_string(), value);
        }
    }
    Ok(())
}
