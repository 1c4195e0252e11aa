//! Type catalog: which features of a record type hold references.
//!
//! The splitter never interprets primitive values. All it needs from the type
//! system is, per type, the list of features whose range is another feature
//! structure (or an array of them). [`TypeCatalog`] is that lookup; the
//! [`StaticTypeCatalog`] implementation is built in code or loaded from a
//! `types.toml` file.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{parse_toml, read_toml};
use crate::error::ConfigResult;

/// The null marker record, always `xmi:id="0"`.
pub const CAS_NULL: &str = "uima.cas.NULL";
/// The generic view record listing the members of a Sofa.
pub const CAS_VIEW: &str = "uima.cas.View";
/// The base-text record.
pub const CAS_SOFA: &str = "uima.cas.Sofa";
/// The generic array of feature structure references.
pub const CAS_FS_ARRAY: &str = "uima.cas.FSArray";

/// Read-only lookup of type descriptions by fully qualified type name.
pub trait TypeCatalog {
    fn lookup(&self, type_name: &str) -> Option<&TypeDescription>;
}

/// What a feature's value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureRange {
    /// A primitive value (number, string, boolean).
    Primitive,
    /// A single feature structure reference.
    Reference,
    /// An array of feature structure references.
    ReferenceArray,
}

impl FeatureRange {
    /// Whether the serialized attribute holds identifiers.
    pub fn holds_references(self) -> bool {
        matches!(self, Self::Reference | Self::ReferenceArray)
    }
}

/// A single feature of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDescription {
    /// Short feature name, used as the XML attribute name.
    pub name: String,
    pub range: FeatureRange,
}

impl FeatureDescription {
    pub fn new(name: impl Into<String>, range: FeatureRange) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }
}

/// Description of one record type, including inherited features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescription {
    /// Fully qualified type name, e.g. `de.julielab.jcore.types.Gene`.
    pub name: String,
    /// The type itself is an array of references, serialized in `elements`.
    #[serde(default)]
    pub reference_array: bool,
    #[serde(default)]
    pub features: Vec<FeatureDescription>,
}

impl TypeDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference_array: false,
            features: Vec::new(),
        }
    }

    /// Add a feature (builder style).
    pub fn with_feature(mut self, name: impl Into<String>, range: FeatureRange) -> Self {
        self.features.push(FeatureDescription::new(name, range));
        self
    }

    /// Features whose serialized value is a list of identifiers.
    pub fn reference_features(&self) -> impl Iterator<Item = &FeatureDescription> {
        self.features.iter().filter(|f| f.range.holds_references())
    }
}

/// On-disk layout of a catalog file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    types: Vec<TypeDescription>,
}

/// In-memory type catalog.
///
/// Always contains the built-in CAS types; user types are added with
/// [`with_type`](Self::with_type) or read from TOML.
#[derive(Debug, Clone)]
pub struct StaticTypeCatalog {
    types: HashMap<String, TypeDescription>,
}

impl Default for StaticTypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticTypeCatalog {
    /// Create a catalog containing only the built-in CAS types.
    pub fn new() -> Self {
        let mut catalog = Self {
            types: HashMap::new(),
        };
        catalog.insert(TypeDescription::new(CAS_NULL));
        catalog.insert(TypeDescription::new(CAS_VIEW));
        catalog.insert(
            TypeDescription::new(CAS_SOFA).with_feature("sofaArray", FeatureRange::Reference),
        );
        catalog.insert(TypeDescription {
            name: CAS_FS_ARRAY.into(),
            reference_array: true,
            features: Vec::new(),
        });
        catalog
    }

    /// Add or replace a type description.
    pub fn insert(&mut self, description: TypeDescription) {
        self.types.insert(description.name.clone(), description);
    }

    /// Add a type description (builder style).
    pub fn with_type(mut self, description: TypeDescription) -> Self {
        self.insert(description);
        self
    }

    /// Number of known types, built-ins included.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Parse a catalog from TOML text.
    ///
    /// ```toml
    /// [[types]]
    /// name = "de.julielab.jcore.types.Gene"
    /// features = [
    ///   { name = "sofa", range = "reference" },
    ///   { name = "specificType", range = "primitive" },
    /// ]
    /// ```
    pub fn from_toml_str(content: &str, origin: &str) -> ConfigResult<Self> {
        parse_toml(content, origin).map(Self::from_file)
    }

    /// Load a catalog from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        read_toml(path).map(Self::from_file)
    }

    fn from_file(file: CatalogFile) -> Self {
        let mut catalog = Self::new();
        for description in file.types {
            catalog.insert(description);
        }
        catalog
    }
}

impl TypeCatalog for StaticTypeCatalog {
    fn lookup(&self, type_name: &str) -> Option<&TypeDescription> {
        self.types.get(type_name)
    }
}
