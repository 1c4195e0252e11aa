//! Splitter configuration, persisted as TOML.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Which modules a splitter produces and how membership is decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Annotation types that each form their own module.
    #[serde(default)]
    pub module_types: Vec<String>,
    /// Pull records referenced by module records into the same module.
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    /// Also emit the base document module (Sofas and base document types).
    #[serde(default)]
    pub store_base_document: bool,
    /// Types stored with the base document.
    #[serde(default)]
    pub base_document_types: Vec<String>,
    /// Output name of the base document module.
    #[serde(default = "default_document_module_name")]
    pub document_module_name: String,
}

fn default_recursive() -> bool {
    true
}
fn default_document_module_name() -> String {
    "_documents".into()
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            module_types: Vec::new(),
            recursive: default_recursive(),
            store_base_document: false,
            base_document_types: Vec::new(),
            document_module_name: default_document_module_name(),
        }
    }
}

impl SplitterConfig {
    /// A configuration producing modules for the given types.
    pub fn for_modules<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            module_types: types.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Capture the base document with the given extra types.
    pub fn with_base_document<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.store_base_document = true;
        self.base_document_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        read_toml(path)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

/// Read and deserialize a TOML file, naming the path in errors.
pub(crate) fn read_toml<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_toml(&content, &path.display().to_string())
}

/// Deserialize TOML text; `origin` names the source in errors.
pub(crate) fn parse_toml<T: DeserializeOwned>(content: &str, origin: &str) -> ConfigResult<T> {
    toml::from_str(content).map_err(|e| ConfigError::Parse {
        path: origin.to_string(),
        message: e.to_string(),
    })
}
