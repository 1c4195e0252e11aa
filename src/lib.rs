// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # xmi-splitter
//!
//! Splits a serialized XMI annotation document into annotation modules that
//! can be stored separately and recombined later, keeping identifiers stable
//! and references intact across repeated partial updates of the same
//! document.
//!
//! ## Architecture
//!
//! - **Document** (`document`): `quick-xml` pass yielding records with byte spans
//! - **Graph** (`graph`): record graph with predecessor edges, built in one pass
//! - **Labels** (`label`): module membership from type interest plus inheritance
//! - **Partition** (`partition`): grouping of labelled records into modules
//! - **Sofas** (`sofa`): stable base-text identifiers across calls
//! - **Serialization** (`serialize`, `alloc`): fresh identifiers, rewritten fragments
//!
//! ## Library usage
//!
//! ```no_run
//! use xmi_splitter::catalog::StaticTypeCatalog;
//! use xmi_splitter::config::SplitterConfig;
//! use xmi_splitter::splitter::XmiSplitter;
//!
//! let config = SplitterConfig::for_modules(["de.julielab.jcore.types.Gene"])
//!     .with_base_document(["de.julielab.jcore.types.Sentence"]);
//! let splitter = XmiSplitter::new(config).unwrap();
//! let catalog = StaticTypeCatalog::load(std::path::Path::new("types.toml")).unwrap();
//! let xmi = std::fs::read("document.xmi").unwrap();
//!
//! let result = splitter.process(&xmi, &catalog, 1, None).unwrap();
//! for module in &result.modules {
//!     println!("{}: {} records", module.name, module.records);
//! }
//! ```

pub mod alloc;
pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod label;
pub mod partition;
pub mod serialize;
pub mod sofa;
pub mod splitter;
