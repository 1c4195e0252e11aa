//! Rich diagnostic error types for the XMI splitter.
//!
//! Each concern defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains. [`SplitError`] is the
//! single error a `process` call can surface; document and navigation failures
//! are wrapped into it with the original cause preserved.

use miette::Diagnostic;
use thiserror::Error;

use crate::graph::XmiId;

/// Top-level error type for a split call.
#[derive(Debug, Error, Diagnostic)]
pub enum SplitError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Format(#[from] FormatError),

    #[error("module labels and base document types overlap in: {}", .overlap.join(", "))]
    #[diagnostic(
        code(xmi::config::overlap),
        help(
            "A type can either form its own annotation module or be stored with the \
             base document, not both. Remove the listed types from one of the two sets."
        )
    )]
    Configuration { overlap: Vec<String> },

    #[error("base document module name \"{name}\" is also a module type")]
    #[diagnostic(
        code(xmi::config::name_clash),
        help("Choose a document_module_name that is not one of the module types.")
    )]
    ModuleNameClash { name: String },

    #[error(
        "module \"{module}\" contains record {record} bound to Sofa {sofa}, which is neither \
         stored already nor stored by this call"
    )]
    #[diagnostic(
        code(xmi::serialize::unresolvable_sofa),
        help(
            "Storing this module would leave records pointing at a Sofa that does not exist \
             in storage. Enable base document storage for this call, or pass the Sofa id map \
             returned when the base document was stored."
        )
    )]
    UnresolvableSofaReference {
        module: String,
        record: XmiId,
        sofa: XmiId,
    },
}

// ---------------------------------------------------------------------------
// Document format errors
// ---------------------------------------------------------------------------

/// The input buffer is not a well-formed XMI document.
#[derive(Debug, Error, Diagnostic)]
pub enum FormatError {
    #[error("document is not valid UTF-8")]
    #[diagnostic(
        code(xmi::format::utf8),
        help("Only UTF-8 encoded XMI documents are supported. Re-encode the document.")
    )]
    Utf8 {
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("malformed XML at byte {position}")]
    #[diagnostic(code(xmi::format::xml), help("The document could not be parsed as XML."))]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("malformed attribute at byte {position}")]
    #[diagnostic(
        code(xmi::format::attribute),
        help("An element carries an attribute that is not of the form name=\"value\".")
    )]
    Attribute {
        position: u64,
        #[source]
        source: quick_xml::events::attributes::AttrError,
    },

    #[error("document contains no root element")]
    #[diagnostic(code(xmi::format::empty), help("Pass a complete XMI document."))]
    MissingRoot,

    #[error("document ends with {open} unclosed element(s)")]
    #[diagnostic(code(xmi::format::unclosed), help("The document is truncated."))]
    Unclosed { open: usize },

    #[error("element <{element}> uses undeclared namespace prefix \"{prefix}\"")]
    #[diagnostic(
        code(xmi::format::unknown_prefix),
        help("Every element prefix must be declared with xmlns:<prefix> on the root element.")
    )]
    UnknownPrefix { element: String, prefix: String },

    #[error("attribute {attribute}=\"{value}\" of <{element}> is not a valid identifier")]
    #[diagnostic(
        code(xmi::format::invalid_id),
        help("Identifiers and Sofa references must be non-negative integers.")
    )]
    InvalidId {
        element: String,
        attribute: String,
        value: String,
    },

    #[error("identifier {id} is used by more than one record")]
    #[diagnostic(
        code(xmi::format::duplicate_id),
        help("Every xmi:id must be unique within a document.")
    )]
    DuplicateId { id: XmiId },

    #[error("Sofa record {id} has no sofaID attribute")]
    #[diagnostic(
        code(xmi::format::missing_sofa_id),
        help("Every Sofa record needs a sofaID naming the view it belongs to.")
    )]
    MissingSofaId { id: XmiId },

    #[error("could not locate the start of <{element}> at byte {position}")]
    #[diagnostic(code(xmi::format::span), help("The element boundaries are inconsistent."))]
    Span { element: String, position: usize },
}

// ---------------------------------------------------------------------------
// Configuration file errors
// ---------------------------------------------------------------------------

/// Errors from reading or writing splitter configuration and type catalogs.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    #[diagnostic(
        code(xmi::config::read),
        help("Ensure the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    #[diagnostic(code(xmi::config::parse), help("Check the TOML syntax of the file."))]
    Parse { path: String, message: String },

    #[error("failed to write {path}")]
    #[diagnostic(
        code(xmi::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for functions returning splitter results.
pub type SplitterResult<T> = std::result::Result<T, SplitError>;

/// Result type for document navigation.
pub type FormatResult<T> = std::result::Result<T, FormatError>;

/// Result type for configuration and catalog files.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
