//! Error types for the reporting pipeline.
//!
//! Errors come in three tiers:
//! - [`SchemaError`] - a record type cannot be registered. Fatal for the gadget.
//! - [`ConfigError`] - a sort, projection or filter directive does not resolve
//!   against a schema. Reported to the caller, nothing is applied.
//! - [`FormatError`] - a single value cannot be humanized. Recovered per cell.

use thiserror::Error;

/// Registration-time failure while deriving a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("{type_name}: malformed column directive '{directive}': {reason}")]
    MalformedDirective {
        type_name: &'static str,
        directive: String,
        reason: String,
    },
    #[error("{type_name}.{column}: value kind '{kind}' cannot be displayed or sorted")]
    UnsupportedKind {
        type_name: &'static str,
        column: String,
        kind: &'static str,
    },
    #[error("{type_name}: duplicate column name '{name}'")]
    DuplicateColumn {
        type_name: &'static str,
        name: String,
    },
    #[error("{type_name}: duplicate JSON field name '{name}'")]
    DuplicateJsonName {
        type_name: &'static str,
        name: String,
    },
    #[error("{type_name}: invalid default sort: {source}")]
    InvalidDefaultSort {
        type_name: &'static str,
        #[source]
        source: ConfigError,
    },
}

/// A user or gadget supplied directive that does not resolve against a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown sort column '{name}' (valid columns: {})", .valid.join(", "))]
    UnknownSortColumn { name: String, valid: Vec<String> },
    #[error("sort key '{token}' has a direction marker but no column name")]
    EmptySortKey { token: String },
    #[error("unknown column '{name}' (valid columns: {})", .valid.join(", "))]
    UnknownColumn { name: String, valid: Vec<String> },
    #[error("unknown filter column '{name}' (valid columns: {})", .valid.join(", "))]
    UnknownFilterColumn { name: String, valid: Vec<String> },
    #[error("invalid filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// A formatter could not render a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FormatError(pub String);

impl FormatError {
    pub fn new(message: impl Into<String>) -> Self {
        FormatError(message.into())
    }
}

/// Any error surfaced by the library API.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
