//! Error types for schema loading, override resolution and resource builds.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while reading schema documents or override files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Override(#[from] OverrideError),
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

/// Problems with the schema itself.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("unresolved schema reference \"{reference}\"")]
    UnresolvedReference { reference: String },

    #[error("schema reference \"{type_name}\" contains itself")]
    RecursiveReference { type_name: String },

    #[error("schema \"{schema}\" has no x-dcl-id and no CUSTOM_ID override")]
    MissingIdentity { schema: String },

    #[error("resource schema \"{name}\" not found in document")]
    MissingResource { name: String },

    #[error("unsupported number format {format:?}: only \"double\" is supported")]
    UnsupportedNumericFormat { format: Option<String> },

    #[error("default {value:?} is not a valid {field_type} literal")]
    InvalidDefault { value: String, field_type: String },

    #[error("fields of type {field_type} cannot declare a default")]
    UnsupportedDefault { field_type: String },
}

/// A single structural violation in an override document.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Violation {
    /// JSON Pointer (RFC 6901) to the offending value.
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Problems with override directives.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OverrideError {
    #[error("malformed override record #{index}: {message}")]
    Parse { index: usize, message: String },

    #[error("override document failed validation with {} error(s)", .violations.len())]
    Invalid { violations: Vec<Violation> },

    #[error("malformed {kind} details: {message}")]
    MalformedDetails { kind: String, message: String },

    #[error("found duplicate override of type {kind}{}", .field.as_ref().map(|f| format!(" on field {f}")).unwrap_or_default())]
    Duplicate {
        kind: String,
        field: Option<String>,
        location: String,
    },

    #[error("conflict partner not found: \"{partner}\" is not a sibling field")]
    ConflictPartnerNotFound { partner: String },
}

/// Field classifications that no structural rule or override resolves.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("field has no type and is not a virtual field")]
    UnclassifiedField,

    #[error("classification override must set exactly one of required, optional, or computed-only (required={required}, optional={optional}, computed={computed})")]
    InvalidClassification {
        required: bool,
        optional: bool,
        computed: bool,
    },
}

/// The underlying cause of a failed build.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildErrorKind {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Override(#[from] OverrideError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// A resource build failure, carrying the resource and field it happened on.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("resource {resource}{}: {kind}", .field.as_ref().map(|f| format!(", field {f}")).unwrap_or_default())]
pub struct BuildError {
    pub resource: String,
    pub field: Option<String>,
    #[source]
    pub kind: BuildErrorKind,
}

impl BuildError {
    pub(crate) fn new(
        resource: &str,
        field: Option<&str>,
        kind: impl Into<BuildErrorKind>,
    ) -> Self {
        Self {
            resource: resource.to_string(),
            field: field.map(String::from),
            kind: kind.into(),
        }
    }

    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}
