//! Loading schema documents and override files.
//!
//! Files ending in `.yaml` or `.yml` are parsed as YAML; everything else as JSON.

use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;
use crate::overrides::OverrideStore;
use crate::schema::SchemaDocument;

/// Source format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Pick a format from a file extension. Unknown extensions are JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Format::Yaml,
            _ => Format::Json,
        }
    }
}

/// Read a file and parse it as a JSON value.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist, `ReadError` if
/// it can't be read, or `InvalidJson`/`InvalidYaml` if it doesn't parse.
pub fn load_value(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    parse_value(&content, Format::from_path(path))
}

/// Parse a document string as a JSON value.
pub fn parse_value(content: &str, format: Format) -> Result<Value, LoadError> {
    match format {
        Format::Json => {
            serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
        }
        Format::Yaml => {
            serde_yaml::from_str(content).map_err(|source| LoadError::InvalidYaml { source })
        }
    }
}

/// Load a schema document from a file.
pub fn load_schema(path: &Path) -> Result<SchemaDocument, LoadError> {
    let value = load_value(path)?;
    tracing::debug!(path = %path.display(), "loaded schema document");
    serde_json::from_value(value).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a schema document from a JSON string.
pub fn load_schema_str(content: &str) -> Result<SchemaDocument, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load an override file into a store.
///
/// # Errors
///
/// Load errors as for [`load_value`], or `LoadError::Override` if the document
/// fails validation or a record doesn't decode.
pub fn load_overrides(path: &Path) -> Result<OverrideStore, LoadError> {
    let value = load_value(path)?;
    let store = OverrideStore::load(&value)?;
    tracing::debug!(path = %path.display(), directives = store.len(), "loaded overrides");
    Ok(store)
}

/// Load overrides from a string in the given format.
pub fn load_overrides_str(content: &str, format: Format) -> Result<OverrideStore, LoadError> {
    let value = parse_value(content, format)?;
    Ok(OverrideStore::load(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a.yaml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("a.yml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("a.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a")), Format::Json);
    }

    #[test]
    fn load_schema_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"components": {{"schemas": {{"Thing": {{"type": "object"}}}}}}}}"#
        )
        .unwrap();

        let doc = load_schema(file.path()).unwrap();
        assert!(doc.schema("Thing").is_some());
    }

    #[test]
    fn load_schema_yaml_file() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "components:\n  schemas:\n    Thing:\n      type: object\n      x-dcl-id: things/{{{{name}}}}"
        )
        .unwrap();

        let doc = load_schema(file.path()).unwrap();
        let thing = doc.schema("Thing").unwrap();
        assert_eq!(thing.ext_str("x-dcl-id"), Some("things/{{name}}"));
    }

    #[test]
    fn load_schema_file_not_found() {
        let result = load_schema(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_schema_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_schema(file.path());
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn load_overrides_yaml() {
        let mut file = Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(
            file,
            "- type: EXCLUDE\n  field: labels\n- type: CUSTOM_NAME\n  field: machine_type\n  details:\n    name: machine"
        )
        .unwrap();

        let store = load_overrides(file.path()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn load_overrides_invalid_yaml() {
        let result = load_overrides_str("- type: [unclosed", Format::Yaml);
        assert!(matches!(result, Err(LoadError::InvalidYaml { .. })));
    }

    #[test]
    fn load_overrides_rejects_unknown_kind() {
        let result = load_overrides_str(r#"[{"type": "NOPE"}]"#, Format::Json);
        let err = result.unwrap_err();
        assert!(matches!(err, LoadError::Override(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn load_schema_str_invalid() {
        let result = load_schema_str("not json");
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }
}
