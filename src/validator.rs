//! Structural validation of raw override documents.

use serde_json::{json, Value};

use crate::error::{OverrideError, Violation};
use crate::overrides::OverrideKind;

/// JSON Schema every override document must satisfy.
pub fn override_document_schema() -> Value {
    let kinds: Vec<&str> = OverrideKind::ALL.iter().map(|k| k.name()).collect();
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "required": ["type"],
            "additionalProperties": false,
            "properties": {
                "type": { "enum": kinds },
                "field": { "type": "string", "minLength": 1 },
                "location": { "type": "string" },
                "details": {}
            }
        }
    })
}

/// Validate a raw override document before it is decoded.
///
/// Reports every violation at once, each with a JSON Pointer into the document.
///
/// # Errors
///
/// Returns `OverrideError::Invalid` if the document doesn't match
/// [`override_document_schema`].
pub fn validate_overrides(document: &Value) -> Result<(), OverrideError> {
    let schema = override_document_schema();
    let validator = jsonschema::validator_for(&schema).map_err(|e| OverrideError::Invalid {
        violations: vec![Violation {
            path: String::new(),
            message: format!("invalid override schema: {}", e),
        }],
    })?;

    let violations: Vec<Violation> = validator
        .iter_errors(document)
        .map(|e| Violation {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(OverrideError::Invalid { violations })
    }
}
