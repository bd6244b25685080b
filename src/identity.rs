//! Resource identity: the id pattern and the import formats derived from it.
//!
//! An id pattern is a path with `{{token}}` placeholders, e.g.
//! `projects/{{project}}/zones/{{zone}}/things/{{name}}`. Import formats are
//! alternate strings a user may pass to import an existing resource, ordered so
//! the most specific one is tried first.

use serde::Serialize;

use crate::error::{BuildErrorKind, SchemaError};
use crate::naming::{placeholder, placeholders, rename_placeholders};
use crate::overrides::{IdDetails, ImportFormatDetails, NameDetails, OverrideKind, OverrideStore};
use crate::schema::{ext, SchemaNode};

/// Tokens dropped from the shorter derived import formats, in the order they are dropped.
const PROJECT_TOKEN: &str = "project";
const LOCATION_TOKENS: &[&str] = &["region", "zone"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Id pattern with `{{token}}` placeholders.
    pub id: String,
    /// Most specific first; the first entry is always `id`.
    pub import_formats: Vec<String>,
}

impl Identity {
    /// Placeholder names of the id pattern, in order.
    pub fn fields(&self) -> Vec<String> {
        placeholders(&self.id)
    }
}

/// Resolve the id pattern and import formats of a resource schema.
///
/// A `CUSTOM_ID` override replaces the schema's `x-dcl-id`; `CUSTOM_NAME`
/// overrides on fields named by a placeholder rename that placeholder. An
/// `IMPORT_FORMAT` override replaces the derived format list.
///
/// # Errors
///
/// Returns `SchemaError::MissingIdentity` when neither the schema nor an
/// override supplies an id pattern, or an override error for duplicate or
/// malformed directives.
pub fn resolve(
    node: &SchemaNode,
    overrides: &OverrideStore,
    location: &str,
) -> Result<Identity, BuildErrorKind> {
    let custom: Option<IdDetails> = overrides.resource_override(OverrideKind::CustomId, location)?;
    let id = match custom {
        Some(d) => d.id,
        None => node
            .ext_str(ext::ID)
            .map(String::from)
            .ok_or_else(|| SchemaError::MissingIdentity {
                schema: node.title.clone().unwrap_or_default(),
            })?,
    };

    let id = rename_placeholders(&id, |token| {
        let renamed: Option<NameDetails> =
            overrides.property_override(OverrideKind::CustomName, token, location)?;
        Ok::<_, BuildErrorKind>(renamed.map(|d| d.name))
    })?;

    let explicit: Option<ImportFormatDetails> =
        overrides.resource_override(OverrideKind::ImportFormat, location)?;
    let import_formats = match explicit {
        Some(d) => pin_first(&id, d.formats),
        None => default_import_formats(&id),
    };

    tracing::debug!(%id, formats = import_formats.len(), "resolved identity");
    Ok(Identity { id, import_formats })
}

/// Derive import formats from an id pattern.
///
/// Candidates are the full pattern, the `/`-joined placeholders, that without
/// `project`, and that without `region` and `zone`. Duplicates and empty
/// candidates are dropped. The full pattern stays first; the rest are ordered
/// by placeholder count, then segment count, both descending.
pub fn default_import_formats(id: &str) -> Vec<String> {
    let tokens = placeholders(id);
    let short = |skip: &[&str]| {
        tokens
            .iter()
            .filter(|t| !skip.contains(&t.as_str()))
            .map(|t| placeholder(t))
            .collect::<Vec<_>>()
            .join("/")
    };

    let mut without_location = vec![PROJECT_TOKEN];
    without_location.extend_from_slice(LOCATION_TOKENS);

    let mut rest = Vec::new();
    for candidate in [short(&[]), short(&[PROJECT_TOKEN]), short(&without_location)] {
        if !candidate.is_empty() && candidate != id && !rest.contains(&candidate) {
            rest.push(candidate);
        }
    }
    rest.sort_by(|a, b| specificity(b).cmp(&specificity(a)));

    let mut formats = Vec::with_capacity(rest.len() + 1);
    formats.push(id.to_string());
    formats.extend(rest);
    formats
}

/// (placeholder count, segment count) of a format.
pub fn specificity(format: &str) -> (usize, usize) {
    (placeholders(format).len(), format.split('/').count())
}

/// Put `id` at the front of an explicit format list, removing any other copy,
/// and order the rest by specificity like derived formats.
fn pin_first(id: &str, formats: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(formats.len() + 1);
    out.push(id.to_string());
    for format in formats {
        if !out.contains(&format) {
            out.push(format);
        }
    }
    out[1..].sort_by(|a, b| specificity(b).cmp(&specificity(a)));
    out
}
