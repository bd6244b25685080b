//! Schema document model.
//!
//! Schema documents are OpenAPI-shaped: resource and shared object schemas
//! live under `components.schemas`, and fields may point at shared schemas with
//! `$ref`. Behaviour beyond plain JSON Schema is carried in `x-*` extensions;
//! the keys this crate understands are listed in [`ext`].

use std::collections::BTreeMap;

use heck::ToUpperCamelCase;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;

/// Extension keys understood by the compiler. Anything else is ignored.
pub mod ext {
    /// Identity pattern of a resource, e.g. `projects/{{project}}/zones/{{zone}}/things/{{name}}`.
    pub const ID: &str = "x-dcl-id";
    pub const SERVER_GENERATED: &str = "x-dcl-server-generated-parameter";
    pub const CONFLICTS: &str = "x-dcl-conflicts";
    pub const GO_TYPE: &str = "x-dcl-go-type";
    pub const GO_NAME: &str = "x-dcl-go-name";
    pub const IMMUTABLE: &str = "x-kubernetes-immutable";
    /// `"set"` marks an array with unordered-unique semantics.
    pub const LIST_TYPE: &str = "x-dcl-list-type";
    pub const SENSITIVE: &str = "x-dcl-sensitive";
    pub const SERVER_DEFAULT: &str = "x-dcl-server-default";
    pub const EXTRACT_IF_EMPTY: &str = "x-dcl-extract-if-empty";
    pub const FORWARD_SLASH_ALLOWED: &str = "x-dcl-forward-slash-allowed";
    pub const REFERENCES: &str = "x-dcl-references";
    pub const USES_STATE_HINT: &str = "x-dcl-uses-state-hint";
}

/// Prefix of references into a document's shared schemas.
pub const COMPONENT_REF_PREFIX: &str = "#/components/schemas/";

/// JSON Schema type keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Boolean,
    String,
    Integer,
    Number,
    Object,
    Array,
}

impl TypeKind {
    /// Parse a type keyword, as written in virtual field overrides.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "boolean" => Some(TypeKind::Boolean),
            "string" => Some(TypeKind::String),
            "integer" => Some(TypeKind::Integer),
            "number" => Some(TypeKind::Number),
            "object" => Some(TypeKind::Object),
            "array" => Some(TypeKind::Array),
            _ => None,
        }
    }
}

/// One node of a schema tree. Immutable input to the compiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SchemaNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    #[serde(
        default,
        deserialize_with = "schema_or_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<Box<SchemaNode>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    /// Extension metadata bag. Unknown keys land here too and are ignored.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl SchemaNode {
    /// Create an empty node of the given kind.
    pub fn of_kind(kind: TypeKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Returns a boolean extension, treating absent or non-boolean values as false.
    pub fn ext_flag(&self, key: &str) -> bool {
        self.extensions
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Returns a string extension.
    pub fn ext_str(&self, key: &str) -> Option<&str> {
        self.extensions.get(key).and_then(Value::as_str)
    }

    /// Returns a list-of-strings extension. Non-string entries are skipped.
    pub fn ext_strings(&self, key: &str) -> Vec<String> {
        self.extensions
            .get(key)
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_ext(&self, key: &str) -> bool {
        self.extensions.contains_key(key)
    }

    /// True when the node marks a field the server generates.
    pub fn is_server_generated(&self) -> bool {
        self.read_only || self.ext_flag(ext::SERVER_GENERATED)
    }

    /// The declared default rendered as raw text, before typing.
    pub fn default_text(&self) -> Option<String> {
        match self.default.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// `additionalProperties` may be a boolean; only the schema form matters here.
fn schema_or_flag<'de, D>(deserializer: D) -> Result<Option<Box<SchemaNode>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SchemaOrFlag {
        Flag(bool),
        Schema(Box<SchemaNode>),
    }

    Ok(match Option::<SchemaOrFlag>::deserialize(deserializer)? {
        Some(SchemaOrFlag::Schema(schema)) => Some(schema),
        Some(SchemaOrFlag::Flag(_)) | None => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: IndexMap<String, SchemaNode>,
}

/// A parsed schema document holding one or more named schemas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub components: Components,
}

impl SchemaDocument {
    /// Look up a named schema.
    pub fn schema(&self, name: &str) -> Option<&SchemaNode> {
        self.components.schemas.get(name)
    }

    /// Resolve a `$ref` pointer to the shared schema it names.
    ///
    /// Accepts `#/components/schemas/<Name>` and bare `<Name>` forms.
    pub fn resolve_ref(&self, reference: &str) -> Result<SharedSchema<'_>, SchemaError> {
        let key = reference
            .strip_prefix(COMPONENT_REF_PREFIX)
            .unwrap_or(reference);
        if key.is_empty() || key.contains('/') || key.starts_with('#') {
            return Err(SchemaError::UnresolvedReference {
                reference: reference.to_string(),
            });
        }
        let node = self
            .components
            .schemas
            .get(key)
            .ok_or_else(|| SchemaError::UnresolvedReference {
                reference: reference.to_string(),
            })?;

        let type_name = node
            .ext_str(ext::GO_TYPE)
            .map(String::from)
            .unwrap_or_else(|| key.to_upper_camel_case());

        Ok(SharedSchema { type_name, node })
    }
}

/// A shared schema reached through `$ref`.
#[derive(Debug, Clone)]
pub struct SharedSchema<'a> {
    /// Name the shared type is registered and emitted under.
    pub type_name: String,
    pub node: &'a SchemaNode,
}
