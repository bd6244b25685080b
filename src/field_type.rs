//! Field type classification and typed default literals.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::schema::{ext, SchemaNode, TypeKind};

/// Classified shape of a field. Every consumer branches on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    String,
    /// A string restricted to an enum literal list.
    Enum,
    Int,
    Float,
    /// String-to-string map (object with uniformly string-typed additional properties).
    Map,
    /// Object with named fields.
    Object,
    List,
    /// Array with unordered-unique semantics.
    Set,
    /// Array whose items are enum strings. `unique` carries set semantics.
    EnumArray { unique: bool },
    /// No type declared. Only virtual fields may be untyped.
    Unknown,
}

impl FieldType {
    /// True for list, set, and enum-array types.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            FieldType::List | FieldType::Set | FieldType::EnumArray { .. }
        )
    }

    /// True for collections with unordered-unique semantics.
    pub fn is_set(&self) -> bool {
        matches!(self, FieldType::Set | FieldType::EnumArray { unique: true })
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldType::Bool
                | FieldType::String
                | FieldType::Enum
                | FieldType::Int
                | FieldType::Float
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Enum => "enum",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Map => "map",
            FieldType::Object => "object",
            FieldType::List => "list",
            FieldType::Set => "set",
            FieldType::EnumArray { unique: false } => "enum list",
            FieldType::EnumArray { unique: true } => "enum set",
            FieldType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classify a schema node's shape.
///
/// # Errors
///
/// Returns `SchemaError::UnsupportedNumericFormat` for numbers not in `double` format.
pub fn classify(node: &SchemaNode) -> Result<FieldType, SchemaError> {
    let Some(kind) = node.kind else {
        return Ok(FieldType::Unknown);
    };

    let field_type = match kind {
        TypeKind::Boolean => FieldType::Bool,
        TypeKind::String if !node.enum_values.is_empty() => FieldType::Enum,
        TypeKind::String => FieldType::String,
        TypeKind::Integer => FieldType::Int,
        TypeKind::Number => match node.format.as_deref() {
            Some("double") => FieldType::Float,
            other => {
                return Err(SchemaError::UnsupportedNumericFormat {
                    format: other.map(String::from),
                })
            }
        },
        TypeKind::Object => match node.additional_properties.as_deref() {
            Some(additional)
                if additional.kind == Some(TypeKind::String) && node.properties.is_empty() =>
            {
                FieldType::Map
            }
            _ => FieldType::Object,
        },
        TypeKind::Array => {
            let unique = node.ext_str(ext::LIST_TYPE) == Some("set");
            let enum_items = node
                .items
                .as_deref()
                .is_some_and(|items| !items.enum_values.is_empty());
            match (enum_items, unique) {
                (true, unique) => FieldType::EnumArray { unique },
                (false, true) => FieldType::Set,
                (false, false) => FieldType::List,
            }
        }
    };

    Ok(field_type)
}

/// A typed default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl DefaultValue {
    /// Parse raw default text under a field type.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidDefault` if the text does not parse under the
    /// type, or `SchemaError::UnsupportedDefault` for types that cannot carry one.
    pub fn parse(field_type: FieldType, raw: &str) -> Result<Self, SchemaError> {
        let invalid = || SchemaError::InvalidDefault {
            value: raw.to_string(),
            field_type: field_type.to_string(),
        };

        match field_type {
            FieldType::Bool => raw.parse().map(DefaultValue::Bool).map_err(|_| invalid()),
            FieldType::Int => raw.parse().map(DefaultValue::Int).map_err(|_| invalid()),
            FieldType::Float => match raw.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(DefaultValue::Float(f)),
                _ => Err(invalid()),
            },
            FieldType::String | FieldType::Enum => Ok(DefaultValue::String(raw.to_string())),
            FieldType::Map
            | FieldType::Object
            | FieldType::List
            | FieldType::Set
            | FieldType::EnumArray { .. }
            | FieldType::Unknown => Err(SchemaError::UnsupportedDefault {
                field_type: field_type.to_string(),
            }),
        }
    }

    /// Render as a source literal. Strings are double-quoted and escaped.
    pub fn literal(&self) -> String {
        match self {
            DefaultValue::Bool(b) => b.to_string(),
            DefaultValue::Int(i) => i.to_string(),
            // Debug keeps a fractional part so the literal reads back as a float.
            DefaultValue::Float(f) => format!("{:?}", f),
            DefaultValue::String(s) => Value::String(s.clone()).to_string(),
        }
    }

    /// Parse a literal produced by [`DefaultValue::literal`] back into a value.
    pub fn from_literal(field_type: FieldType, literal: &str) -> Result<Self, SchemaError> {
        match field_type {
            FieldType::String | FieldType::Enum => serde_json::from_str::<String>(literal)
                .map(DefaultValue::String)
                .map_err(|_| SchemaError::InvalidDefault {
                    value: literal.to_string(),
                    field_type: field_type.to_string(),
                }),
            other => Self::parse(other, literal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(v: serde_json::Value) -> SchemaNode {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn classify_scalars() {
        assert_eq!(classify(&node(json!({"type": "boolean"}))).unwrap(), FieldType::Bool);
        assert_eq!(classify(&node(json!({"type": "string"}))).unwrap(), FieldType::String);
        assert_eq!(classify(&node(json!({"type": "integer"}))).unwrap(), FieldType::Int);
        assert_eq!(
            classify(&node(json!({"type": "number", "format": "double"}))).unwrap(),
            FieldType::Float
        );
    }

    #[test]
    fn classify_enum_string() {
        let n = node(json!({"type": "string", "enum": ["A", "B"]}));
        assert_eq!(classify(&n).unwrap(), FieldType::Enum);
    }

    #[test]
    fn classify_number_without_double_errors() {
        let err = classify(&node(json!({"type": "number", "format": "float"}))).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedNumericFormat {
                format: Some("float".into())
            }
        );
        assert!(classify(&node(json!({"type": "number"}))).is_err());
    }

    #[test]
    fn classify_objects_and_maps() {
        let map = node(json!({"type": "object", "additionalProperties": {"type": "string"}}));
        assert_eq!(classify(&map).unwrap(), FieldType::Map);

        let obj = node(json!({"type": "object", "properties": {"a": {"type": "string"}}}));
        assert_eq!(classify(&obj).unwrap(), FieldType::Object);

        let int_map = node(json!({"type": "object", "additionalProperties": {"type": "integer"}}));
        assert_eq!(classify(&int_map).unwrap(), FieldType::Object);
    }

    #[test]
    fn named_fields_win_over_string_values() {
        let mixed = node(json!({
            "type": "object",
            "additionalProperties": {"type": "string"},
            "properties": {"env": {"type": "string"}}
        }));
        assert_eq!(classify(&mixed).unwrap(), FieldType::Object);
    }

    #[test]
    fn classify_arrays() {
        let list = node(json!({"type": "array", "items": {"type": "string"}}));
        assert_eq!(classify(&list).unwrap(), FieldType::List);

        let set = node(json!({"type": "array", "x-dcl-list-type": "set", "items": {"type": "string"}}));
        assert_eq!(classify(&set).unwrap(), FieldType::Set);

        let enums = node(json!({"type": "array", "items": {"type": "string", "enum": ["X"]}}));
        assert_eq!(classify(&enums).unwrap(), FieldType::EnumArray { unique: false });

        let enum_set = node(json!({
            "type": "array",
            "x-dcl-list-type": "set",
            "items": {"type": "string", "enum": ["X"]}
        }));
        let ft = classify(&enum_set).unwrap();
        assert_eq!(ft, FieldType::EnumArray { unique: true });
        assert!(ft.is_set());
    }

    #[test]
    fn classify_untyped_is_unknown() {
        assert_eq!(classify(&SchemaNode::default()).unwrap(), FieldType::Unknown);
    }

    #[test]
    fn default_literals() {
        assert_eq!(DefaultValue::parse(FieldType::Bool, "true").unwrap().literal(), "true");
        assert_eq!(DefaultValue::parse(FieldType::Int, "7").unwrap().literal(), "7");
        assert_eq!(DefaultValue::parse(FieldType::Float, "2").unwrap().literal(), "2.0");
        assert_eq!(
            DefaultValue::parse(FieldType::String, "say \"hi\"").unwrap().literal(),
            r#""say \"hi\"""#
        );
    }

    #[test]
    fn default_rejects_unparsable() {
        let err = DefaultValue::parse(FieldType::Int, "seven").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { field_type, .. } if field_type == "int"));

        let err = DefaultValue::parse(FieldType::List, "[]").unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedDefault { .. }));
    }

    #[test]
    fn literal_reads_back() {
        let cases = [
            (FieldType::Bool, "false"),
            (FieldType::Int, "-12"),
            (FieldType::Float, "0.25"),
            (FieldType::String, "a\\b\n"),
            (FieldType::Enum, "STANDARD"),
        ];
        for (ft, raw) in cases {
            let value = DefaultValue::parse(ft, raw).unwrap();
            let back = DefaultValue::from_literal(ft, &value.literal()).unwrap();
            assert_eq!(back, value, "{ft} default {raw:?}");
        }
    }
}
