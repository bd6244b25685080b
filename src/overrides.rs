//! Override directives and the store that answers lookups against them.
//!
//! An override file is a list of records:
//!
//! ```yaml
//! - type: CUSTOM_NAME
//!   field: node_config.machine_type
//!   details:
//!     name: machine
//!   location: zone
//! ```
//!
//! Records without `field` target the resource; records without `location`
//! apply to every location. Single-valued lookups fail with
//! [`OverrideError::Duplicate`] when more than one record matches.

use std::collections::HashMap;
use std::fmt;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OverrideError;
use crate::validator::validate_overrides;

/// Whether an override kind targets the resource or one of its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Resource,
    Field,
}

macro_rules! override_kinds {
    ($( $(#[$meta:meta])* $variant:ident => $name:literal, $scope:ident, $details:ty; )*) => {
        /// Every supported override kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum OverrideKind {
            $(
                $(#[$meta])*
                #[serde(rename = $name)]
                $variant,
            )*
        }

        impl OverrideKind {
            pub const ALL: &'static [OverrideKind] = &[$(OverrideKind::$variant),*];

            /// The name used in override files.
            pub fn name(&self) -> &'static str {
                match self {
                    $(OverrideKind::$variant => $name,)*
                }
            }

            pub fn scope(&self) -> Scope {
                match self {
                    $(OverrideKind::$variant => Scope::$scope,)*
                }
            }

            fn check_details(&self, details: &Value) -> Result<(), serde_json::Error> {
                match self {
                    $(OverrideKind::$variant => {
                        serde_json::from_value::<$details>(details.clone()).map(|_| ())
                    })*
                }
            }
        }
    };
}

override_kinds! {
    /// Provider-only field with no schema counterpart. Repeatable.
    VirtualField => "VIRTUAL_FIELD", Resource, VirtualFieldDetails;
    CustomId => "CUSTOM_ID", Resource, IdDetails;
    CustomizeDiff => "CUSTOMIZE_DIFF", Resource, CustomizeDiffDetails;
    ImportFormat => "IMPORT_FORMAT", Resource, ImportFormatDetails;
    AppendToBasePath => "APPEND_TO_BASE_PATH", Resource, BasePathDetails;
    Mutex => "MUTEX", Resource, MutexDetails;
    PreCreateFunction => "PRE_CREATE_FUNCTION", Resource, FunctionDetails;
    PostCreateFunction => "POST_CREATE_FUNCTION", Resource, FunctionDetails;
    PreDeleteFunction => "PRE_DELETE_FUNCTION", Resource, FunctionDetails;
    CustomResourceName => "CUSTOM_RESOURCE_NAME", Resource, ResourceNameDetails;
    NoSweeper => "NO_SWEEPER", Resource, IgnoredAny;
    CustomImportFunction => "CUSTOM_IMPORT_FUNCTION", Resource, FunctionDetails;
    CustomCreateDirectiveFunction => "CUSTOM_CREATE_DIRECTIVE_FUNCTION", Resource, FunctionDetails;
    Undeletable => "UNDELETABLE", Resource, IgnoredAny;
    SkipDeleteFunction => "SKIP_DELETE_FUNCTION", Resource, FunctionDetails;
    SerializationOnly => "SERIALIZATION_ONLY", Resource, IgnoredAny;
    CustomSerializer => "CUSTOM_SERIALIZER", Resource, FunctionDetails;
    /// Alternate product name used in the provider type name.
    CustomProductName => "CUSTOM_PRODUCT_NAME", Resource, ProductNameDetails;

    CustomConfigMode => "CUSTOM_CONFIG_MODE", Field, ConfigModeDetails;
    CustomDescription => "CUSTOM_DESCRIPTION", Field, DescriptionDetails;
    NamePrefix => "NAME_PREFIX", Field, IgnoredAny;
    CustomName => "CUSTOM_NAME", Field, NameDetails;
    CustomStateGetter => "CUSTOM_STATE_GETTER", Field, FunctionDetails;
    CustomStateSetter => "CUSTOM_STATE_SETTER", Field, FunctionDetails;
    CustomValidation => "CUSTOM_VALIDATION", Field, FunctionDetails;
    Deprecated => "DEPRECATED", Field, MessageDetails;
    DiffSuppressFunc => "DIFF_SUPPRESS_FUNC", Field, DiffSuppressDetails;
    EnumBool => "ENUM_BOOL", Field, IgnoredAny;
    Exclude => "EXCLUDE", Field, IgnoredAny;
    CustomIdentityGetter => "CUSTOM_IDENTITY_GETTER", Field, FunctionDetails;
    Removed => "REMOVED", Field, MessageDetails;
    SetHashFunc => "SET_HASH_FUNC", Field, FunctionDetails;
    CollapsedObject => "COLLAPSED_OBJECT", Field, IgnoredAny;
    IgnoreRead => "IGNORE_READ", Field, IgnoredAny;
    GenerateIfNotSet => "GENERATE_IF_NOT_SET", Field, IgnoredAny;
    CustomListSizeConstraint => "CUSTOM_LIST_SIZE_CONSTRAINT", Field, ListSizeDetails;
    CustomDefault => "CUSTOM_DEFAULT", Field, DefaultDetails;
    /// Forces the required / optional / computed classification of a field.
    CustomSchemaValues => "CUSTOM_SCHEMA_VALUES", Field, SchemaValuesDetails;
}

impl OverrideKind {
    /// Kinds that may appear more than once for the same target.
    pub fn repeatable(&self) -> bool {
        matches!(self, OverrideKind::VirtualField)
    }
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VirtualFieldDetails {
    /// Field name, in snake_case.
    pub name: String,
    /// Type keyword, e.g. "string" or "boolean".
    #[serde(rename = "type", default)]
    pub field_type: String,
    /// Output-only when true.
    #[serde(default)]
    pub output: bool,
}

/// Details naming a single function.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionDetails {
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdDetails {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CustomizeDiffDetails {
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportFormatDetails {
    pub formats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BasePathDetails {
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MutexDetails {
    pub mutex: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceNameDetails {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductNameDetails {
    /// May be empty, which drops the product from the type name.
    pub product: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigModeDetails {
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DescriptionDetails {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NameDetails {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageDetails {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiffSuppressDetails {
    pub diff_suppress_func: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ListSizeDetails {
    #[serde(default)]
    pub min: i64,
    #[serde(default)]
    pub max: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DefaultDetails {
    /// Scalar default; numbers and booleans are accepted unquoted.
    pub default: Value,
}

impl DefaultDetails {
    /// The default as raw text, before typing.
    pub fn text(&self) -> String {
        match &self.default {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct SchemaValuesDetails {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub force_new: bool,
}

/// A single override record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideDirective {
    #[serde(rename = "type")]
    pub kind: OverrideKind,
    /// Dotted path of the targeted field, e.g. `node_config.machine_type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl OverrideDirective {
    pub fn new(kind: OverrideKind) -> Self {
        Self {
            kind,
            field: None,
            details: Value::Null,
            location: None,
        }
    }

    pub fn field(mut self, path: impl Into<String>) -> Self {
        self.field = Some(path.into());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Unscoped directives match every location.
    pub fn applies_to(&self, location: &str) -> bool {
        match &self.location {
            None => true,
            Some(scoped) => scoped == location,
        }
    }

    /// Decode this directive's details.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, OverrideError> {
        serde_json::from_value(self.details.clone()).map_err(|e| OverrideError::MalformedDetails {
            kind: self.kind.name().to_string(),
            message: e.to_string(),
        })
    }
}

type IndexKey = (OverrideKind, Option<String>);

/// Indexed, read-only collection of override directives for one resource.
#[derive(Debug, Clone, Default)]
pub struct OverrideStore {
    directives: Vec<OverrideDirective>,
    index: HashMap<IndexKey, Vec<usize>>,
}

impl OverrideStore {
    /// Build a store from already-decoded directives.
    ///
    /// # Errors
    ///
    /// Returns `OverrideError::Parse` if a directive's scope or details don't
    /// fit its kind.
    pub fn new(directives: Vec<OverrideDirective>) -> Result<Self, OverrideError> {
        let mut index: HashMap<IndexKey, Vec<usize>> = HashMap::new();

        for (i, directive) in directives.iter().enumerate() {
            check_directive(i, directive)?;
            index
                .entry((directive.kind, directive.field.clone()))
                .or_default()
                .push(i);
        }

        Ok(Self { directives, index })
    }

    /// Load a store from a raw override document (a list of records).
    ///
    /// # Errors
    ///
    /// Returns `OverrideError::Invalid` listing every structural violation, or
    /// `OverrideError::Parse` for records whose details don't fit their kind.
    pub fn load(raw: &Value) -> Result<Self, OverrideError> {
        validate_overrides(raw)?;

        let records = raw.as_array().map(Vec::as_slice).unwrap_or_default();
        let directives = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                serde_json::from_value(record.clone()).map_err(|e| OverrideError::Parse {
                    index,
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<OverrideDirective>, _>>()?;

        Self::new(directives)
    }

    pub fn directives(&self) -> &[OverrideDirective] {
        &self.directives
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    fn matching<'a>(
        &'a self,
        kind: OverrideKind,
        field: Option<&str>,
        location: &'a str,
    ) -> impl Iterator<Item = &'a OverrideDirective> + 'a {
        self.index
            .get(&(kind, field.map(String::from)))
            .into_iter()
            .flatten()
            .map(|&i| &self.directives[i])
            .filter(move |d| d.applies_to(location))
    }

    fn single<'s>(
        &'s self,
        kind: OverrideKind,
        field: Option<&str>,
        location: &'s str,
    ) -> Result<Option<&'s OverrideDirective>, OverrideError> {
        let mut matches = self.matching(kind, field, location);
        let first = matches.next();
        if first.is_some() && matches.next().is_some() {
            return Err(OverrideError::Duplicate {
                kind: kind.name().to_string(),
                field: field.map(String::from),
                location: location.to_string(),
            });
        }
        tracing::trace!(
            kind = kind.name(),
            ?field,
            location,
            found = first.is_some(),
            "override lookup"
        );
        Ok(first)
    }

    /// Look up a single-valued resource override and decode its details.
    pub fn resource_override<T: DeserializeOwned>(
        &self,
        kind: OverrideKind,
        location: &str,
    ) -> Result<Option<T>, OverrideError> {
        self.single(kind, None, location)?
            .map(OverrideDirective::decode)
            .transpose()
    }

    /// Whether a single-valued resource override is present.
    pub fn has_resource_override(
        &self,
        kind: OverrideKind,
        location: &str,
    ) -> Result<bool, OverrideError> {
        Ok(self.single(kind, None, location)?.is_some())
    }

    /// Look up a single-valued override on the field at `path` and decode its details.
    pub fn property_override<T: DeserializeOwned>(
        &self,
        kind: OverrideKind,
        path: &str,
        location: &str,
    ) -> Result<Option<T>, OverrideError> {
        self.single(kind, Some(path), location)?
            .map(OverrideDirective::decode)
            .transpose()
    }

    /// Whether a single-valued override is present on the field at `path`.
    pub fn has_property_override(
        &self,
        kind: OverrideKind,
        path: &str,
        location: &str,
    ) -> Result<bool, OverrideError> {
        Ok(self.single(kind, Some(path), location)?.is_some())
    }

    /// Every resource-level directive of a repeatable kind, in file order.
    pub fn all_of_kind<'a>(
        &'a self,
        kind: OverrideKind,
        location: &'a str,
    ) -> impl Iterator<Item = &'a OverrideDirective> + 'a {
        self.matching(kind, None, location)
    }
}

fn check_directive(index: usize, directive: &OverrideDirective) -> Result<(), OverrideError> {
    let kind = directive.kind;
    match (kind.scope(), directive.field.as_deref()) {
        (Scope::Field, None) | (Scope::Field, Some("")) => {
            return Err(OverrideError::Parse {
                index,
                message: format!("{} requires a field", kind),
            })
        }
        (Scope::Resource, Some(field)) => {
            return Err(OverrideError::Parse {
                index,
                message: format!("{} applies to the resource, not field {}", kind, field),
            })
        }
        _ => {}
    }

    kind.check_details(&directive.details)
        .map_err(|e| OverrideError::Parse {
            index,
            message: format!("invalid {} details: {}", kind, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(raw: Value) -> OverrideStore {
        OverrideStore::load(&raw).unwrap()
    }

    #[test]
    fn kind_names_round_trip_through_serde() {
        for kind in OverrideKind::ALL {
            let v = serde_json::to_value(kind).unwrap();
            assert_eq!(v, json!(kind.name()));
            let back: OverrideKind = serde_json::from_value(v).unwrap();
            assert_eq!(back, *kind);
        }
    }

    #[test]
    fn property_override_found_with_details() {
        let s = store(json!([
            { "type": "CUSTOM_NAME", "field": "machine_type", "details": { "name": "machine" } }
        ]));
        let found: Option<NameDetails> = s
            .property_override(OverrideKind::CustomName, "machine_type", "zone")
            .unwrap();
        assert_eq!(found.unwrap().name, "machine");

        let missing: Option<NameDetails> = s
            .property_override(OverrideKind::CustomName, "other", "zone")
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn location_scoping() {
        let s = store(json!([
            { "type": "EXCLUDE", "field": "zone", "location": "region" },
            { "type": "EXCLUDE", "field": "labels" }
        ]));
        assert!(s.has_property_override(OverrideKind::Exclude, "zone", "region").unwrap());
        assert!(!s.has_property_override(OverrideKind::Exclude, "zone", "zone").unwrap());
        assert!(s.has_property_override(OverrideKind::Exclude, "labels", "zone").unwrap());
        assert!(s.has_property_override(OverrideKind::Exclude, "labels", "").unwrap());
    }

    #[test]
    fn duplicate_single_valued_override_errors() {
        let s = store(json!([
            { "type": "MUTEX", "details": { "mutex": "a" } },
            { "type": "MUTEX", "details": { "mutex": "b" }, "location": "zone" }
        ]));
        let err = s
            .resource_override::<MutexDetails>(OverrideKind::Mutex, "zone")
            .unwrap_err();
        assert!(matches!(err, OverrideError::Duplicate { ref kind, field: None, .. } if kind == "MUTEX"));

        // The scoped record doesn't apply to "region", so only one matches there.
        let found = s
            .resource_override::<MutexDetails>(OverrideKind::Mutex, "region")
            .unwrap();
        assert_eq!(found.unwrap().mutex, "a");
    }

    #[test]
    fn all_of_kind_returns_every_match() {
        let s = store(json!([
            { "type": "VIRTUAL_FIELD", "details": { "name": "a", "type": "string" } },
            { "type": "VIRTUAL_FIELD", "details": { "name": "b", "type": "boolean" } },
            { "type": "VIRTUAL_FIELD", "details": { "name": "c", "type": "string" }, "location": "region" }
        ]));
        let names: Vec<String> = s
            .all_of_kind(OverrideKind::VirtualField, "zone")
            .map(|d| d.decode::<VirtualFieldDetails>().unwrap().name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn field_kind_without_field_is_rejected() {
        let err =
            OverrideStore::new(vec![OverrideDirective::new(OverrideKind::Exclude)]).unwrap_err();
        assert!(matches!(err, OverrideError::Parse { index: 0, ref message } if message.contains("requires a field")));
    }

    #[test]
    fn resource_kind_with_field_is_rejected() {
        let err = OverrideStore::new(vec![
            OverrideDirective::new(OverrideKind::NoSweeper).field("name"),
        ])
        .unwrap_err();
        assert!(matches!(err, OverrideError::Parse { .. }));
    }

    #[test]
    fn malformed_details_rejected_at_load() {
        let err = OverrideStore::load(&json!([
            { "type": "CUSTOM_NAME", "field": "a" },
            { "type": "CUSTOM_LIST_SIZE_CONSTRAINT", "field": "b", "details": { "max": "lots" } }
        ]))
        .unwrap_err();
        assert!(matches!(err, OverrideError::Parse { index: 0, .. }));
    }

    #[test]
    fn unknown_kind_fails_validation() {
        let err = OverrideStore::load(&json!([{ "type": "NOT_A_KIND" }])).unwrap_err();
        assert!(matches!(err, OverrideError::Invalid { .. }));
    }

    #[test]
    fn default_details_accept_unquoted_scalars() {
        let s = store(json!([
            { "type": "CUSTOM_DEFAULT", "field": "size", "details": { "default": 10 } }
        ]));
        let d: DefaultDetails = s
            .property_override(OverrideKind::CustomDefault, "size", "")
            .unwrap()
            .unwrap();
        assert_eq!(d.text(), "10");
    }
}
