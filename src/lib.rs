//! Resource Schema Compiler
//!
//! Turns a declarative API schema plus a layered set of override directives
//! into a normalized resource model: a tree of typed, classified fields with
//! identity and import metadata, ready for code emission.
//!
//! # Example
//!
//! ```
//! use resource_compiler::{load_schema_str, BuildOptions, OverrideStore, Resource};
//!
//! let document = load_schema_str(r#"{
//!     "components": { "schemas": { "Thing": {
//!         "title": "Thing",
//!         "type": "object",
//!         "x-dcl-id": "projects/{{project}}/things/{{name}}",
//!         "required": ["name"],
//!         "properties": {
//!             "name": { "type": "string" },
//!             "project": { "type": "string" },
//!             "createTime": { "type": "string", "readOnly": true }
//!         }
//!     }}}
//! }"#).unwrap();
//!
//! let options = BuildOptions::new("widgets");
//! let resource = Resource::build(&document, "Thing", &OverrideStore::default(), &options).unwrap();
//!
//! assert_eq!(resource.type_name(), "google_widgets_thing");
//! assert!(resource.find("name").unwrap().required);
//! assert!(resource.find("create_time").unwrap().computed_only());
//! assert_eq!(resource.identity.import_formats[0], "projects/{{project}}/things/{{name}}");
//! ```
//!
//! # Override Files
//!
//! Overrides are YAML or JSON lists of records:
//!
//! ```yaml
//! - type: EXCLUDE
//!   field: labels
//! - type: CUSTOM_NAME
//!   field: node_config.machine_type
//!   details:
//!     name: machine
//!   location: zone
//! ```
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `type` | Override kind, e.g. `EXCLUDE` |
//! | `field` | Dotted snake_case path; absent for resource-level kinds |
//! | `details` | Kind-specific payload |
//! | `location` | Restricts the record to one location; absent matches all |

mod error;
mod field_type;
mod identity;
mod linter;
mod loader;
mod naming;
mod overrides;
mod property;
mod registry;
mod resource;
mod schema;
mod validator;

pub use error::{
    BuildError, BuildErrorKind, ConfigurationError, LoadError, OverrideError, SchemaError,
    Violation,
};
pub use field_type::{classify, DefaultValue, FieldType};
pub use identity::{default_import_formats, resolve as resolve_identity, specificity, Identity};
pub use linter::{lint_overrides, Diagnostic, LintResult, Severity};
pub use loader::{
    load_overrides, load_overrides_str, load_schema, load_schema_str, load_value, parse_value,
    Format,
};
pub use naming::{placeholders, rename_placeholders, snake_case, title_case};
pub use overrides::{
    BasePathDetails, ConfigModeDetails, CustomizeDiffDetails, DefaultDetails, DescriptionDetails,
    DiffSuppressDetails, FunctionDetails, IdDetails, ImportFormatDetails, ListSizeDetails,
    MessageDetails, MutexDetails, NameDetails, OverrideDirective, OverrideKind, OverrideStore,
    ProductNameDetails, ResourceNameDetails, SchemaValuesDetails, Scope, VirtualFieldDetails,
};
pub use property::{
    DiffSuppress, IdentityGetter, Property, PropertyArena, PropertyBuilder,
    PropertyId, PropertyTree, SetHash, StateGetter, StateSetter, NAME_PREFIX_FIELD,
    PROVIDER_DEFAULT_FIELDS,
};
pub use registry::ReusedTypeRegistry;
pub use resource::{BuildOptions, Resource, ResourceHooks, Timeouts, DEFAULT_TIMEOUT_MINUTES};
pub use schema::{ext, SchemaDocument, SchemaNode, SharedSchema, TypeKind};
pub use validator::{override_document_schema, validate_overrides};
