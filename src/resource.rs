//! Resource assembly: combines properties, identity, and resource-level
//! overrides into the value handed to code emission.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::{BuildError, OverrideError, SchemaError};
use crate::field_type::FieldType;
use crate::identity::{self, Identity};
use crate::naming::{snake_case, title_case};
use crate::overrides::{
    BasePathDetails, CustomizeDiffDetails, FunctionDetails, MutexDetails, OverrideKind,
    OverrideStore, ProductNameDetails, ResourceNameDetails, VirtualFieldDetails,
};
use crate::property::{Property, PropertyArena, PropertyBuilder, PropertyId, PropertyTree};
use crate::registry::ReusedTypeRegistry;
use crate::schema::{ext, SchemaDocument};

/// Default create/update/delete timeout.
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 10;

/// Locations whose name is not folded into the resource title.
const UNPREFIXED_LOCATIONS: &[&str] = &["", "zone"];

/// snake_case resource name: the schema title, prefixed with the location
/// unless it is `zone` or empty. `CUSTOM_RESOURCE_NAME` replaces it outright.
pub(crate) fn resource_title(
    schema_title: &str,
    overrides: &OverrideStore,
    location: &str,
) -> Result<String, OverrideError> {
    let custom: Option<ResourceNameDetails> =
        overrides.resource_override(OverrideKind::CustomResourceName, location)?;
    Ok(match custom {
        Some(d) => snake_case(&d.title),
        None if UNPREFIXED_LOCATIONS.contains(&location) => snake_case(schema_title),
        None => snake_case(&format!("{}{}", location, title_case(schema_title))),
    })
}

/// Per-invocation build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Provider prefix of type names, e.g. "google".
    pub provider: String,
    /// snake_case product name, e.g. "compute".
    pub product: String,
    /// Location variant to build; empty for resources without one.
    pub location: String,
}

impl BuildOptions {
    /// Options for `product` under the `google` provider, with no location.
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            provider: "google".to_string(),
            product: product.into(),
            location: String::new(),
        }
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timeouts {
    pub create_minutes: u32,
    pub update_minutes: u32,
    pub delete_minutes: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create_minutes: DEFAULT_TIMEOUT_MINUTES,
            update_minutes: DEFAULT_TIMEOUT_MINUTES,
            delete_minutes: DEFAULT_TIMEOUT_MINUTES,
        }
    }
}

/// Hooks and behaviors configured by resource-level overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceHooks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_create: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_create: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_delete: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_import: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_create_directive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_delete: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_serializer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append_to_base_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub customize_diff: Vec<String>,
    pub undeletable: bool,
    pub serialization_only: bool,
    pub has_sweeper: bool,
}

/// A fully resolved resource.
///
/// Built once by [`Resource::build`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// snake_case resource name, location-prefixed where applicable.
    pub title: String,
    /// snake_case schema title, without any location prefix.
    pub schema_title: String,
    pub description: String,
    pub provider: String,
    pub product: String,
    /// Replacement product for the type name; `Some("")` drops the product.
    pub alternate_product: Option<String>,
    pub location: String,
    pub identity: Identity,
    /// Sorted schema properties followed by virtual fields.
    pub properties: Vec<PropertyId>,
    pub arena: PropertyArena,
    pub reused_types: ReusedTypeRegistry,
    pub hooks: ResourceHooks,
    pub has_project: bool,
    pub state_hint: bool,
    pub timeouts: Timeouts,
}

impl Resource {
    /// Build the resource named `name` in `document`.
    ///
    /// # Errors
    ///
    /// Every failure is a [`BuildError`] naming the resource and, where one
    /// is involved, the field path. No partial resource is returned.
    pub fn build(
        document: &SchemaDocument,
        name: &str,
        overrides: &OverrideStore,
        options: &BuildOptions,
    ) -> Result<Resource, BuildError> {
        let location = options.location.as_str();
        let node = document
            .schema(name)
            .ok_or_else(|| {
                let missing = SchemaError::MissingResource {
                    name: name.to_string(),
                };
                BuildError::new(name, None, missing)
            })?;

        let at = |e: OverrideError| BuildError::new(name, None, e);

        let schema_title = node.title.as_deref().unwrap_or(name);
        let title = resource_title(schema_title, overrides, location).map_err(at)?;

        tracing::debug!(resource = %title, location, "building resource");

        let identity = identity::resolve(node, overrides, location)
            .map_err(|kind| BuildError::new(&title, None, kind))?;

        let mut builder =
            PropertyBuilder::new(document, overrides, location, &title, identity.fields());
        let mut properties = builder.build(node, None)?;

        for directive in overrides.all_of_kind(OverrideKind::VirtualField, location) {
            let details: VirtualFieldDetails = directive
                .decode()
                .map_err(|e| BuildError::new(&title, None, e))?;
            properties.push(builder.virtual_field(&details)?);
        }
        let (arena, reused_types) = builder.finish();

        let at = |e: OverrideError| BuildError::new(&title, None, e);
        let function = |kind| -> Result<Option<String>, BuildError> {
            Ok(overrides
                .resource_override::<FunctionDetails>(kind, location)
                .map_err(at)?
                .map(|d| d.function))
        };
        let flag = |kind| overrides.has_resource_override(kind, location).map_err(at);

        let hooks = ResourceHooks {
            mutex: overrides
                .resource_override::<MutexDetails>(OverrideKind::Mutex, location)
                .map_err(at)?
                .map(|d| d.mutex),
            pre_create: function(OverrideKind::PreCreateFunction)?,
            post_create: function(OverrideKind::PostCreateFunction)?,
            pre_delete: function(OverrideKind::PreDeleteFunction)?,
            custom_import: function(OverrideKind::CustomImportFunction)?,
            custom_create_directive: function(OverrideKind::CustomCreateDirectiveFunction)?,
            skip_delete: function(OverrideKind::SkipDeleteFunction)?,
            custom_serializer: function(OverrideKind::CustomSerializer)?,
            append_to_base_path: overrides
                .resource_override::<BasePathDetails>(OverrideKind::AppendToBasePath, location)
                .map_err(at)?
                .map(|d| d.suffix),
            customize_diff: overrides
                .resource_override::<CustomizeDiffDetails>(OverrideKind::CustomizeDiff, location)
                .map_err(at)?
                .map(|d| d.functions)
                .unwrap_or_default(),
            undeletable: flag(OverrideKind::Undeletable)?,
            serialization_only: flag(OverrideKind::SerializationOnly)?,
            has_sweeper: !flag(OverrideKind::NoSweeper)?,
        };

        let alternate_product = overrides
            .resource_override::<ProductNameDetails>(OverrideKind::CustomProductName, location)
            .map_err(at)?
            .map(|d| d.product);

        Ok(Resource {
            schema_title: snake_case(schema_title),
            description: node.description.clone(),
            provider: options.provider.clone(),
            product: options.product.clone(),
            alternate_product,
            location: options.location.clone(),
            identity,
            properties,
            arena,
            reused_types,
            hooks,
            has_project: node.properties.contains_key("project"),
            state_hint: node.ext_flag(ext::USES_STATE_HINT),
            timeouts: Timeouts::default(),
            title,
        })
    }

    pub fn property(&self, id: PropertyId) -> &Property {
        &self.arena[id]
    }

    /// Top-level property by display name.
    pub fn find(&self, name: &str) -> Option<&Property> {
        self.arena.find(&self.properties, name)
    }

    /// Top-level properties with collapsed objects replaced by their fields.
    pub fn schema_properties(&self) -> Vec<PropertyId> {
        self.arena.collapsed(&self.properties)
    }

    /// Object-valued properties, each shared type once at the end.
    pub fn objects(&self) -> Vec<PropertyId> {
        let mut out = self.arena.objects(&self.properties);
        for (_, canonical) in self.reused_types.enumerate() {
            out.push(canonical);
            out.extend(self.arena.objects(&self.arena[canonical].properties));
        }
        out
    }

    /// Enum-array properties at the top level and inside objects.
    pub fn enum_arrays(&self) -> Vec<PropertyId> {
        let is_enum_array =
            |id: &PropertyId| matches!(self.arena[*id].field_type, FieldType::EnumArray { .. });

        let mut out: Vec<PropertyId> =
            self.properties.iter().copied().filter(is_enum_array).collect();
        for object in self.objects() {
            out.extend(self.arena[object].properties.iter().copied().filter(is_enum_array));
        }
        out
    }

    /// Placeholder names of the id pattern.
    pub fn identity_fields(&self) -> Vec<String> {
        self.identity.fields()
    }

    /// True if an identity field is filled in by the server during create.
    pub fn has_server_generated_name(&self) -> bool {
        let identity_fields = self.identity_fields();
        self.properties.iter().any(|&id| {
            let p = &self.arena[id];
            !p.settable() && identity_fields.iter().any(|f| f == p.name())
        })
    }

    /// True if any schema property can change without recreating the resource.
    pub fn updatable(&self) -> bool {
        self.schema_properties().into_iter().any(|id| {
            let p = &self.arena[id];
            !p.force_new && !(p.computed && !p.optional)
        })
    }

    /// Provider type name, e.g. `google_compute_instance`.
    pub fn type_name(&self) -> String {
        match self.alternate_product.as_deref() {
            Some("") => format!("{}_{}", self.provider, self.title),
            Some(product) => format!("{}_{}_{}", self.provider, product, self.title),
            None => format!("{}_{}_{}", self.provider, self.product, self.title),
        }
    }

    /// Name of the id-rendering function; ids with slash-bearing fields can't be escaped.
    pub fn id_function(&self) -> &'static str {
        let slash = self
            .properties
            .iter()
            .any(|&id| self.arena[id].forward_slash_allowed);
        if slash {
            "replaceVars"
        } else {
            "replaceVarsForId"
        }
    }
}

struct ReusedTypes<'r>(&'r Resource);

impl Serialize for ReusedTypes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let resource = self.0;
        serializer.collect_map(resource.reused_types.enumerate().map(|(name, id)| {
            (
                name,
                PropertyTree::new(&resource.arena, &resource.arena[id].properties),
            )
        }))
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Resource", 13)?;
        s.serialize_field("type_name", &self.type_name())?;
        s.serialize_field("title", &self.title)?;
        s.serialize_field("description", &self.description)?;
        s.serialize_field("location", &self.location)?;
        s.serialize_field("id", &self.identity.id)?;
        s.serialize_field("import_formats", &self.identity.import_formats)?;
        s.serialize_field("updatable", &self.updatable())?;
        s.serialize_field("has_project", &self.has_project)?;
        s.serialize_field("state_hint", &self.state_hint)?;
        s.serialize_field("timeouts", &self.timeouts)?;
        s.serialize_field("hooks", &self.hooks)?;
        s.serialize_field("properties", &PropertyTree::new(&self.arena, &self.properties))?;
        s.serialize_field("reused_types", &ReusedTypes(self))?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn doc() -> SchemaDocument {
        serde_json::from_value(json!({
            "components": {
                "schemas": {
                    "Instance": {
                        "title": "Instance",
                        "description": "A VM.",
                        "type": "object",
                        "x-dcl-id": "projects/{{project}}/zones/{{zone}}/instances/{{name}}",
                        "required": ["name", "zone", "project"],
                        "properties": {
                            "name": { "type": "string" },
                            "zone": { "type": "string" },
                            "project": { "type": "string" },
                            "tags": {
                                "type": "array",
                                "items": { "type": "string", "enum": ["A", "B"] }
                            },
                            "selfLink": { "type": "string", "readOnly": true }
                        }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn store(raw: Value) -> OverrideStore {
        OverrideStore::load(&raw).unwrap()
    }

    fn build(d: &SchemaDocument, options: &BuildOptions) -> Resource {
        Resource::build(d, "Instance", &OverrideStore::default(), options).unwrap()
    }

    #[test]
    fn build_options_builder() {
        let opts = BuildOptions::new("compute").provider("acme").location("region");
        assert_eq!(opts.provider, "acme");
        assert_eq!(opts.product, "compute");
        assert_eq!(opts.location, "region");
    }

    #[test]
    fn title_and_type_name() {
        let d = doc();
        let zonal = build(&d, &BuildOptions::new("compute").location("zone"));
        assert_eq!(zonal.title, "instance");
        assert_eq!(zonal.type_name(), "google_compute_instance");

        let regional = build(&d, &BuildOptions::new("compute").location("region"));
        assert_eq!(regional.title, "region_instance");
        assert_eq!(regional.schema_title, "instance");
    }

    #[test]
    fn custom_resource_and_product_names() {
        let s = store(json!([
            { "type": "CUSTOM_RESOURCE_NAME", "details": { "title": "vmInstance" } },
            { "type": "CUSTOM_PRODUCT_NAME", "details": { "product": "" } }
        ]));
        let r = Resource::build(&doc(), "Instance", &s, &BuildOptions::new("compute")).unwrap();
        assert_eq!(r.title, "vm_instance");
        assert_eq!(r.type_name(), "google_vm_instance");
    }

    #[test]
    fn resource_hooks_from_overrides() {
        let s = store(json!([
            { "type": "MUTEX", "details": { "mutex": "instances/{{name}}" } },
            { "type": "PRE_CREATE_FUNCTION", "details": { "function": "tpgresource.Prepare" } },
            { "type": "CUSTOMIZE_DIFF", "details": { "functions": ["a", "b"] } },
            { "type": "NO_SWEEPER" },
            { "type": "UNDELETABLE" }
        ]));
        let r = Resource::build(&doc(), "Instance", &s, &BuildOptions::new("compute")).unwrap();
        assert_eq!(r.hooks.mutex.as_deref(), Some("instances/{{name}}"));
        assert_eq!(r.hooks.pre_create.as_deref(), Some("tpgresource.Prepare"));
        assert_eq!(r.hooks.customize_diff, vec!["a", "b"]);
        assert!(!r.hooks.has_sweeper);
        assert!(r.hooks.undeletable);
        assert!(!r.hooks.serialization_only);
        assert_eq!(r.timeouts.create_minutes, DEFAULT_TIMEOUT_MINUTES);
    }

    #[test]
    fn virtual_fields_follow_sorted_properties() {
        let s = store(json!([
            { "type": "VIRTUAL_FIELD", "details": { "name": "deletion_protection", "type": "boolean" } }
        ]));
        let r = Resource::build(&doc(), "Instance", &s, &BuildOptions::new("compute")).unwrap();
        let last = r.property(*r.properties.last().unwrap());
        assert_eq!(last.name(), "deletion_protection");
        assert!(last.is_virtual);
    }

    #[test]
    fn derived_views() {
        let r = build(&doc(), &BuildOptions::new("compute"));
        assert!(r.has_project);
        assert!(r.updatable());
        assert!(!r.has_server_generated_name());
        assert_eq!(r.enum_arrays().len(), 1);
        assert_eq!(r.id_function(), "replaceVarsForId");
        assert_eq!(r.identity_fields(), vec!["project", "zone", "name"]);
    }

    #[test]
    fn missing_resource_errors() {
        let err = Resource::build(
            &doc(),
            "Nope",
            &OverrideStore::default(),
            &BuildOptions::new("compute"),
        )
        .unwrap_err();
        assert_eq!(err.resource, "Nope");
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn serializes_nested_tree() {
        let r = build(&doc(), &BuildOptions::new("compute"));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["type_name"], "google_compute_instance");
        assert_eq!(v["import_formats"][0], v["id"]);
        let names: Vec<&str> = v["properties"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(names[0], "name");
        assert!(names.contains(&"self_link"));
    }
}
