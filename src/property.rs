//! Resource properties and the recursive pass that builds them from a schema.
//!
//! Properties live in a [`PropertyArena`] and refer to each other by
//! [`PropertyId`]: a property lists its children by id and points back at its
//! parent by id, so the tree has a single owner and no reference cycles.
//!
//! # Mutability
//!
//! Every property is exactly one of *required*, *optional*, or *computed-only*
//! (computed without being required or optional). `settable` is derived as
//! `required || optional` and is never stored.
//!
//! | Source | Result |
//! |--------|--------|
//! | `readOnly` / server-generated, or computed parent | computed |
//! | listed in the parent's `required` | required |
//! | otherwise | optional |
//! | `CUSTOM_SCHEMA_VALUES` override | replaces all of the above |
//! | settable `project` / `region` / `zone` | optional + computed, provider default |

use std::collections::{BTreeSet, HashMap};
use std::ops::Index;

use serde::{Serialize, Serializer};

use crate::error::{BuildError, BuildErrorKind, ConfigurationError, OverrideError, SchemaError};
use crate::field_type::{classify, DefaultValue, FieldType};
use crate::naming::{snake_case, title_case};
use crate::overrides::{
    ConfigModeDetails, DefaultDetails, DescriptionDetails, DiffSuppressDetails, FunctionDetails,
    ListSizeDetails, MessageDetails, NameDetails, OverrideKind, OverrideStore,
    SchemaValuesDetails, VirtualFieldDetails,
};
use crate::registry::ReusedTypeRegistry;
use crate::schema::{ext, SchemaDocument, SchemaNode, TypeKind};

/// Fields that fall back to provider-level defaults when unset.
pub const PROVIDER_DEFAULT_FIELDS: &[&str] = &["project", "region", "zone"];

/// Name of the sibling injected by a `NAME_PREFIX` override.
pub const NAME_PREFIX_FIELD: &str = "name_prefix";

/// Index of a property in its [`PropertyArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PropertyId(usize);

impl PropertyId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// How a field's value is read from user configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateGetter {
    /// Read directly from configuration.
    Config,
    /// Server-generated identity field, populated after create.
    Deferred,
    /// Read from the variable its identity getter resolved.
    IdentityVariable,
    /// Reassembled from fields spliced into the parent.
    Collapsed,
    /// Three-state boolean carried as a string.
    EnumBool,
    /// Generated when the user leaves it unset.
    Generated,
    Custom(String),
}

/// How a field's value is written back to state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSetter {
    Default,
    CollapsedObject,
    EnumBool,
    Custom(String),
}

/// Resolution of identity values that can come from somewhere other than config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityGetter {
    /// Falls back to a provider-level default, e.g. `getProject`.
    ProviderDefault { function: String },
    /// Generates a unique value, optionally prefixed by a sibling field's value.
    GenerateIfNotSet { prefix_field: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffSuppress {
    /// Treat a self link and a bare resource name as equal.
    ReferenceLink,
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetHash {
    /// Hash scalar string elements.
    String,
    /// Hash nested object elements.
    Resource,
    Custom(String),
}

/// One field of a resource or nested object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    /// Normalized (snake_case) schema name.
    pub title: String,
    /// Display name from a `CUSTOM_NAME` override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    /// TitleCase name used for generated type and function names.
    pub package_name: String,
    /// Dotted path of schema titles from the resource root, used to target overrides.
    pub path: String,
    pub field_type: FieldType,
    /// Element type of maps and scalar collections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<FieldType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub force_new: bool,
    pub sensitive: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<i64>,

    /// Sub-properties of objects and lists of objects, sorted.
    #[serde(skip)]
    pub properties: Vec<PropertyId>,
    #[serde(skip)]
    pub parent: Option<PropertyId>,
    /// Spliced into the parent instead of appearing as its own field.
    pub collapsed: bool,
    /// Name of the shared type this property instantiates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reused_type: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub conflicts_with: BTreeSet<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_getter: Option<StateGetter>,
    /// `None` means the value is never written back to state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_setter: Option<StateSetter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_getter: Option<IdentityGetter>,
    pub enum_bool: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_suppress: Option<DiffSuppress>,
    /// Diff suppression applied to each element of a scalar collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_diff_suppress: Option<DiffSuppress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_hash: Option<SetHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    /// Value refers to another resource by link or name.
    pub references_resource: bool,
    pub forward_slash_allowed: bool,
    /// Provider-only field injected by a `VIRTUAL_FIELD` override.
    pub is_virtual: bool,
}

impl Property {
    fn new(title: String, path: String, field_type: FieldType) -> Self {
        Self {
            package_name: title_case(&title),
            title,
            custom_name: None,
            path,
            field_type,
            item_type: None,
            enum_values: Vec::new(),
            description: String::new(),
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            min_items: None,
            max_items: None,
            properties: Vec::new(),
            parent: None,
            collapsed: false,
            reused_type: None,
            conflicts_with: BTreeSet::new(),
            state_getter: None,
            state_setter: None,
            identity_getter: None,
            enum_bool: false,
            diff_suppress: None,
            item_diff_suppress: None,
            validation: None,
            set_hash: None,
            config_mode: None,
            removed: None,
            deprecated: None,
            references_resource: false,
            forward_slash_allowed: false,
            is_virtual: false,
        }
    }

    /// Display name: the custom name if overridden, else the schema title.
    pub fn name(&self) -> &str {
        self.custom_name.as_deref().unwrap_or(&self.title)
    }

    pub fn settable(&self) -> bool {
        self.required || self.optional
    }

    pub fn computed_only(&self) -> bool {
        self.computed && !self.required && !self.optional
    }

    /// The default rendered as a source literal.
    pub fn default_literal(&self) -> Option<String> {
        self.default.as_ref().map(DefaultValue::literal)
    }

    pub fn has_sub_properties(&self) -> bool {
        !self.properties.is_empty()
    }

    /// A scalar collection (not a list of objects).
    pub fn is_array(&self) -> bool {
        self.field_type.is_collection() && self.properties.is_empty()
    }

    /// True for identity fields filled in after create rather than from config.
    pub fn is_server_generated_name(&self) -> bool {
        self.state_getter.is_some() && !self.settable()
    }

    fn sort_rank(&self) -> u8 {
        if self.required {
            0
        } else if self.settable() {
            1
        } else {
            2
        }
    }
}

/// Owner of every property built for one resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyArena {
    nodes: Vec<Property>,
}

impl PropertyArena {
    fn alloc(&mut self, property: Property) -> PropertyId {
        self.nodes.push(property);
        PropertyId(self.nodes.len() - 1)
    }

    fn get_mut(&mut self, id: PropertyId) -> &mut Property {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: PropertyId) -> Option<&Property> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: PropertyId) -> Option<&Property> {
        self[id].parent.map(|p| &self[p])
    }

    /// Direct sub-properties of `id`, in sorted order.
    pub fn children(&self, id: PropertyId) -> impl Iterator<Item = &Property> + '_ {
        self[id].properties.iter().map(move |&c| &self[c])
    }

    /// Every property in the arena, including collapsed and unreachable ones.
    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, &Property)> + '_ {
        self.nodes.iter().enumerate().map(|(i, p)| (PropertyId(i), p))
    }

    /// Find a sibling in `ids` by display name.
    pub fn find<'p>(&'p self, ids: &[PropertyId], name: &str) -> Option<&'p Property> {
        ids.iter().map(|&id| &self[id]).find(|p| p.name() == name)
    }

    /// Replace collapsed objects in `ids` with their (recursively collapsed) sub-properties.
    pub fn collapsed(&self, ids: &[PropertyId]) -> Vec<PropertyId> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            let p = &self[id];
            if p.collapsed && p.has_sub_properties() {
                out.extend(self.collapsed(&p.properties));
            } else {
                out.push(id);
            }
        }
        out
    }

    /// Object-valued properties under `ids`, depth first. Properties that
    /// instantiate a shared type are skipped; shared types are emitted once
    /// from the registry instead.
    pub fn objects(&self, ids: &[PropertyId]) -> Vec<PropertyId> {
        let mut out = Vec::new();
        for &id in ids {
            let p = &self[id];
            if p.has_sub_properties() && p.reused_type.is_none() {
                out.push(id);
                out.extend(self.objects(&p.properties));
            }
        }
        out
    }
}

impl Index<PropertyId> for PropertyArena {
    type Output = Property;

    fn index(&self, id: PropertyId) -> &Property {
        &self.nodes[id.0]
    }
}

/// Serializes a property list as a nested tree, sub-properties inline.
#[derive(Debug, Clone, Copy)]
pub struct PropertyTree<'r> {
    arena: &'r PropertyArena,
    ids: &'r [PropertyId],
}

impl<'r> PropertyTree<'r> {
    pub fn new(arena: &'r PropertyArena, ids: &'r [PropertyId]) -> Self {
        Self { arena, ids }
    }

    fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Serialize)]
struct PropertyNode<'r> {
    #[serde(flatten)]
    property: &'r Property,
    #[serde(skip_serializing_if = "PropertyTree::is_empty")]
    properties: PropertyTree<'r>,
}

impl Serialize for PropertyTree<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.ids.iter().map(|&id| {
            let property = &self.arena[id];
            PropertyNode {
                property,
                properties: PropertyTree::new(self.arena, &property.properties),
            }
        }))
    }
}

/// Attach resource and field context to a lower-level error.
trait AtField<T> {
    fn at(self, resource: &str, path: &str) -> Result<T, BuildError>;
}

impl<T, E: Into<BuildErrorKind>> AtField<T> for Result<T, E> {
    fn at(self, resource: &str, path: &str) -> Result<T, BuildError> {
        self.map_err(|e| BuildError::new(resource, Some(path), e))
    }
}

/// Builds the property tree of one resource.
///
/// Holds the per-invocation state (arena and reused-type registry); nothing is
/// shared between builders, so independent resources may be built in parallel.
#[derive(Debug)]
pub struct PropertyBuilder<'a> {
    document: &'a SchemaDocument,
    overrides: &'a OverrideStore,
    location: &'a str,
    resource: &'a str,
    identity_fields: Vec<String>,
    arena: PropertyArena,
    registry: ReusedTypeRegistry,
    /// Shared types currently being expanded, innermost last.
    expanding: Vec<String>,
}

impl<'a> PropertyBuilder<'a> {
    /// `resource` is the snake_case resource name used in errors and for
    /// renaming a top-level `id` field; `identity_fields` are the placeholder
    /// names of the resource's id pattern.
    pub fn new(
        document: &'a SchemaDocument,
        overrides: &'a OverrideStore,
        location: &'a str,
        resource: &'a str,
        identity_fields: Vec<String>,
    ) -> Self {
        Self {
            document,
            overrides,
            location,
            resource,
            identity_fields,
            arena: PropertyArena::default(),
            registry: ReusedTypeRegistry::new(),
            expanding: Vec::new(),
        }
    }

    pub fn arena(&self) -> &PropertyArena {
        &self.arena
    }

    pub fn registry(&self) -> &ReusedTypeRegistry {
        &self.registry
    }

    pub fn finish(self) -> (PropertyArena, ReusedTypeRegistry) {
        (self.arena, self.registry)
    }

    /// Build the sorted property list for the fields of `schema`.
    ///
    /// # Errors
    ///
    /// Fails fast on the first schema, override, or classification error; no
    /// partial result is returned.
    pub fn build(
        &mut self,
        schema: &SchemaNode,
        parent: Option<PropertyId>,
    ) -> Result<Vec<PropertyId>, BuildError> {
        let mut props = Vec::with_capacity(schema.properties.len());
        let mut declared_conflicts: Vec<(PropertyId, Vec<String>)> = Vec::new();

        for (key, field) in &schema.properties {
            let title = if parent.is_none() && key == "id" {
                snake_case(&format!("{}_id", self.resource))
            } else {
                snake_case(key)
            };
            let path = match parent {
                Some(p) => format!("{}.{}", self.arena[p].path, title),
                None => title.clone(),
            };

            let Some((id, conflicts)) = self.build_field(key, field, schema, parent, title, &path)?
            else {
                continue;
            };

            if !conflicts.is_empty() {
                declared_conflicts.push((id, conflicts));
            }
            let wants_prefix = matches!(
                self.arena[id].identity_getter,
                Some(IdentityGetter::GenerateIfNotSet { prefix_field: Some(_) })
            );
            if wants_prefix {
                props.push(self.name_prefix_sibling(id, parent));
            }
            props.push(id);
        }

        self.resolve_conflicts(&props, declared_conflicts)?;

        let arena = &self.arena;
        props.sort_by(|&l, &r| {
            let (l, r) = (&arena[l], &arena[r]);
            l.sort_rank()
                .cmp(&r.sort_rank())
                .then_with(|| l.name().cmp(r.name()))
        });

        Ok(props)
    }

    /// Follow a `$ref` to the shared schema, returning it with its type name.
    fn follow_ref<'n>(
        &self,
        node: &'n SchemaNode,
        path: &str,
    ) -> Result<(&'n SchemaNode, Option<String>), BuildError>
    where
        'a: 'n,
    {
        match &node.reference {
            Some(reference) => {
                let shared = self.document.resolve_ref(reference).at(self.resource, path)?;
                Ok((shared.node, Some(shared.type_name)))
            }
            None => Ok((node, None)),
        }
    }

    /// Build one field, returning its id and declared conflict partners, or
    /// `None` if an override excludes it.
    fn build_field(
        &mut self,
        key: &str,
        field: &SchemaNode,
        schema: &SchemaNode,
        parent: Option<PropertyId>,
        title: String,
        path: &str,
    ) -> Result<Option<(PropertyId, Vec<String>)>, BuildError> {
        let (resource, location, overrides) = (self.resource, self.location, self.overrides);

        let (node, reused_type) = self.follow_ref(field, path)?;

        if overrides
            .has_property_override(OverrideKind::Exclude, path, location)
            .at(resource, path)?
        {
            tracing::debug!(resource, field = path, "excluded by override");
            return Ok(None);
        }

        let field_type = classify(node).at(resource, path)?;
        if field_type == FieldType::Unknown {
            return Err(BuildError::new(
                resource,
                Some(path),
                ConfigurationError::UnclassifiedField,
            ));
        }

        let mut p = Property::new(title, path.to_string(), field_type);
        p.parent = parent;
        p.reused_type = reused_type;
        p.description = node.description.clone();
        p.enum_values = node.enum_values.clone();
        if let Some(go_name) = node.ext_str(ext::GO_NAME) {
            p.package_name = go_name.to_string();
        }

        let custom_default: Option<DefaultDetails> = overrides
            .property_override(OverrideKind::CustomDefault, path, location)
            .at(resource, path)?;
        let raw_default = custom_default.map(|d| d.text()).or_else(|| node.default_text());
        if let Some(raw) = raw_default {
            p.default = Some(DefaultValue::parse(field_type, &raw).at(resource, path)?);
        }

        let custom_name: Option<NameDetails> = overrides
            .property_override(OverrideKind::CustomName, path, location)
            .at(resource, path)?;
        p.custom_name = custom_name.map(|d| d.name);

        if field_type == FieldType::Map {
            p.item_type = Some(FieldType::String);
        }
        p.sensitive = node.ext_flag(ext::SENSITIVE);
        p.references_resource = node.has_ext(ext::REFERENCES);

        let parent_computed = parent.is_some_and(|id| self.arena[id].computed);
        p.computed = node.is_server_generated() || parent_computed;

        // Allocated before recursing so children can point back at it.
        let id = self.arena.alloc(p);

        let shared = self.arena[id].reused_type.clone();
        self.enter(shared.as_deref(), path)?;

        if !node.properties.is_empty() {
            let children = self.build(node, Some(id))?;
            let p = self.arena.get_mut(id);
            p.properties = children;
            if !p.computed {
                p.max_items = Some(1);
            }
        }

        if let Some(items) = node.items.as_deref() {
            self.build_items(id, items, path)?;
        }

        if shared.is_some() {
            self.expanding.pop();
        }

        self.classify_mutability(id, key, node, schema, parent.is_none())?;
        self.apply_field_overrides(id)?;

        if let Some(type_name) = self.arena[id].reused_type.clone() {
            self.registry.register(&type_name, id);
        }

        Ok(Some((id, node.ext_strings(ext::CONFLICTS))))
    }

    /// Mark a shared type as being expanded, failing if it already is.
    fn enter(&mut self, type_name: Option<&str>, path: &str) -> Result<(), BuildError> {
        let Some(name) = type_name else {
            return Ok(());
        };
        if self.expanding.iter().any(|t| t == name) {
            return Err(BuildError::new(
                self.resource,
                Some(path),
                SchemaError::RecursiveReference {
                    type_name: name.to_string(),
                },
            ));
        }
        self.expanding.push(name.to_string());
        Ok(())
    }

    fn build_items(
        &mut self,
        id: PropertyId,
        items: &SchemaNode,
        path: &str,
    ) -> Result<(), BuildError> {
        let (resource, location) = (self.resource, self.location);

        let sizes: Option<ListSizeDetails> = self
            .overrides
            .property_override(OverrideKind::CustomListSizeConstraint, path, location)
            .at(resource, path)?;
        if let Some(sizes) = sizes {
            let p = self.arena.get_mut(id);
            if sizes.max > 0 {
                p.max_items = Some(sizes.max);
            }
            if sizes.min > 0 {
                p.min_items = Some(sizes.min);
            }
        }

        let (item_node, item_type_name) = self.follow_ref(items, path)?;
        if !item_node.properties.is_empty() {
            self.enter(item_type_name.as_deref(), path)?;
            let children = self.build(item_node, Some(id))?;
            if item_type_name.is_some() {
                self.expanding.pop();
            }
            let p = self.arena.get_mut(id);
            p.properties = children;
            if p.reused_type.is_none() {
                p.reused_type = item_type_name;
            }
            return Ok(());
        }

        let item_type = classify(item_node).at(resource, path)?;
        if item_type == FieldType::Unknown {
            return Err(BuildError::new(
                resource,
                Some(path),
                ConfigurationError::UnclassifiedField,
            ));
        }
        let p = self.arena.get_mut(id);
        p.item_type = Some(item_type);
        if p.references_resource {
            p.item_diff_suppress = Some(DiffSuppress::ReferenceLink);
        }
        if p.enum_values.is_empty() {
            p.enum_values = item_node.enum_values.clone();
        }
        Ok(())
    }

    fn classify_mutability(
        &mut self,
        id: PropertyId,
        key: &str,
        node: &SchemaNode,
        schema: &SchemaNode,
        top_level: bool,
    ) -> Result<(), BuildError> {
        let (resource, location, overrides) = (self.resource, self.location, self.overrides);
        let path = self.arena[id].path.clone();

        let forced: Option<SchemaValuesDetails> = overrides
            .property_override(OverrideKind::CustomSchemaValues, &path, location)
            .at(resource, &path)?;
        let custom_identity_getter: Option<FunctionDetails> = overrides
            .property_override(OverrideKind::CustomIdentityGetter, &path, location)
            .at(resource, &path)?;

        let p = self.arena.get_mut(id);
        match forced {
            Some(v) => {
                let computed_only = v.computed && !v.required && !v.optional;
                if [v.required, v.optional, computed_only].iter().filter(|&&b| b).count() != 1 {
                    return Err(BuildError::new(
                        resource,
                        Some(path.as_str()),
                        ConfigurationError::InvalidClassification {
                            required: v.required,
                            optional: v.optional,
                            computed: v.computed,
                        },
                    ));
                }
                p.required = v.required;
                p.optional = v.optional;
                p.computed = v.computed;
                p.force_new |= v.force_new;
            }
            None if !p.computed => {
                p.required = schema.required.iter().any(|r| r == key);
                p.optional = !p.required;
            }
            None => {}
        }

        if !p.settable() {
            if top_level && self.identity_fields.iter().any(|f| f == p.name()) {
                p.state_getter = Some(StateGetter::Deferred);
            }
            return Ok(());
        }

        if node.ext_flag(ext::IMMUTABLE) {
            p.force_new = true;
        }
        if node.ext_flag(ext::SERVER_DEFAULT) || node.ext_flag(ext::EXTRACT_IF_EMPTY) {
            p.computed = true;
        }
        p.forward_slash_allowed = node.ext_flag(ext::FORWARD_SLASH_ALLOWED);

        let provider_default = PROVIDER_DEFAULT_FIELDS.contains(&p.title.as_str())
            || p.custom_name
                .as_deref()
                .is_some_and(|n| PROVIDER_DEFAULT_FIELDS.contains(&n));

        if provider_default {
            p.optional = true;
            p.required = false;
            p.computed = true;
            p.state_getter = Some(StateGetter::IdentityVariable);
            p.identity_getter = Some(IdentityGetter::ProviderDefault {
                function: custom_identity_getter
                    .map(|c| c.function)
                    .unwrap_or_else(|| format!("get{}", title_case(p.name()))),
            });
        } else {
            p.state_getter = Some(StateGetter::Config);
        }

        Ok(())
    }

    fn apply_field_overrides(&mut self, id: PropertyId) -> Result<(), BuildError> {
        let (resource, location, overrides) = (self.resource, self.location, self.overrides);
        let path = self.arena[id].path.clone();
        let path = path.as_str();

        let flag = |kind| {
            overrides
                .has_property_override(kind, path, location)
                .at(resource, path)
        };
        macro_rules! details {
            ($kind:expr, $ty:ty) => {
                overrides
                    .property_override::<$ty>($kind, path, location)
                    .at(resource, path)?
            };
        }

        let custom_setter = details!(OverrideKind::CustomStateSetter, FunctionDetails);
        let ignore_read = flag(OverrideKind::IgnoreRead)?;
        let description = details!(OverrideKind::CustomDescription, DescriptionDetails);
        let diff_suppress = details!(OverrideKind::DiffSuppressFunc, DiffSuppressDetails);
        let validation = details!(OverrideKind::CustomValidation, FunctionDetails);
        let set_hash = details!(OverrideKind::SetHashFunc, FunctionDetails);
        let config_mode = details!(OverrideKind::CustomConfigMode, ConfigModeDetails);
        let removed = details!(OverrideKind::Removed, MessageDetails);
        let deprecated = details!(OverrideKind::Deprecated, MessageDetails);
        let collapsed = flag(OverrideKind::CollapsedObject)?;
        let custom_getter = details!(OverrideKind::CustomStateGetter, FunctionDetails);
        let enum_bool = flag(OverrideKind::EnumBool)?;
        let generate = flag(OverrideKind::GenerateIfNotSet)?;
        let name_prefix = flag(OverrideKind::NamePrefix)?;

        let p = self.arena.get_mut(id);

        p.state_setter = if p.sensitive && p.settable() {
            None
        } else {
            Some(StateSetter::Default)
        };
        if let Some(setter) = custom_setter {
            p.state_setter = Some(StateSetter::Custom(setter.function));
        }
        if ignore_read {
            p.state_setter = None;
        }

        if let Some(d) = description {
            p.description = d.description;
        }

        p.diff_suppress = match diff_suppress {
            Some(d) => Some(DiffSuppress::Custom(d.diff_suppress_func)),
            None if !p.computed_only()
                && p.field_type == FieldType::String
                && p.references_resource =>
            {
                Some(DiffSuppress::ReferenceLink)
            }
            None => None,
        };

        p.validation = validation.map(|v| v.function);

        if p.field_type.is_set() {
            p.set_hash = Some(match set_hash {
                Some(f) => SetHash::Custom(f.function),
                None if p.has_sub_properties() => SetHash::Resource,
                None => SetHash::String,
            });
        }

        p.config_mode = config_mode.map(|m| m.mode);
        p.removed = removed.map(|r| r.message);
        p.deprecated = deprecated.map(|d| d.message);

        if collapsed {
            tracing::debug!(resource, field = path, "collapsing object into parent");
            p.collapsed = true;
            if p.parent.is_none() {
                p.state_setter = Some(StateSetter::CollapsedObject);
            }
            p.state_getter = Some(StateGetter::Collapsed);
        }

        if let Some(getter) = custom_getter {
            p.state_getter = Some(StateGetter::Custom(getter.function));
        }

        if enum_bool {
            p.enum_bool = true;
            p.field_type = FieldType::String;
            p.state_setter = Some(StateSetter::EnumBool);
            p.state_getter = Some(StateGetter::EnumBool);
        }

        if generate || name_prefix {
            p.computed = true;
            p.required = false;
            p.optional = true;
            p.state_getter = Some(StateGetter::Generated);
            p.identity_getter = Some(IdentityGetter::GenerateIfNotSet {
                prefix_field: name_prefix.then(|| NAME_PREFIX_FIELD.to_string()),
            });
        }

        Ok(())
    }

    /// The `name_prefix` sibling injected next to a `NAME_PREFIX` field.
    fn name_prefix_sibling(&mut self, of: PropertyId, parent: Option<PropertyId>) -> PropertyId {
        let path = match parent {
            Some(p) => format!("{}.{}", self.arena[p].path, NAME_PREFIX_FIELD),
            None => NAME_PREFIX_FIELD.to_string(),
        };
        let mut p = Property::new(NAME_PREFIX_FIELD.to_string(), path, self.arena[of].field_type);
        p.parent = parent;
        p.optional = true;
        p.computed = true;
        p.force_new = true;
        p.state_getter = Some(StateGetter::Config);
        p.state_setter = Some(StateSetter::Default);
        self.arena.alloc(p)
    }

    /// Resolve declared conflict partners against sibling names.
    fn resolve_conflicts(
        &mut self,
        siblings: &[PropertyId],
        declared: Vec<(PropertyId, Vec<String>)>,
    ) -> Result<(), BuildError> {
        let by_title: HashMap<&str, &str> = siblings
            .iter()
            .map(|&id| {
                let p = &self.arena[id];
                (p.title.as_str(), p.name())
            })
            .collect();

        let mut resolved = Vec::with_capacity(declared.len());
        for (id, partners) in declared {
            let mut names = BTreeSet::new();
            for partner in partners {
                let Some(name) = by_title.get(snake_case(&partner).as_str()) else {
                    return Err(BuildError::new(
                        self.resource,
                        Some(self.arena[id].path.as_str()),
                        OverrideError::ConflictPartnerNotFound { partner },
                    ));
                };
                names.insert(name.to_string());
            }
            resolved.push((id, names));
        }

        for (id, names) in resolved {
            self.arena.get_mut(id).conflicts_with = names;
        }
        Ok(())
    }

    /// Add a provider-only field described by a `VIRTUAL_FIELD` override.
    ///
    /// Boolean virtual fields default to `false`; output fields are computed-only.
    pub fn virtual_field(
        &mut self,
        details: &VirtualFieldDetails,
    ) -> Result<PropertyId, BuildError> {
        let kind = TypeKind::parse(&details.field_type);
        let node = SchemaNode {
            kind,
            format: (kind == Some(TypeKind::Number)).then(|| "double".to_string()),
            ..SchemaNode::default()
        };
        let field_type = classify(&node).at(self.resource, &details.name)?;

        let mut p = Property::new(details.name.clone(), details.name.clone(), field_type);
        p.is_virtual = true;
        if field_type == FieldType::Bool {
            p.default = Some(DefaultValue::Bool(false));
        }
        if details.output {
            p.computed = true;
        } else {
            p.optional = true;
            p.state_getter = Some(StateGetter::Config);
        }
        p.state_setter = Some(StateSetter::Default);

        tracing::debug!(resource = self.resource, field = %details.name, "added virtual field");
        Ok(self.arena.alloc(p))
    }
}
