//! Override linting - static checks of an override file against a schema.
//!
//! Reports, without building the resource:
//! - Field paths that don't exist in the schema
//! - Duplicate single-valued overrides that would fail a build
//! - Overrides that don't fit the shape of the field they target
//! - Unresolvable `$ref` pointers reached while walking the schema

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::field_type::{classify, DefaultValue};
use crate::naming::snake_case;
use crate::overrides::{DefaultDetails, OverrideDirective, OverrideKind, OverrideStore};
use crate::resource::resource_title;
use crate::schema::{SchemaDocument, SchemaNode, TypeKind};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// JSON Pointer into the override document (e.g. "/3/field"), or into the
    /// schema for schema problems.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(code: &str, path: String, message: String) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            path,
            message,
        }
    }

    fn warning(code: &str, path: String, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.to_string(),
            path,
            message,
        }
    }
}

/// Result of linting one override file against one resource.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub resource: String,
    pub directives_checked: usize,
    pub errors: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl LintResult {
    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    fn new(resource: &str, directives_checked: usize, diagnostics: Vec<Diagnostic>) -> Self {
        let errors = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        Self {
            resource: resource.to_string(),
            directives_checked,
            errors,
            warnings: diagnostics.len() - errors,
            diagnostics,
        }
    }
}

/// Lint `overrides` against the schema named `resource` in `document`.
pub fn lint_overrides(
    document: &SchemaDocument,
    resource: &str,
    overrides: &OverrideStore,
) -> LintResult {
    let directives = overrides.directives();
    let mut diagnostics = Vec::new();

    let Some(node) = document.schema(resource) else {
        diagnostics.push(Diagnostic::error(
            "E001",
            "/".to_string(),
            format!("resource schema \"{}\" not found", resource),
        ));
        return LintResult::new(resource, directives.len(), diagnostics);
    };

    let schema_title = node.title.as_deref().unwrap_or(resource);
    let mut fields_by_location: HashMap<&str, BTreeMap<String, &SchemaNode>> = HashMap::new();

    for (index, directive) in directives.iter().enumerate() {
        let Some(field) = directive.field.as_deref() else {
            continue;
        };
        let location = directive.location.as_deref().unwrap_or("");

        let fields = fields_by_location.entry(location).or_insert_with(|| {
            // A broken CUSTOM_RESOURCE_NAME is reported as a duplicate below.
            let title = resource_title(schema_title, overrides, location)
                .unwrap_or_else(|_| snake_case(schema_title));
            let mut fields = BTreeMap::new();
            let mut schema_problems = Vec::new();
            collect_fields(
                document,
                node,
                None,
                &format!("{}_id", title),
                &mut HashSet::new(),
                &mut fields,
                &mut schema_problems,
            );
            // Schema problems are the same for every location; report them once.
            if diagnostics.iter().all(|d: &Diagnostic| d.code != "E003") {
                diagnostics.extend(schema_problems);
            }
            fields
        });

        match fields.get(field) {
            None => diagnostics.push(Diagnostic::warning(
                "W001",
                format!("/{}/field", index),
                format!("{} targets unknown field \"{}\"", directive.kind, field),
            )),
            Some(target) => check_shape(index, directive, target, &mut diagnostics),
        }
    }

    check_duplicates(directives, &mut diagnostics);

    tracing::debug!(
        resource,
        diagnostics = diagnostics.len(),
        "linted overrides"
    );
    LintResult::new(resource, directives.len(), diagnostics)
}

/// Map every override-addressable field path to its (resolved) schema node.
fn collect_fields<'d>(
    document: &'d SchemaDocument,
    node: &'d SchemaNode,
    prefix: Option<&str>,
    top_level_id: &str,
    visiting: &mut HashSet<String>,
    fields: &mut BTreeMap<String, &'d SchemaNode>,
    problems: &mut Vec<Diagnostic>,
) {
    for (key, field) in &node.properties {
        let title = if prefix.is_none() && key == "id" {
            top_level_id.to_string()
        } else {
            snake_case(key)
        };
        let path = match prefix {
            Some(p) => format!("{}.{}", p, title),
            None => title,
        };

        let Some(target) = resolve(document, field, &path, problems) else {
            continue;
        };
        fields.insert(path.clone(), target);

        let reference = field
            .reference
            .as_deref()
            .or_else(|| field.items.as_deref().and_then(|i| i.reference.as_deref()));
        if let Some(reference) = reference {
            if !visiting.insert(reference.to_string()) {
                continue;
            }
        }

        collect_fields(document, target, Some(&path), top_level_id, visiting, fields, problems);
        if let Some(items) = target.items.as_deref() {
            if let Some(items) = resolve(document, items, &path, problems) {
                collect_fields(
                    document,
                    items,
                    Some(&path),
                    top_level_id,
                    visiting,
                    fields,
                    problems,
                );
            }
        }

        if let Some(reference) = reference {
            visiting.remove(reference);
        }
    }
}

fn resolve<'d>(
    document: &'d SchemaDocument,
    node: &'d SchemaNode,
    path: &str,
    problems: &mut Vec<Diagnostic>,
) -> Option<&'d SchemaNode> {
    let Some(reference) = &node.reference else {
        return Some(node);
    };
    match document.resolve_ref(reference) {
        Ok(shared) => Some(shared.node),
        Err(e) => {
            problems.push(Diagnostic::error(
                "E003",
                format!("/{}", path.replace('.', "/")),
                e.to_string(),
            ));
            None
        }
    }
}

/// Warn about overrides that can't take effect on the field they target.
fn check_shape(
    index: usize,
    directive: &OverrideDirective,
    target: &SchemaNode,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let path = format!("/{}", index);
    let field_type = classify(target).ok();

    let mismatch = match directive.kind {
        OverrideKind::CollapsedObject => target.properties.is_empty().then_some("an object"),
        OverrideKind::SetHashFunc => (!field_type.is_some_and(|t| t.is_set())).then_some("a set"),
        OverrideKind::CustomListSizeConstraint => target.items.is_none().then_some("an array"),
        OverrideKind::EnumBool => (target.kind != Some(TypeKind::Boolean)).then_some("a boolean"),
        _ => None,
    };
    if let Some(expected) = mismatch {
        diagnostics.push(Diagnostic::warning(
            "W002",
            path.clone(),
            format!(
                "{} has no effect: \"{}\" is not {}",
                directive.kind,
                directive.field.as_deref().unwrap_or_default(),
                expected
            ),
        ));
    }

    if directive.kind == OverrideKind::CustomDefault {
        let details = directive.decode::<DefaultDetails>();
        if let (Ok(details), Some(field_type)) = (details, field_type) {
            if let Err(e) = DefaultValue::parse(field_type, &details.text()) {
                diagnostics.push(Diagnostic::error(
                    "E004",
                    format!("{}/details", path),
                    e.to_string(),
                ));
            }
        }
    }
}

/// Report every directive that duplicates an earlier one in some location.
fn check_duplicates(directives: &[OverrideDirective], diagnostics: &mut Vec<Diagnostic>) {
    for (j, later) in directives.iter().enumerate() {
        if later.kind.repeatable() {
            continue;
        }
        let earlier = directives[..j].iter().position(|d| {
            d.kind == later.kind
                && d.field == later.field
                && (d.location.is_none()
                    || later.location.is_none()
                    || d.location == later.location)
        });
        if let Some(i) = earlier {
            diagnostics.push(Diagnostic::error(
                "E002",
                format!("/{}", j),
                format!(
                    "duplicate {} override{} (first at /{})",
                    later.kind,
                    later
                        .field
                        .as_ref()
                        .map(|f| format!(" on field {}", f))
                        .unwrap_or_default(),
                    i
                ),
            ));
        }
    }
}
