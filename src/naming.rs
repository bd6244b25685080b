//! Name normalization between schema (camelCase) and provider (snake_case) forms.

use heck::{ToSnakeCase, ToUpperCamelCase};

/// Convert a schema field or resource name to provider snake_case.
///
/// `machineType` becomes `machine_type`; names already in snake_case pass
/// through unchanged.
pub fn snake_case(name: &str) -> String {
    name.to_snake_case()
}

/// Convert a snake_case or camelCase name to TitleCase, e.g. `node_config` to `NodeConfig`.
pub fn title_case(name: &str) -> String {
    name.to_upper_camel_case()
}

/// Extract the `{{token}}` placeholder names of a pattern, in order of appearance.
pub fn placeholders(pattern: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = pattern;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let token = after[..end].trim();
        if !token.is_empty() {
            tokens.push(token.to_string());
        }
        rest = &after[end + 2..];
    }
    tokens
}

/// Rewrite each `{{token}}` of a pattern in one pass. `rename` returns the new
/// token name, or `None` to keep it. Replacements are never renamed again.
pub fn rename_placeholders<E>(
    pattern: &str,
    mut rename: impl FnMut(&str) -> Result<Option<String>, E>,
) -> Result<String, E> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        out.push_str(&rest[..start]);
        let token = after[..end].trim();
        let renamed = if token.is_empty() { None } else { rename(token)? };
        match renamed {
            Some(name) => out.push_str(&placeholder(&name)),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Wrap a token name in placeholder braces.
pub fn placeholder(token: &str) -> String {
    format!("{{{{{}}}}}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_from_camel() {
        assert_eq!(snake_case("machineType"), "machine_type");
        assert_eq!(snake_case("selfLink"), "self_link");
        assert_eq!(snake_case("already_snake"), "already_snake");
        assert_eq!(snake_case("ThingInstance"), "thing_instance");
    }

    #[test]
    fn title_case_from_snake() {
        assert_eq!(title_case("node_config"), "NodeConfig");
        assert_eq!(title_case("project"), "Project");
    }

    #[test]
    fn placeholders_in_order() {
        assert_eq!(
            placeholders("projects/{{project}}/zones/{{zone}}/things/{{name}}"),
            vec!["project", "zone", "name"]
        );
        assert!(placeholders("no/tokens/here").is_empty());
    }

    #[test]
    fn placeholders_ignore_unterminated() {
        assert_eq!(placeholders("a/{{b}}/{{c"), vec!["b"]);
    }

    #[test]
    fn rename_placeholders_single_pass() {
        let renamed = rename_placeholders("x/{{a}}/{{b}}/{{c", |t| {
            Ok::<_, ()>(match t {
                "a" => Some("b".to_string()),
                "b" => Some("c".to_string()),
                _ => None,
            })
        })
        .unwrap();
        assert_eq!(renamed, "x/{{b}}/{{c}}/{{c");
    }

    #[test]
    fn placeholder_wraps_token() {
        assert_eq!(placeholder("zone"), "{{zone}}");
    }
}
