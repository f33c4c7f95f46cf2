//! Variable resolution over the execution context.
//!
//! Two reference styles coexist in workflow definitions:
//! - `{name}` placeholders inside template strings (prompts, messages);
//!   a missing key fails the step.
//! - `$name` whole-value references (step `data`, `message`, tool params);
//!   resolution of tool params is lenient — a missing variable logs a
//!   warning and the key is omitted from the call.

use std::collections::HashMap;

use crate::error::StepError;

pub type ExecutionContext = HashMap<String, serde_json::Value>;

fn placeholder_pattern() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("valid regex"))
}

/// Render a context value into template output: strings verbatim, anything
/// else as compact JSON.
pub fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Substitute `{name}` placeholders from the context. A placeholder with no
/// matching context key fails the step.
pub fn render_template(template: &str, context: &ExecutionContext) -> Result<String, StepError> {
    let mut missing: Option<String> = None;
    let rendered = placeholder_pattern().replace_all(template, |caps: &regex::Captures| {
        let name = &caps[1];
        match context.get(name) {
            Some(value) => value_to_string(value),
            None => {
                if missing.is_none() {
                    missing = Some(name.to_string());
                }
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(StepError::MissingVariable(name)),
        None => Ok(rendered.to_string()),
    }
}

/// Resolve a step value: a string starting with `$` dereferences the named
/// context variable (failing if absent); anything else passes through as a
/// literal.
pub fn resolve_value(
    value: &serde_json::Value,
    context: &ExecutionContext,
) -> Result<serde_json::Value, StepError> {
    if let Some(name) = variable_name(value) {
        return context
            .get(name)
            .cloned()
            .ok_or_else(|| StepError::MissingVariable(name.to_string()));
    }
    Ok(value.clone())
}

/// Resolve a `send_response` message: `$variable` dereference (failing if
/// absent), otherwise template rendering.
pub fn resolve_message(message: &str, context: &ExecutionContext) -> Result<String, StepError> {
    if let Some(name) = message.strip_prefix('$') {
        return context
            .get(name)
            .map(value_to_string)
            .ok_or_else(|| StepError::MissingVariable(name.to_string()));
    }
    render_template(message, context)
}

/// Resolve tool-call parameters. `$variable` values are replaced from the
/// context; a missing variable drops the key with a warning instead of
/// failing the call. Literal values pass through.
pub fn resolve_params(
    params: &HashMap<String, serde_json::Value>,
    context: &ExecutionContext,
) -> HashMap<String, serde_json::Value> {
    let mut resolved = HashMap::with_capacity(params.len());
    for (key, value) in params {
        match variable_name(value) {
            Some(name) => match context.get(name) {
                Some(ctx_value) => {
                    resolved.insert(key.clone(), ctx_value.clone());
                }
                None => {
                    tracing::warn!(
                        "Parameter '{}' references undefined variable '{}'; omitting",
                        key,
                        name
                    );
                }
            },
            None => {
                resolved.insert(key.clone(), value.clone());
            }
        }
    }
    resolved
}

fn variable_name(value: &serde_json::Value) -> Option<&str> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix('$'))
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(pairs: &[(&str, serde_json::Value)]) -> ExecutionContext {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_template() {
        let context = ctx(&[("name", json!("world")), ("count", json!(3))]);
        assert_eq!(
            render_template("hello {name}, {count} times", &context).unwrap(),
            "hello world, 3 times"
        );
    }

    #[test]
    fn test_render_template_missing_key_fails() {
        let err = render_template("hi {missing}", &ExecutionContext::new()).unwrap_err();
        assert!(matches!(err, StepError::MissingVariable(name) if name == "missing"));
    }

    #[test]
    fn test_render_template_without_placeholders() {
        assert_eq!(
            render_template("plain text", &ExecutionContext::new()).unwrap(),
            "plain text"
        );
    }

    #[test]
    fn test_resolve_value_dereferences_variable() {
        let context = ctx(&[("note", json!({ "title": "hi" }))]);
        let resolved = resolve_value(&json!("$note"), &context).unwrap();
        assert_eq!(resolved, json!({ "title": "hi" }));
    }

    #[test]
    fn test_resolve_value_literal_passthrough() {
        let resolved = resolve_value(&json!({ "a": 1 }), &ExecutionContext::new()).unwrap();
        assert_eq!(resolved, json!({ "a": 1 }));
    }

    #[test]
    fn test_resolve_value_missing_variable_fails() {
        let err = resolve_value(&json!("$absent"), &ExecutionContext::new()).unwrap_err();
        assert!(matches!(err, StepError::MissingVariable(_)));
    }

    #[test]
    fn test_resolve_params_substitutes_and_omits() {
        let context = ctx(&[("search_term", json!("cats"))]);
        let params = ctx(&[
            ("q", json!("$search_term")),
            ("page", json!(2)),
            ("lang", json!("$locale")),
        ]);
        let resolved = resolve_params(&params, &context);
        assert_eq!(resolved.get("q"), Some(&json!("cats")));
        assert_eq!(resolved.get("page"), Some(&json!(2)));
        assert!(!resolved.contains_key("lang"));
    }

    #[test]
    fn test_resolve_message_variants() {
        let context = ctx(&[("greeting", json!("hello"))]);
        assert_eq!(resolve_message("$greeting", &context).unwrap(), "hello");
        assert_eq!(
            resolve_message("say {greeting}", &context).unwrap(),
            "say hello"
        );
        assert!(resolve_message("$absent", &context).is_err());
    }

    #[test]
    fn test_bare_dollar_is_literal() {
        let resolved = resolve_value(&json!("$"), &ExecutionContext::new()).unwrap();
        assert_eq!(resolved, json!("$"));
    }
}
