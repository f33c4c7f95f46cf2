//! Input sanitization for tool calls.
//!
//! Best-effort defense in depth: parameter keys and values are cleaned
//! before any executor builds an outbound request, and target URLs are
//! checked before every API/feed fetch (and again for URLs extracted from
//! fetched feed content). This is not a full injection-proofing scheme.

use std::collections::HashMap;

use crate::error::ToolError;

/// Characters stripped from string values and rejected in URLs.
const DANGEROUS_CHARS: &[char] = &['<', '>', '"', '\'', ';', '\\'];

/// Maximum length of a sanitized string value, in characters.
const MAX_STRING_LEN: usize = 1000;

/// Maximum serialized size of a structured (list/map) value, in characters.
const MAX_JSON_LEN: usize = 5000;

fn key_pattern() -> &'static regex::Regex {
    static KEY_RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    KEY_RE.get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9_]+$").expect("valid regex"))
}

/// Validate and sanitize tool-call parameters.
///
/// Keys must match `[A-Za-z0-9_]+`. String values have dangerous characters
/// stripped and are truncated to 1000 characters; numbers and booleans pass
/// through; lists and maps are size-checked against their JSON serialization
/// but kept structured. Anything else fails validation. Sanitizing an
/// already-clean map returns it unchanged.
pub fn sanitize_params(
    params: &HashMap<String, serde_json::Value>,
) -> Result<HashMap<String, serde_json::Value>, ToolError> {
    let mut sanitized = HashMap::with_capacity(params.len());

    for (key, value) in params {
        if !key_pattern().is_match(key) {
            return Err(ToolError::Validation(format!(
                "Invalid parameter key: {}",
                key
            )));
        }

        let clean = match value {
            serde_json::Value::String(s) => {
                let stripped: String = s
                    .chars()
                    .filter(|c| !DANGEROUS_CHARS.contains(c))
                    .take(MAX_STRING_LEN)
                    .collect();
                serde_json::Value::String(stripped)
            }
            serde_json::Value::Number(_) | serde_json::Value::Bool(_) => value.clone(),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                let json = serde_json::to_string(value).map_err(|e| {
                    ToolError::Validation(format!("Invalid JSON in parameter {}: {}", key, e))
                })?;
                if json.len() > MAX_JSON_LEN {
                    return Err(ToolError::Validation(format!(
                        "Parameter {} JSON too large",
                        key
                    )));
                }
                value.clone()
            }
            serde_json::Value::Null => {
                return Err(ToolError::Validation(format!(
                    "Unsupported parameter type for {}: null",
                    key
                )));
            }
        };

        sanitized.insert(key.clone(), clean);
    }

    Ok(sanitized)
}

/// Strip dangerous characters from a string and cap its length. Used by the
/// feed executor on fetched entry fields.
pub fn sanitize_text(input: &str, max_len: usize) -> String {
    input
        .chars()
        .filter(|c| !DANGEROUS_CHARS.contains(c))
        .take(max_len)
        .collect()
}

/// Validate a URL for outbound requests.
///
/// Only `http`/`https` schemes are accepted (`file://` is explicitly out).
/// URLs mentioning `localhost`, `127.0.0.1` or `0.0.0.0` anywhere are
/// rejected; the substring match is intentionally broad and accepts some
/// false positives.
pub fn is_valid_url(url: &str) -> bool {
    let lower = url.to_lowercase();

    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }

    if ["localhost", "127.0.0.1", "0.0.0.0", "file://"]
        .iter()
        .any(|blocked| lower.contains(blocked))
    {
        return false;
    }

    if url.contains(DANGEROUS_CHARS) {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_params() {
        let result = sanitize_params(&HashMap::new()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_clean_params_unchanged() {
        let input = params(&[
            ("query", json!("test query")),
            ("limit", json!(10)),
            ("verbose", json!(true)),
        ]);
        let result = sanitize_params(&input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let input = params(&[("query", json!("test<script>alert('x')</script>"))]);
        let once = sanitize_params(&input).unwrap();
        let twice = sanitize_params(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_dangerous_characters_stripped() {
        let input = params(&[("query", json!("test<script>alert('xss')</script>"))]);
        let result = sanitize_params(&input).unwrap();
        let cleaned = result["query"].as_str().unwrap();
        assert!(!cleaned.contains('<'));
        assert!(!cleaned.contains('\''));
        assert_eq!(cleaned, "testscriptalert(xss)/script");
    }

    #[test]
    fn test_string_length_capped() {
        let input = params(&[("query", json!("a".repeat(1500)))]);
        let result = sanitize_params(&input).unwrap();
        assert_eq!(result["query"].as_str().unwrap().len(), 1000);
    }

    #[test]
    fn test_invalid_parameter_key() {
        let input = params(&[("query<script>", json!("test"))]);
        assert!(matches!(
            sanitize_params(&input),
            Err(ToolError::Validation(_))
        ));
    }

    #[test]
    fn test_structured_value_kept_structured() {
        let input = params(&[("config", json!({ "nested": { "a": 1 } }))]);
        let result = sanitize_params(&input).unwrap();
        assert!(result["config"].is_object());
    }

    #[test]
    fn test_structured_value_too_large() {
        let input = params(&[("config", json!({ "data": "x".repeat(6000) }))]);
        assert!(matches!(
            sanitize_params(&input),
            Err(ToolError::Validation(_))
        ));
    }

    #[test]
    fn test_null_value_rejected() {
        let input = params(&[("callback", serde_json::Value::Null)]);
        assert!(matches!(
            sanitize_params(&input),
            Err(ToolError::Validation(_))
        ));
    }

    #[test]
    fn test_valid_urls() {
        assert!(is_valid_url("https://api.example.com/v1/data"));
        assert!(is_valid_url("http://api.example.com/data"));
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(!is_valid_url("ftp://example.com/data"));
        assert!(!is_valid_url("file:///etc/passwd"));
    }

    #[test]
    fn test_dangerous_hosts() {
        assert!(!is_valid_url("http://localhost/api"));
        assert!(!is_valid_url("http://127.0.0.1:8000/x"));
        assert!(!is_valid_url("http://0.0.0.0/api"));
        assert!(!is_valid_url("https://LOCALHOST/api"));
    }

    #[test]
    fn test_suspicious_characters() {
        assert!(!is_valid_url("http://x.com/<script>"));
        assert!(!is_valid_url("http://example.com/api';DROP TABLE users;--"));
    }

    #[test]
    fn test_malformed_urls() {
        assert!(!is_valid_url("not-a-url"));
        assert!(!is_valid_url(""));
    }
}
