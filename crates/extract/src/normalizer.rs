use regex::Regex;
use serde_json::Value;

/// Drop a wrapping markdown code fence, if any. Oracles love to add one even
/// when told not to.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();

    for opener in ["```json", "```"] {
        if let Some(rest) = trimmed.strip_prefix(opener) {
            let rest = rest.strip_suffix("```").unwrap_or(rest);
            return rest.trim();
        }
    }

    trimmed
}

/// Coerce any JSON value into a plain string.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Read a string field, falling back when missing or empty.
pub fn string_or(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(v) => {
            let s = value_to_string(v);
            if s.trim().is_empty() {
                default.to_string()
            } else {
                s
            }
        }
        None => default.to_string(),
    }
}

/// Read a list-of-strings field. Schema adherence is not guaranteed: items of
/// any type are stringified, and a bare scalar becomes a singleton list.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(value_to_string)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(scalar) => {
            let s = value_to_string(scalar);
            if s.trim().is_empty() { Vec::new() } else { vec![s] }
        }
    }
}

/// Tidy an extracted character name: trim whitespace and stray edge
/// punctuation, collapse runs of internal whitespace.
pub fn tidy_name(name: &str) -> String {
    let trimmed = name.trim().trim_matches(|c: char| ".,!?;:\"".contains(c)).trim();

    let whitespace = Regex::new(r"\s+").unwrap();
    whitespace.replace_all(trimmed, " ").to_string()
}
