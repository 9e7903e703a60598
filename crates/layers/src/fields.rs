//! Attribute lookup over the inconsistently named fields of the source data.

use serde_json::{Map, Value};

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Returns the actual key of the first candidate present in `props`,
/// comparing keys case-insensitively. Candidates are tried in order.
pub fn find_field<'a, S: AsRef<str>>(
    props: &'a Map<String, Value>,
    candidates: &[S],
) -> Option<&'a str> {
    candidates.iter().find_map(|candidate| {
        props
            .keys()
            .find(|key| eq_ignore_case(key, candidate.as_ref()))
            .map(String::as_str)
    })
}

/// Text form of an attribute value, trimmed. Null and blank values have none.
pub fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// First candidate whose value is present and non-blank, as trimmed text.
pub fn field_text<S: AsRef<str>>(props: &Map<String, Value>, candidates: &[S]) -> Option<String> {
    candidates.iter().find_map(|candidate| {
        props
            .iter()
            .filter(|(key, _)| eq_ignore_case(key, candidate.as_ref()))
            .find_map(|(_, value)| value_text(value))
    })
}

/// Like [`field_text`], with the empty string when nothing matches.
pub fn resolve_field<S: AsRef<str>>(props: &Map<String, Value>, candidates: &[S]) -> String {
    field_text(props, candidates).unwrap_or_default()
}
