//! Human-readable rendering of JSON Schema validation keywords.

use serde_json::Value as JsonValue;

/// Keywords rendered as rules, in output order.
pub const RULE_KEYWORDS: [&str; 11] = [
    "enum",
    "const",
    "pattern",
    "minLength",
    "maxLength",
    "format",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];

/// Render the validation keywords present on `schema` as `"<keyword>: <value>"` strings.
///
/// Returns `None` when no keyword is present (or `schema` is not an object).
/// Malformed values are never rejected, only stringified.
pub fn extract_rules(schema: &JsonValue) -> Option<Vec<String>> {
    let obj = schema.as_object()?;
    let rules: Vec<String> = RULE_KEYWORDS
        .iter()
        .filter_map(|&keyword| {
            obj.get(keyword)
                .map(|value| format!("{keyword}: {}", render(keyword, value)))
        })
        .collect();
    (!rules.is_empty()).then_some(rules)
}

fn render(keyword: &str, value: &JsonValue) -> String {
    match (keyword, value) {
        ("enum", JsonValue::Array(items)) => items
            .iter()
            .map(JsonValue::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        (_, JsonValue::String(s)) => s.clone(),
        // f64 Display drops the `.0` of whole values
        (_, JsonValue::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() => f.to_string(),
            _ => n.to_string(),
        },
        (_, v) => v.to_string(),
    }
}
