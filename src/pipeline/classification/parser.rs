use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::ClassificationError;
use crate::models::{Category, ClassificationReport};

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Parse the classifier's raw reply into a [`ClassificationReport`].
///
/// Tolerates a surrounding markdown code fence. Whitespace runs are collapsed
/// to a single space before parsing, string values included.
pub fn parse_classifier_response(raw: &str) -> Result<ClassificationReport, ClassificationError> {
    let body = strip_code_fence(raw);
    let normalized = WHITESPACE_RUN.replace_all(body, " ");

    let value: Value = serde_json::from_str(normalized.trim())
        .map_err(|e| ClassificationError::ValidationParse(e.to_string()))?;

    let Value::Object(top) = value else {
        return Err(ClassificationError::ValidationParse(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    };

    let mut report = ClassificationReport::default();
    for (key, value) in top {
        let key = key.trim().to_string();
        match (known_category(&key), value) {
            (Some(category), Value::Object(fields)) => {
                match report.fields_mut(category) {
                    Some(Some(existing)) => {
                        tracing::warn!(category = %category, "Merging duplicate category key");
                        existing.extend(fields);
                    }
                    Some(slot) => *slot = Some(fields),
                    None => {}
                }
            }
            // Stored reports must round-trip, so a category slot never holds a non-object.
            (Some(category), other) => {
                tracing::warn!(
                    category = %category,
                    kind = json_kind(&other),
                    "Ignoring non-object value for category"
                );
            }
            (None, other) => {
                report.additional.insert(key, other);
            }
        }
    }

    Ok(report)
}

/// Remove a leading ```` ```json ```` / ```` ``` ```` fence and a trailing
/// ```` ``` ````, if present.
fn strip_code_fence(raw: &str) -> &str {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }

    s.trim()
}

fn known_category(key: &str) -> Option<Category> {
    Category::TARGETS
        .iter()
        .copied()
        .find(|c| c.as_str().eq_ignore_ascii_case(key))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
