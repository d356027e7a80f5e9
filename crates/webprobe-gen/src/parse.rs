//! Tolerant parsing of the model's structured response.

use serde_json::Value;
use tracing::warn;

use crate::error::{GenerationError, Result};

/// One test case proposed by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCase {
    pub name: String,
    pub description: String,
    pub task: String,
    pub expected_output: Option<String>,
}

/// Extract test cases from a raw completion.
///
/// Accepts `{"test_cases": [...]}` or a bare array, optionally wrapped in a
/// markdown code fence or surrounding prose. Cases without a `name` or `task`
/// are dropped with a warning. An empty result is returned as-is; the caller
/// decides whether that is fatal.
pub fn parse_test_cases(raw: &str) -> Result<Vec<GeneratedCase>> {
    let value = extract_json(raw).ok_or_else(|| {
        GenerationError::UnparseableResponse("no JSON object or array found".to_string())
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("test_cases") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(GenerationError::UnparseableResponse(
                    "\"test_cases\" is not an array".to_string(),
                ))
            }
            None => {
                return Err(GenerationError::UnparseableResponse(
                    "missing \"test_cases\" field".to_string(),
                ))
            }
        },
        _ => {
            return Err(GenerationError::UnparseableResponse(
                "top-level value is neither an object nor an array".to_string(),
            ))
        }
    };

    Ok(items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let case = case_from_value(item);
            if case.is_none() {
                warn!(index, "dropping generated test case without name or task");
            }
            case
        })
        .collect())
}

fn case_from_value(item: &Value) -> Option<GeneratedCase> {
    let field = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Some(GeneratedCase {
        name: field("name")?,
        task: field("task")?,
        description: field("description").unwrap_or_default(),
        expected_output: field("expected_output"),
    })
}

/// Find the JSON block holding the test cases.
///
/// Fenced blocks are tried before the surrounding text. A value that looks
/// like a test-case block (an object with `test_cases`, or an array holding
/// objects) wins over any earlier decodable value, so a bracketed aside in
/// the prose is skipped. Without such a block the first decodable object or
/// array is returned and rejected later with a precise message.
fn extract_json(raw: &str) -> Option<Value> {
    let mut fallback = None;
    let texts = fenced_blocks(raw).into_iter().chain(std::iter::once(raw.trim()));
    for text in texts {
        for value in json_values(text) {
            if holds_cases(&value) {
                return Some(value);
            }
            fallback.get_or_insert(value);
        }
    }
    fallback
}

fn holds_cases(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key("test_cases"),
        Value::Array(items) => items.iter().any(Value::is_object),
        _ => false,
    }
}

/// Objects and arrays decodable from `text`: the whole text, else one per
/// `{` or `[` that starts a complete value.
fn json_values(text: &str) -> Box<dyn Iterator<Item = Value> + '_> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if value.is_object() || value.is_array() {
            return Box::new(std::iter::once(value));
        }
    }
    Box::new(
        text.char_indices()
            .filter(|(_, c)| matches!(c, '{' | '['))
            .filter_map(move |(start, _)| {
                serde_json::Deserializer::from_str(&text[start..])
                    .into_iter::<Value>()
                    .next()?
                    .ok()
            })
            .filter(|value| value.is_object() || value.is_array()),
    )
}

/// Bodies of the markdown code fences in `text`, language tags removed.
fn fenced_blocks(text: &str) -> Vec<&str> {
    text.split("```")
        .skip(1)
        .step_by(2)
        .map(|block| match block.split_once('\n') {
            Some((tag, body)) if !tag.contains(['{', '[']) => body.trim(),
            _ => block.trim(),
        })
        .filter(|body| !body.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let cases = parse_test_cases(
            r#"{"test_cases": [{"name": "Login", "description": "d", "task": "1. Log in", "expected_output": "Dashboard"}]}"#,
        )
        .unwrap();
        assert_eq!(
            cases,
            vec![GeneratedCase {
                name: "Login".to_string(),
                description: "d".to_string(),
                task: "1. Log in".to_string(),
                expected_output: Some("Dashboard".to_string()),
            }]
        );
    }

    #[test]
    fn test_fenced_with_prose() {
        let raw = "Here are your tests:\n```json\n[{\"name\": \"Search\", \"task\": \"Search for hats\"}]\n```\nGood luck!";
        let cases = parse_test_cases(raw).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name, "Search");
        assert_eq!(cases[0].description, "");
        assert!(cases[0].expected_output.is_none());
    }

    #[test]
    fn test_fence_only() {
        let raw = "```json\n{\"test_cases\": [{\"name\": \"A\", \"task\": \"B\"}]}\n```";
        assert_eq!(parse_test_cases(raw).unwrap().len(), 1);
    }

    #[test]
    fn test_incomplete_cases_dropped() {
        let raw = r#"{"test_cases": [
            {"name": "ok", "task": "do it"},
            {"name": "no task"},
            {"task": "no name"},
            {"name": "  ", "task": "blank name"}
        ]}"#;
        let cases = parse_test_cases(raw).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name, "ok");
    }

    #[test]
    fn test_all_dropped_is_empty_not_error() {
        let cases = parse_test_cases(r#"{"test_cases": [{"name": "x"}]}"#).unwrap();
        assert!(cases.is_empty());
    }

    #[test]
    fn test_garbage_is_unparseable() {
        for raw in ["I cannot help with that.", "{\"test_cases\": \"nope\"}", "{\"cases\": []}", "42"] {
            assert!(
                matches!(parse_test_cases(raw), Err(GenerationError::UnparseableResponse(_))),
                "expected unparseable for {raw:?}"
            );
        }
    }

    #[test]
    fn test_bracketed_aside_before_fenced_block() {
        let raw = "Covering the changed files [\"index.html\"]:\n```json\n{\"test_cases\": [{\"name\": \"A\", \"task\": \"B\"}]}\n```";
        let cases = parse_test_cases(raw).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].name, "A");
    }

    #[test]
    fn test_bracketed_aside_before_bare_object() {
        let raw = "Touches [1, 2] and {\"file\": \"a.rs\"}. Result: {\"test_cases\": [{\"name\": \"A\", \"task\": \"B\"}]}";
        let cases = parse_test_cases(raw).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].task, "B");
    }
}
