use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use thiserror::Error;

use crate::task_store::{PriorityLevel, TaskId};

/// One ranked task as returned by the recommender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PriorityItem {
    /// The id given for the task in the request
    #[serde(rename = "Id")]
    pub id: TaskId,
    /// The task name exactly as given in the request
    #[serde(rename = "Task")]
    pub task: String,
    #[serde(rename = "Priority")]
    pub priority: PriorityLevel,
    /// One sentence justifying the priority
    #[serde(rename = "Explanation")]
    pub explanation: String,
}

/// Full recommendation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PriorityResponse {
    /// One entry per task, most important first
    pub priority: Vec<PriorityItem>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid JSON format: {0}")]
    InvalidJson(String),
    #[error("response does not match the priority schema: {0}")]
    SchemaViolation(String),
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        match e.classify() {
            Category::Data => ParseError::SchemaViolation(e.to_string()),
            Category::Io | Category::Syntax | Category::Eof => ParseError::InvalidJson(e.to_string()),
        }
    }
}

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
});

/// Inner text of the first Markdown code fence, if any.
fn fenced_payload(text: &str) -> Option<&str> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Parse a JSON value that may be wrapped in a Markdown code fence.
pub fn extract_json(text: &str) -> Result<serde_json::Value, ParseError> {
    let payload = fenced_payload(text).unwrap_or(text);
    serde_json::from_str(payload.trim()).map_err(|e| ParseError::InvalidJson(e.to_string()))
}

/// JSON Schema of [`PriorityResponse`], for embedding in the prompt.
pub fn priority_schema() -> String {
    let schema = schemars::schema_for!(PriorityResponse);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// Decode a recommender answer against the priority schema.
///
/// The whole text is decoded first. With `lenient` set, a failed decode is
/// retried on the contents of a Markdown code fence.
pub fn decode_priority_response(text: &str, lenient: bool) -> Result<PriorityResponse, ParseError> {
    let strict = serde_json::from_str::<PriorityResponse>(text.trim()).map_err(ParseError::from);
    let strict_err = match strict {
        Ok(response) => return Ok(response),
        Err(e) => e,
    };

    if !lenient {
        return Err(strict_err);
    }

    debug!("Strict decode failed ({}), retrying on a fenced payload", strict_err);
    let value = extract_json(text).inspect_err(|e| warn!("Recommendation is not valid JSON: {}", e))?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAYLOAD: &str = r#"{"priority":[{"Task":"X","Priority":"High","Explanation":"E"}]}"#;
    const TYPED: &str =
        r#"{"priority":[{"Id":1,"Task":"X","Priority":"High","Explanation":"E"}]}"#;

    #[test]
    fn test_fenced_and_bare_json_agree() {
        let fenced = format!("```json\n{}\n```", PAYLOAD);
        let expected = json!({"priority": [{"Task": "X", "Priority": "High", "Explanation": "E"}]});

        assert_eq!(extract_json(&fenced).unwrap(), expected);
        assert_eq!(extract_json(PAYLOAD).unwrap(), expected);
        assert_eq!(extract_json(&format!("```\n{}\n```", PAYLOAD)).unwrap(), expected);
    }

    #[test]
    fn test_fence_with_surrounding_prose() {
        let text = format!("Here is my ranking:\n\n```json\n{}\n```\nGood luck!", TYPED);
        let response = decode_priority_response(&text, true).unwrap();
        assert_eq!(response.priority.len(), 1);
        assert_eq!(response.priority[0].priority, PriorityLevel::High);
    }

    #[test]
    fn test_truncated_json_is_rejected() {
        let err = extract_json(r#"{"priority":[{"Task":"X""#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));

        let err = decode_priority_response(r#"{"priority":[{"Task":"X""#, true).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn test_strict_decode() {
        let response = decode_priority_response(TYPED, false).unwrap();
        assert_eq!(
            response.priority[0],
            PriorityItem {
                id: 1,
                task: "X".to_string(),
                priority: PriorityLevel::High,
                explanation: "E".to_string(),
            }
        );
    }

    #[test]
    fn test_fence_needs_lenient_mode() {
        let fenced = format!("```json\n{}\n```", TYPED);
        assert!(decode_priority_response(&fenced, false).is_err());
        assert!(decode_priority_response(&fenced, true).is_ok());
    }

    #[test]
    fn test_priority_outside_levels_is_schema_violation() {
        let text = r#"{"priority":[{"Id":1,"Task":"X","Priority":"Urgent","Explanation":"E"}]}"#;
        let err = decode_priority_response(text, true).unwrap_err();
        assert!(matches!(err, ParseError::SchemaViolation(_)));

        let lowercase = r#"{"priority":[{"Id":1,"Task":"X","Priority":"high","Explanation":"E"}]}"#;
        assert!(decode_priority_response(lowercase, true).is_err());
    }

    #[test]
    fn test_fenced_payload_with_wrong_shape_is_schema_violation() {
        let fenced = "```json\n{\"priority\":[{\"Id\":1,\"Task\":\"X\",\"Priority\":\"Urgent\",\"Explanation\":\"E\"}]}\n```";
        let err = decode_priority_response(fenced, true).unwrap_err();
        assert!(matches!(err, ParseError::SchemaViolation(_)));

        let broken = "```json\n{\"priority\":[\n```";
        let err = decode_priority_response(broken, true).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn test_missing_field_is_schema_violation() {
        let text = r#"{"priority":[{"Id":1,"Task":"X","Priority":"Low"}]}"#;
        let err = decode_priority_response(text, true).unwrap_err();
        assert!(matches!(err, ParseError::SchemaViolation(_)));
    }

    #[test]
    fn test_schema_names_fields_and_levels() {
        let schema = priority_schema();
        for needle in ["\"Id\"", "\"Task\"", "\"Priority\"", "\"Explanation\"", "\"High\"", "\"Medium\"", "\"Low\""] {
            assert!(schema.contains(needle), "schema lacks {}", needle);
        }
    }
}
