//! Strict validation of LLM replies.
//!
//! The reply is free text expected to contain the step-list JSON object.
//! Every required field is checked for presence and type; anything that
//! does not fit is rejected rather than guessed at.

use serde_json::{Map, Value};
use thiserror::Error;
use waypoint_db::models::PlanStep;

/// Most steps a generated plan may have.
pub const MAX_STEPS: usize = 20;

/// Errors produced while validating an LLM reply.
#[derive(Debug, Error)]
pub enum ResponseParseError {
    #[error("no JSON object found in response")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("response is missing a \"steps\" array")]
    MissingSteps,

    #[error("plan must contain at least one step")]
    NoSteps,

    #[error("plan has {0} steps (maximum is {MAX_STEPS})")]
    TooManySteps(usize),

    #[error("step {index} is not a JSON object")]
    StepNotObject { index: usize },

    #[error("step {index}: field {field:?} is missing or not a {expected}")]
    InvalidField {
        index: usize,
        field: &'static str,
        expected: &'static str,
    },

    #[error("step {index}: step_number {found} does not match its position")]
    StepNumberMismatch { index: usize, found: i64 },
}

/// Parse and validate a reply into steps numbered `1..=N`.
///
/// The returned steps carry no enrichment data yet.
pub fn parse_steps(reply: &str) -> Result<Vec<PlanStep>, ResponseParseError> {
    let root = parse_root(reply)?;

    // A bare array of steps is accepted as well as the wrapping object.
    let steps = match &root {
        Value::Object(obj) => obj
            .get("steps")
            .and_then(Value::as_array)
            .ok_or(ResponseParseError::MissingSteps)?,
        Value::Array(items) => items,
        _ => return Err(ResponseParseError::MissingSteps),
    };

    if steps.is_empty() {
        return Err(ResponseParseError::NoSteps);
    }
    if steps.len() > MAX_STEPS {
        return Err(ResponseParseError::TooManySteps(steps.len()));
    }

    steps
        .iter()
        .enumerate()
        .map(|(i, value)| parse_step(i + 1, value))
        .collect()
}

/// Parse the first JSON span in the reply that is valid JSON.
///
/// Spans are tried in the order they start, so prose such as "Note [1]:"
/// ahead of the object costs nothing. When no span parses, the first
/// span's error is reported.
fn parse_root(reply: &str) -> Result<Value, ResponseParseError> {
    let spans = json_spans(reply);
    let mut first_err = None;
    for span in spans.iter().flatten() {
        match serde_json::from_str(span) {
            Ok(root) => return Ok(root),
            Err(e) => {
                first_err.get_or_insert(e);
            }
        }
    }
    Err(first_err.map_or(ResponseParseError::NoJson, ResponseParseError::from))
}

/// Strip markdown fences and return the outermost object span and the
/// outermost array span, earliest first.
fn json_spans(reply: &str) -> [Option<&str>; 2] {
    let text = reply.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text).trim();

    let span = |open: char, close: char| {
        let start = text.find(open)?;
        let end = text.rfind(close)?;
        (end > start).then(|| (start, &text[start..=end]))
    };
    match (span('{', '}'), span('[', ']')) {
        (Some(o), Some(a)) if a.0 < o.0 => [Some(a.1), Some(o.1)],
        (o, a) => [o.map(|o| o.1), a.map(|a| a.1)],
    }
}

fn parse_step(index: usize, value: &Value) -> Result<PlanStep, ResponseParseError> {
    let obj = value
        .as_object()
        .ok_or(ResponseParseError::StepNotObject { index })?;

    if let Some(n) = obj.get("step_number") {
        let found = n.as_i64().ok_or(ResponseParseError::InvalidField {
            index,
            field: "step_number",
            expected: "integer",
        })?;
        if found != index as i64 {
            return Err(ResponseParseError::StepNumberMismatch { index, found });
        }
    }

    let research_topics = match obj.get("research_topics") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|t| {
                t.as_str()
                    .map(|s| s.trim().to_owned())
                    .ok_or(ResponseParseError::InvalidField {
                        index,
                        field: "research_topics",
                        expected: "list of strings",
                    })
            })
            .filter(|t| !matches!(t, Ok(s) if s.is_empty()))
            .collect::<Result<_, _>>()?,
        Some(_) => {
            return Err(ResponseParseError::InvalidField {
                index,
                field: "research_topics",
                expected: "list of strings",
            });
        }
    };

    Ok(PlanStep {
        step_number: index as i64,
        title: required_str(obj, index, "title")?,
        description: required_str(obj, index, "description")?,
        estimated_duration: required_str(obj, index, "estimated_duration")?,
        requires_research: obj
            .get("requires_research")
            .and_then(Value::as_bool)
            .ok_or(ResponseParseError::InvalidField {
                index,
                field: "requires_research",
                expected: "boolean",
            })?,
        research_topics,
        web_research: None,
        weather_info: None,
        detected_location: None,
    })
}

fn required_str(
    obj: &Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<String, ResponseParseError> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or(ResponseParseError::InvalidField {
            index,
            field,
            expected: "non-empty string",
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "goal": "Learn Rust",
        "steps": [
            {"step_number": 1, "title": "Install toolchain", "description": "Use rustup",
             "estimated_duration": "30 minutes", "requires_research": false},
            {"step_number": 2, "title": "Read the book", "description": "Chapters 1-10",
             "estimated_duration": "2 days", "requires_research": true,
             "research_topics": ["rust book", "  "]}
        ]
    }"#;

    #[test]
    fn parses_valid_reply() {
        let steps = parse_steps(VALID).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_number, 1);
        assert_eq!(steps[1].step_number, 2);
        assert!(steps[0].research_topics.is_empty());
        assert_eq!(steps[1].research_topics, vec!["rust book"]);
        assert!(steps[1].web_research.is_none());
    }

    #[test]
    fn strips_code_fence_and_prose() {
        let reply = format!("```json\n{VALID}\n```");
        assert_eq!(parse_steps(&reply).unwrap().len(), 2);

        let reply = format!("Sure! Here is your plan:\n{VALID}\nGood luck.");
        assert_eq!(parse_steps(&reply).unwrap().len(), 2);
    }

    #[test]
    fn bracketed_prose_before_object_is_skipped() {
        let reply = format!("Note [1]: plans are estimates.\n{VALID}");
        assert_eq!(parse_steps(&reply).unwrap().len(), 2);
    }

    #[test]
    fn accepts_bare_step_array() {
        let reply = r#"[{"title": "Only", "description": "d",
            "estimated_duration": "1 hour", "requires_research": false}]"#;
        let steps = parse_steps(reply).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_number, 1);
    }

    #[test]
    fn missing_step_numbers_are_assigned_by_position() {
        let reply = r#"{"steps": [
            {"title": "a", "description": "d", "estimated_duration": "1 hour", "requires_research": false},
            {"title": "b", "description": "d", "estimated_duration": "1 hour", "requires_research": false}
        ]}"#;
        let numbers: Vec<i64> = parse_steps(reply)
            .unwrap()
            .iter()
            .map(|s| s.step_number)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(
            parse_steps("I cannot help with that."),
            Err(ResponseParseError::NoJson)
        ));
        assert!(matches!(
            parse_steps("{ not json }"),
            Err(ResponseParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn rejects_schema_violations() {
        assert!(matches!(
            parse_steps(r#"{"goal": "x"}"#),
            Err(ResponseParseError::MissingSteps)
        ));
        assert!(matches!(
            parse_steps(r#"{"steps": []}"#),
            Err(ResponseParseError::NoSteps)
        ));
        assert!(matches!(
            parse_steps(r#"{"steps": [{"title": "t", "description": "d", "requires_research": false}]}"#),
            Err(ResponseParseError::InvalidField {
                field: "estimated_duration",
                ..
            })
        ));
        assert!(matches!(
            parse_steps(
                r#"{"steps": [{"title": "t", "description": "d", "estimated_duration": "1 hour", "requires_research": "yes"}]}"#
            ),
            Err(ResponseParseError::InvalidField {
                field: "requires_research",
                ..
            })
        ));
        assert!(matches!(
            parse_steps(r#"{"steps": ["step one"]}"#),
            Err(ResponseParseError::StepNotObject { index: 1 })
        ));
    }

    #[test]
    fn rejects_out_of_order_step_numbers() {
        let reply = r#"{"steps": [
            {"step_number": 2, "title": "a", "description": "d", "estimated_duration": "1 hour", "requires_research": false}
        ]}"#;
        assert!(matches!(
            parse_steps(reply),
            Err(ResponseParseError::StepNumberMismatch { index: 1, found: 2 })
        ));
    }

    #[test]
    fn rejects_too_many_steps() {
        let step = r#"{"title": "a", "description": "d", "estimated_duration": "1 hour", "requires_research": false}"#;
        let reply = format!("{{\"steps\": [{}]}}", vec![step; MAX_STEPS + 1].join(","));
        assert!(matches!(
            parse_steps(&reply),
            Err(ResponseParseError::TooManySteps(21))
        ));
    }
}
