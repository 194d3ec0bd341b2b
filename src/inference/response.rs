//! Chat-completion response parsing.
//!
//! Normalizes an OpenAI-compatible (non-streaming) response body into a
//! [`Completion`]: optional text plus zero or more parsed tool calls.

use serde::Deserialize;
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{Completion, ToolCall};

#[derive(Deserialize)]
struct ResponseBody {
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: Option<String>,
    function: ResponseFunction,
}

#[derive(Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Parse a raw JSON tool call into a [`ToolCall`].
///
/// A missing id gets a generated `call_<uuid>`. Empty argument strings are
/// read as `{}`; anything else must be a JSON object.
pub fn parse_tool_call(
    id: Option<&str>,
    name: &str,
    arguments_json: &str,
) -> Result<ToolCall, InferenceError> {
    if name.trim().is_empty() {
        return Err(InferenceError::ToolCallParseError {
            raw_response: arguments_json.to_string(),
            reason: "empty tool name".into(),
        });
    }

    let arguments = if arguments_json.trim().is_empty() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str::<serde_json::Value>(arguments_json).map_err(|e| {
            InferenceError::ToolCallParseError {
                raw_response: arguments_json.to_string(),
                reason: format!("invalid JSON arguments: {e}"),
            }
        })?
    };

    if !arguments.is_object() {
        return Err(InferenceError::ToolCallParseError {
            raw_response: arguments_json.to_string(),
            reason: "arguments must be a JSON object".into(),
        });
    }

    Ok(ToolCall {
        id: id
            .map(String::from)
            .unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
        name: name.trim().to_string(),
        arguments,
    })
}

/// Parse a non-streaming chat-completion body.
pub fn parse_completion_response(body: &str) -> Result<Completion, InferenceError> {
    let resp: ResponseBody =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse {
            reason: format!("failed to parse response: {e}"),
        })?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or(InferenceError::MalformedResponse {
            reason: "empty choices array".into(),
        })?;

    let text = choice.message.content.filter(|c| !c.trim().is_empty());

    let mut tool_calls = Vec::new();
    for tc in choice.message.tool_calls.unwrap_or_default() {
        tool_calls.push(parse_tool_call(
            tc.id.as_deref(),
            &tc.function.name,
            &tc.function.arguments,
        )?);
    }

    let finish_reason = if tool_calls.is_empty() {
        choice.finish_reason
    } else {
        Some("tool_calls".into())
    };

    Ok(Completion {
        text,
        tool_calls,
        finish_reason,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_content() {
        let body = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": "Hello, world!"},
                "finish_reason": "stop"
            }]
        }"#;

        let completion = parse_completion_response(body).unwrap();
        assert_eq!(completion.text.as_deref(), Some("Hello, world!"));
        assert!(completion.tool_calls.is_empty());
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_with_multiple_tool_calls_keeps_order() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {
                            "id": "call_a",
                            "type": "function",
                            "function": {
                                "name": "analyze_sentiment",
                                "arguments": "{\"text\": \"I love it\"}"
                            }
                        },
                        {
                            "id": "call_b",
                            "type": "function",
                            "function": {
                                "name": "process_with_gemini",
                                "arguments": "{\"prompt\": \"describe\"}"
                            }
                        }
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;

        let completion = parse_completion_response(body).unwrap();
        assert!(completion.text.is_none());
        assert_eq!(completion.tool_calls.len(), 2);
        assert_eq!(completion.tool_calls[0].name, "analyze_sentiment");
        assert_eq!(completion.tool_calls[0].arguments["text"], "I love it");
        assert_eq!(completion.tool_calls[1].id, "call_b");
    }

    #[test]
    fn test_parse_empty_choices() {
        let body = r#"{"choices": []}"#;
        assert!(parse_completion_response(body).is_err());
    }

    #[test]
    fn test_parse_not_json() {
        let err = parse_completion_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, InferenceError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_invalid_tool_arguments() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_a",
                        "type": "function",
                        "function": {"name": "analyze_sentiment", "arguments": "{text: oops"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let err = parse_completion_response(body).unwrap_err();
        assert!(matches!(err, InferenceError::ToolCallParseError { .. }));
    }

    #[test]
    fn test_parse_tool_call_generates_id() {
        let call = parse_tool_call(None, "analyze_sentiment", r#"{"text": "ok"}"#).unwrap();
        assert!(call.id.starts_with("call_"));
    }

    #[test]
    fn test_parse_tool_call_empty_arguments() {
        let call = parse_tool_call(Some("c1"), "analyze_multimodal_content", "").unwrap();
        assert!(call.arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_parse_tool_call_rejects_non_object() {
        assert!(parse_tool_call(Some("c1"), "analyze_sentiment", "[1, 2]").is_err());
        assert!(parse_tool_call(Some("c1"), "  ", "{}").is_err());
    }
}
