use serde_json::{json, Map, Value};

use crate::error::{GatewayError, Result};

const CLAUDE_DEFAULT_MAX_TOKENS: u64 = 8_192;
const FALLBACK_MAX_TOKENS: u64 = 4_096;

fn default_max_tokens(model: &str) -> u64 {
    if model.starts_with("claude-") {
        CLAUDE_DEFAULT_MAX_TOKENS
    } else {
        FALLBACK_MAX_TOKENS
    }
}

fn message_content(message: &Value) -> Result<&str> {
    message
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Validation("message content must be a string".to_string()))
}

/// Builds an Anthropic Messages request from a chat-completions request.
///
/// System messages are lifted into the top-level `system` field; adjacent
/// messages with the same role are coalesced, which the Messages API
/// requires for strictly alternating turns.
pub fn anthropic_request_from_chat(body: &Value) -> Result<Value> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Validation("model is required".to_string()))?;
    let messages = body
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| GatewayError::Validation("messages must be an array".to_string()))?;

    let mut system_parts: Vec<&str> = Vec::new();
    let mut turns: Vec<(String, String)> = Vec::new();
    for message in messages {
        let role = message
            .get("role")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Validation("message role is required".to_string()))?;
        let content = message_content(message)?;
        if role == "system" {
            system_parts.push(content);
            continue;
        }
        match turns.last_mut() {
            Some((last_role, last_content)) if last_role == role => {
                last_content.push('\n');
                last_content.push_str(content);
            }
            _ => turns.push((role.to_string(), content.to_string())),
        }
    }

    let max_tokens = body
        .get("max_tokens")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| default_max_tokens(model));

    let mut out = Map::new();
    out.insert("model".to_string(), Value::String(model.to_string()));
    out.insert(
        "messages".to_string(),
        Value::Array(
            turns
                .into_iter()
                .map(|(role, content)| json!({ "role": role, "content": content }))
                .collect(),
        ),
    );
    out.insert("max_tokens".to_string(), json!(max_tokens));
    if !system_parts.is_empty() {
        out.insert("system".to_string(), Value::String(system_parts.join("\n")));
    }
    if let Some(temperature) = body.get("temperature").filter(|v| !v.is_null()) {
        out.insert("temperature".to_string(), temperature.clone());
    }
    if let Some(top_p) = body.get("top_p").filter(|v| !v.is_null()) {
        out.insert("top_p".to_string(), top_p.clone());
    }
    match body.get("stop") {
        Some(Value::String(stop)) => {
            out.insert("stop_sequences".to_string(), json!([stop]));
        }
        Some(Value::Array(stops)) => {
            out.insert("stop_sequences".to_string(), Value::Array(stops.clone()));
        }
        _ => {}
    }

    Ok(Value::Object(out))
}

fn finish_reason(stop_reason: Option<&str>) -> Value {
    match stop_reason {
        Some("end_turn") | Some("stop_sequence") => Value::String("stop".to_string()),
        Some("max_tokens") => Value::String("length".to_string()),
        Some("tool_use") => Value::String("tool_calls".to_string()),
        Some(other) => Value::String(other.to_string()),
        None => Value::Null,
    }
}

/// Maps an Anthropic Messages response back to the chat-completions shape.
pub fn chat_response_from_anthropic(upstream: &Value, requested_model: &str) -> Value {
    let content = upstream
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    let model = upstream
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(requested_model);
    let id = upstream
        .get("id")
        .and_then(Value::as_str)
        .map(|id| id.to_string())
        .unwrap_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4()));

    let prompt_tokens = upstream
        .pointer("/usage/input_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let completion_tokens = upstream
        .pointer("/usage/output_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    json!({
        "id": id,
        "object": "chat.completion",
        "created": chrono::Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": finish_reason(
                upstream.get("stop_reason").and_then(Value::as_str),
            ),
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifts_system_and_coalesces_adjacent_roles() {
        let body = json!({
            "model": "claude-sonnet-4-20250514",
            "messages": [
                { "role": "system", "content": "You are helpful." },
                { "role": "user", "content": "Part 1" },
                { "role": "user", "content": "Part 2" },
            ],
        });
        let out = anthropic_request_from_chat(&body).unwrap();
        assert_eq!(out["system"], "You are helpful.");
        assert_eq!(out["max_tokens"], 8_192);
        let messages = out["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Part 1\nPart 2");
    }

    #[test]
    fn multiple_system_messages_concatenate() {
        let body = json!({
            "model": "claude-sonnet-4-20250514",
            "messages": [
                { "role": "system", "content": "Rule one." },
                { "role": "user", "content": "hi" },
                { "role": "system", "content": "Rule two." },
            ],
        });
        let out = anthropic_request_from_chat(&body).unwrap();
        assert_eq!(out["system"], "Rule one.\nRule two.");
    }

    #[test]
    fn caller_max_tokens_wins_and_stop_becomes_array() {
        let body = json!({
            "model": "claude-sonnet-4-20250514",
            "messages": [{ "role": "user", "content": "hi" }],
            "max_tokens": 128,
            "temperature": 0.2,
            "stop": "END",
        });
        let out = anthropic_request_from_chat(&body).unwrap();
        assert_eq!(out["max_tokens"], 128);
        assert_eq!(out["temperature"], 0.2);
        assert_eq!(out["stop_sequences"], json!(["END"]));
        assert!(out.get("system").is_none());
    }

    #[test]
    fn non_claude_model_defaults_to_4096() {
        let body = json!({
            "model": "some-other-model",
            "messages": [{ "role": "user", "content": "hi" }],
        });
        let out = anthropic_request_from_chat(&body).unwrap();
        assert_eq!(out["max_tokens"], 4_096);
    }

    #[test]
    fn response_concatenates_text_blocks_and_maps_stop_reason() {
        let upstream = json!({
            "id": "msg_01",
            "model": "claude-sonnet-4-20250514",
            "content": [
                { "type": "text", "text": "Hello" },
                { "type": "tool_use", "id": "t1", "name": "x", "input": {} },
                { "type": "text", "text": " world" },
            ],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 10, "output_tokens": 4 },
        });
        let out = chat_response_from_anthropic(&upstream, "claude-sonnet-4-20250514");
        assert_eq!(out["object"], "chat.completion");
        assert_eq!(out["choices"][0]["message"]["content"], "Hello world");
        assert_eq!(out["choices"][0]["finish_reason"], "stop");
        assert_eq!(out["usage"]["prompt_tokens"], 10);
        assert_eq!(out["usage"]["completion_tokens"], 4);
        assert_eq!(out["usage"]["total_tokens"], 14);
    }

    #[test]
    fn max_tokens_stop_reason_maps_to_length() {
        let upstream = json!({
            "content": [{ "type": "text", "text": "truncated" }],
            "stop_reason": "max_tokens",
            "usage": { "input_tokens": 1, "output_tokens": 2 },
        });
        let out = chat_response_from_anthropic(&upstream, "claude-3-5-haiku-20241022");
        assert_eq!(out["choices"][0]["finish_reason"], "length");
        assert_eq!(out["model"], "claude-3-5-haiku-20241022");
    }

    #[test]
    fn unknown_stop_reason_passes_through() {
        let upstream = json!({
            "content": [],
            "stop_reason": "pause_turn",
            "usage": { "input_tokens": 0, "output_tokens": 0 },
        });
        let out = chat_response_from_anthropic(&upstream, "claude-3-5-haiku-20241022");
        assert_eq!(out["choices"][0]["finish_reason"], "pause_turn");
    }
}
