//! Request bodies and reply extraction for the supported wire formats.
//!
//! These two functions are the only place that knows what a provider's JSON
//! looks like. Everything else treats bodies as opaque values.

use serde_json::{Value, json};

use super::history::{ConversationHistory, Role};
use super::provider::{ProviderDescriptor, WireFormat};

/// Build the JSON request body for `prompt`, preceded by `history`.
#[must_use]
pub fn build_request(
    descriptor: &ProviderDescriptor,
    model: &str,
    history: &ConversationHistory,
    prompt: &str,
) -> Value {
    match descriptor.format {
        WireFormat::ChatCompletions => {
            let mut messages: Vec<Value> = history
                .turns()
                .map(|(role, text)| json!({ "role": role.as_str(), "content": text }))
                .collect();
            messages.push(json!({ "role": Role::User.as_str(), "content": prompt }));
            json!({ "model": model, "messages": messages })
        }
        WireFormat::GenerateContent => {
            let mut contents: Vec<Value> = history
                .turns()
                .map(|(role, text)| {
                    json!({ "role": gemini_role(role), "parts": [{ "text": text }] })
                })
                .collect();
            contents.push(json!({ "role": gemini_role(Role::User), "parts": [{ "text": prompt }] }));
            json!({ "contents": contents })
        }
    }
}

const fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Apply the descriptor's extraction rule to a response body.
///
/// Returns `None` when the pointer is missing or the value is not a string.
/// Whitespace-only text is returned as-is; callers decide what counts as empty.
#[must_use]
pub fn extract_reply(descriptor: &ProviderDescriptor, body: &Value) -> Option<String> {
    body.pointer(&descriptor.extraction)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// A minimal successful response carrying `reply` in the given shape.
#[must_use]
pub fn sample_response(format: WireFormat, reply: &str) -> Value {
    match format {
        WireFormat::ChatCompletions => json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": reply },
                "finish_reason": "stop"
            }]
        }),
        WireFormat::GenerateContent => json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": reply }] },
                "finishReason": "STOP"
            }]
        }),
    }
}
