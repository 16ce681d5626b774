//! Conversion from the crate's message model to Gemini's wire format.
//!
//! Gemini keeps the system prompt out of the turn list (`systemInstruction`),
//! names the assistant role `model`, and carries tool traffic as
//! `functionCall` / `functionResponse` parts inside ordinary turns.

use crate::error::{MoriatiError, Result};
use crate::llm::models::{LlmMessage, MessageRole};
use serde_json::{json, Value};

/// Adapt messages to Gemini's request shape.
///
/// Returns the `systemInstruction` value (if any system messages were
/// present) and the `contents` turn list.
pub fn adapt_messages_to_gemini(messages: &[LlmMessage]) -> Result<(Option<Value>, Vec<Value>)> {
    let mut system_parts: Vec<Value> = Vec::new();
    let mut contents: Vec<Value> = Vec::new();

    for msg in messages {
        match msg.role {
            MessageRole::System => {
                if let Some(content) = &msg.content {
                    system_parts.push(json!({"text": content}));
                }
            }
            MessageRole::User => {
                let mut parts: Vec<Value> = Vec::new();
                if let Some(images) = &msg.images {
                    for image in images {
                        parts.push(json!({
                            "inline_data": {
                                "mime_type": image.mime_type,
                                "data": image.data
                            }
                        }));
                    }
                }
                if let Some(content) = &msg.content {
                    parts.push(json!({"text": content}));
                }
                contents.push(json!({"role": "user", "parts": parts}));
            }
            MessageRole::Assistant => {
                let mut parts: Vec<Value> = Vec::new();
                if let Some(content) = &msg.content {
                    if !content.is_empty() {
                        parts.push(json!({"text": content}));
                    }
                }
                if let Some(tool_calls) = &msg.tool_calls {
                    for call in tool_calls {
                        parts.push(json!({
                            "functionCall": {
                                "name": call.name,
                                "args": call.arguments
                            }
                        }));
                    }
                }
                contents.push(json!({"role": "model", "parts": parts}));
            }
            MessageRole::Tool => {
                let name = msg
                    .tool_calls
                    .as_ref()
                    .and_then(|calls| calls.first())
                    .map(|call| call.name.clone())
                    .ok_or_else(|| {
                        MoriatiError::GatewayError(
                            "Tool message without an originating call".to_string(),
                        )
                    })?;

                // Tool output is stored as a JSON string; fall back to raw text.
                let content: Value = match &msg.content {
                    Some(text) => serde_json::from_str(text)
                        .unwrap_or_else(|_| Value::String(text.clone())),
                    None => Value::Null,
                };

                contents.push(json!({
                    "role": "user",
                    "parts": [{
                        "functionResponse": {
                            "name": name,
                            "response": {
                                "name": name,
                                "content": content
                            }
                        }
                    }]
                }));
            }
        }
    }

    let system_instruction = if system_parts.is_empty() {
        None
    } else {
        Some(json!({"parts": system_parts}))
    };

    Ok((system_instruction, contents))
}
