//! Gemini gateway for LLM interactions.
//!
//! This module provides a gateway for Google's Gemini API, covering
//! single-shot content generation (used for image analysis) and streaming
//! generation with function calling (used by chat sessions).

use crate::error::{MoriatiError, Result};
use crate::llm::gateway::{CompletionConfig, LlmGateway, StreamChunk};
use crate::llm::gateways::gemini_messages_adapter::adapt_messages_to_gemini;
use crate::llm::models::{LlmGatewayResponse, LlmMessage, LlmToolCall};
use crate::llm::tools::LlmTool;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::pin::Pin;
use tracing::{debug, info, warn};

/// Configuration for connecting to the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Option<std::time::Duration>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            // API_KEY is the name the hosted frontend used; keep it as a fallback.
            api_key: std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("API_KEY"))
                .unwrap_or_default(),
            base_url: std::env::var("GEMINI_API_ENDPOINT")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            timeout: None,
        }
    }
}

/// Gateway for the Gemini LLM service.
///
/// A missing API key is a recognized configuration error, detected eagerly
/// before any network activity.
pub struct GeminiGateway {
    client: Client,
    config: GeminiConfig,
}

impl GeminiGateway {
    /// Create a new Gemini gateway with default configuration.
    pub fn new() -> Self {
        Self::with_config(GeminiConfig::default())
    }

    /// Create a new Gemini gateway with custom configuration.
    pub fn with_config(config: GeminiConfig) -> Self {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build().unwrap();

        Self { client, config }
    }

    /// Create gateway with custom API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self::with_config(GeminiConfig {
            api_key: api_key.into(),
            ..Default::default()
        })
    }

    /// Create gateway with custom API key and base URL.
    pub fn with_api_key_and_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self::with_config(GeminiConfig {
            api_key: api_key.into(),
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    fn ensure_api_key(&self) -> Result<()> {
        if self.config.api_key.is_empty() {
            return Err(MoriatiError::ConfigError(
                "API key not found. Please set the GEMINI_API_KEY environment variable."
                    .to_string(),
            ));
        }
        Ok(())
    }

    fn build_body(
        &self,
        messages: &[LlmMessage],
        tools: Option<&[Box<dyn LlmTool>]>,
        config: &CompletionConfig,
    ) -> Result<Value> {
        let (system_instruction, contents) = adapt_messages_to_gemini(messages)?;

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": config.temperature,
                "maxOutputTokens": config.max_output_tokens,
            }
        });

        if let Some(top_p) = config.top_p {
            body["generationConfig"]["topP"] = json!(top_p);
        }

        if let Some(system_instruction) = system_instruction {
            body["systemInstruction"] = system_instruction;
        }

        if let Some(tools) = tools {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    let function = tool.descriptor().function;
                    json!({
                        "name": function.name,
                        "description": function.description,
                        "parameters": function.parameters,
                    })
                })
                .collect();
            body["tools"] = json!([{"functionDeclarations": declarations}]);
        }

        Ok(body)
    }
}

impl Default for GeminiGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmGateway for GeminiGateway {
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        tools: Option<&[Box<dyn LlmTool>]>,
        config: &CompletionConfig,
    ) -> Result<LlmGatewayResponse> {
        self.ensure_api_key()?;

        info!("Delegating to Gemini for completion");
        debug!("Model: {}, Message count: {}", model, messages.len());

        let body = self.build_body(messages, tools, config)?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, model, self.config.api_key
        );

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(MoriatiError::GatewayError(format!(
                "Gemini API error: {}",
                response.status()
            )));
        }

        let response_body: Value = response.json().await?;
        let (content, tool_calls) = parse_candidate_parts(&response_body);

        Ok(LlmGatewayResponse {
            content,
            tool_calls,
        })
    }

    fn complete_stream<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [LlmMessage],
        tools: Option<&'a [Box<dyn LlmTool>]>,
        config: &'a CompletionConfig,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
        Box::pin(async_stream::stream! {
            if let Err(e) = self.ensure_api_key() {
                yield Err(e);
                return;
            }

            info!("Starting Gemini streaming completion");
            debug!("Model: {}, Message count: {}", model, messages.len());

            let body = match self.build_body(messages, tools, config) {
                Ok(body) => body,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let url = format!(
                "{}/models/{}:streamGenerateContent?alt=sse&key={}",
                self.config.base_url, model, self.config.api_key
            );

            let response = match self.client.post(&url).json(&body).send().await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };

            if !response.status().is_success() {
                yield Err(MoriatiError::GatewayError(format!(
                    "Gemini API error: {}",
                    response.status()
                )));
                return;
            }

            // Server-sent events: one "data: {json}" line per chunk
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(bytes) => {
                        if let Ok(text) = std::str::from_utf8(&bytes) {
                            buffer.push_str(text);

                            while let Some(newline_pos) = buffer.find('\n') {
                                let line = buffer[..newline_pos].trim().to_string();
                                buffer = buffer[newline_pos + 1..].to_string();

                                if let Some(chunk) = parse_sse_line(&line) {
                                    yield Ok(chunk);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(e.into());
                        return;
                    }
                }
            }

            // Flush a final line that arrived without a trailing newline
            if let Some(chunk) = parse_sse_line(buffer.trim()) {
                yield Ok(chunk);
            }
        })
    }
}

/// Parse one SSE line into a stream chunk.
///
/// A chunk carrying function calls is a tool-call chunk; otherwise its text
/// parts are content. Lines that are empty, not data, or unparseable yield
/// nothing.
fn parse_sse_line(line: &str) -> Option<StreamChunk> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }

    let json: Value = match serde_json::from_str(payload) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to parse streaming chunk: {}", e);
            return None;
        }
    };

    let (content, tool_calls) = parse_candidate_parts(&json);
    if !tool_calls.is_empty() {
        Some(StreamChunk::ToolCalls(tool_calls))
    } else {
        content.map(StreamChunk::Content)
    }
}

/// Extract text and function calls from the first candidate's parts.
fn parse_candidate_parts(response: &Value) -> (Option<String>, Vec<LlmToolCall>) {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    if let Some(parts) = response["candidates"][0]["content"]["parts"].as_array() {
        for part in parts {
            if let Some(part_text) = part["text"].as_str() {
                text.push_str(part_text);
            }

            if let Some(call) = part["functionCall"].as_object() {
                if let Some(name) = call.get("name").and_then(|v| v.as_str()) {
                    let arguments: HashMap<String, Value> = call
                        .get("args")
                        .and_then(|v| v.as_object())
                        .map(|args| args.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                        .unwrap_or_default();

                    tool_calls.push(LlmToolCall {
                        id: None,
                        name: name.to_string(),
                        arguments,
                    });
                }
            }
        }
    }

    let content = if text.is_empty() { None } else { Some(text) };
    (content, tool_calls)
}
