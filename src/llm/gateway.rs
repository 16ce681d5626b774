use crate::error::Result;
use crate::llm::models::{LlmGatewayResponse, LlmMessage, LlmToolCall};
use crate::llm::tools::LlmTool;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Configuration for LLM completion
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub temperature: f32,
    pub max_output_tokens: usize,
    pub top_p: Option<f32>,
    /// Upper bound on tool-call rounds resolved within one request.
    /// The default of 1 resolves only the first call and never loops.
    pub max_tool_hops: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            max_output_tokens: 8192,
            top_p: None,
            max_tool_hops: 1,
        }
    }
}

/// A single chunk of a streaming completion.
///
/// A chunk carrying a function-call request is a `ToolCalls` chunk;
/// everything else is partial answer text.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    Content(String),
    ToolCalls(Vec<LlmToolCall>),
}

/// Abstract interface for LLM providers
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Complete an LLM request with a full response
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        tools: Option<&[Box<dyn LlmTool>]>,
        config: &CompletionConfig,
    ) -> Result<LlmGatewayResponse>;

    /// Complete an LLM request as a stream of incremental chunks
    fn complete_stream<'a>(
        &'a self,
        model: &'a str,
        messages: &'a [LlmMessage],
        tools: Option<&'a [Box<dyn LlmTool>]>,
        config: &'a CompletionConfig,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>>;
}
