use crate::error::Result;
use crate::llm::gateway::{CompletionConfig, LlmGateway, StreamChunk};
use crate::llm::models::{LlmMessage, LlmToolCall, MessageRole};
use crate::llm::tools::LlmTool;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, warn};

/// Main interface for LLM interactions.
///
/// The broker drives the tool-call protocol: when the model requests a
/// known capability, the first call is resolved and its result is sent back
/// into the same conversation before the follow-up response is produced.
/// Re-entry is bounded by `CompletionConfig::max_tool_hops` (default 1), so
/// a turn resolves at most one tool call unless configured otherwise.
#[derive(Clone)]
pub struct LlmBroker {
    model: String,
    gateway: Arc<dyn LlmGateway>,
}

impl LlmBroker {
    /// Create a new LLM broker
    pub fn new(model: impl Into<String>, gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            model: model.into(),
            gateway,
        }
    }

    /// Generate text response from LLM
    pub async fn generate(
        &self,
        messages: &[LlmMessage],
        tools: Option<&[Box<dyn LlmTool>]>,
        config: Option<CompletionConfig>,
    ) -> Result<String> {
        let config = config.unwrap_or_default();
        let mut current_messages = messages.to_vec();
        let mut hops_used = 0;

        loop {
            let response = self
                .gateway
                .complete(&self.model, &current_messages, tools, &config)
                .await?;

            if response.tool_calls.is_empty() {
                return Ok(response.content.unwrap_or_default());
            }

            if hops_used >= config.max_tool_hops {
                warn!("Tool-call budget exhausted after {} hop(s)", hops_used);
                return Ok(response.content.unwrap_or_default());
            }

            let Some(tools_ref) = tools else {
                warn!("LLM requested tool calls but no tools provided");
                return Ok(response.content.unwrap_or_default());
            };

            info!("Tool calls requested: {}", response.tool_calls.len());
            let mut tool_calls = response.tool_calls;
            let call = tool_calls.swap_remove(0);

            let Some(tool) = tools_ref.iter().find(|t| t.matches(&call.name)) else {
                warn!("Tool not found: {}", call.name);
                return Ok(response.content.unwrap_or_default());
            };

            info!("Executing tool: {}", call.name);
            let output = tool.run(&call.arguments).await?;

            push_tool_exchange(&mut current_messages, response.content, call, &output)?;
            hops_used += 1;
        }
    }

    /// Generate streaming text response from LLM.
    ///
    /// Returns a stream that yields content chunks as they arrive. When the
    /// model requests a tool, the first call is executed, its result is fed
    /// back into the conversation, and the replacement stream is consumed in
    /// place of the original. The returned stream owns its data, so the
    /// caller is free to mutate its own state while consuming it.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::stream::StreamExt;
    ///
    /// let broker = LlmBroker::new("gemini-2.5-flash", gateway);
    /// let messages = vec![LlmMessage::user("Tell me a story")];
    ///
    /// let mut stream = broker.generate_stream(messages, None, None);
    /// while let Some(result) = stream.next().await {
    ///     match result {
    ///         Ok(chunk) => print!("{}", chunk),
    ///         Err(e) => eprintln!("Error: {}", e),
    ///     }
    /// }
    /// ```
    pub fn generate_stream(
        &self,
        messages: Vec<LlmMessage>,
        tools: Option<Vec<Box<dyn LlmTool>>>,
        config: Option<CompletionConfig>,
    ) -> Pin<Box<dyn Stream<Item = Result<String>> + Send + 'static>> {
        let broker = self.clone();
        let config = config.unwrap_or_default();

        Box::pin(async_stream::stream! {
            let mut current_messages = messages;
            let mut hops_used = 0;

            loop {
                let mut round_content = String::new();
                let mut round_tool_calls: Vec<LlmToolCall> = Vec::new();

                {
                    let mut inner = broker.gateway.complete_stream(
                        &broker.model,
                        &current_messages,
                        tools.as_deref(),
                        &config,
                    );

                    while let Some(chunk_result) = inner.next().await {
                        match chunk_result {
                            Ok(StreamChunk::Content(content)) => {
                                round_content.push_str(&content);
                                yield Ok(content);
                            }
                            Ok(StreamChunk::ToolCalls(tool_calls)) => {
                                round_tool_calls.extend(tool_calls);
                            }
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                }

                if round_tool_calls.is_empty() {
                    return;
                }

                if hops_used >= config.max_tool_hops {
                    warn!("Tool-call budget exhausted after {} hop(s)", hops_used);
                    return;
                }

                let Some(tools_ref) = tools.as_deref() else {
                    warn!("LLM requested tool calls but no tools provided");
                    return;
                };

                info!("Processing {} tool call(s) in stream", round_tool_calls.len());
                let call = round_tool_calls.swap_remove(0);

                let Some(tool) = tools_ref.iter().find(|t| t.matches(&call.name)) else {
                    warn!("Tool not found: {}", call.name);
                    return;
                };

                info!("Executing tool: {}", call.name);
                let output = match tool.run(&call.arguments).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!("Tool execution failed: {}", e);
                        yield Err(e);
                        return;
                    }
                };

                let round_content = (!round_content.is_empty()).then_some(round_content);
                if let Err(e) =
                    push_tool_exchange(&mut current_messages, round_content, call, &output)
                {
                    yield Err(e);
                    return;
                }

                hops_used += 1;
            }
        })
    }
}

/// Record an honored tool call and its result in the conversation.
fn push_tool_exchange(
    messages: &mut Vec<LlmMessage>,
    content: Option<String>,
    call: LlmToolCall,
    output: &Value,
) -> Result<()> {
    messages.push(LlmMessage {
        role: MessageRole::Assistant,
        content,
        tool_calls: Some(vec![call.clone()]),
        images: None,
    });
    messages.push(LlmMessage {
        role: MessageRole::Tool,
        content: Some(serde_json::to_string(output)?),
        tool_calls: Some(vec![call]),
        images: None,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MoriatiError;
    use crate::llm::models::LlmGatewayResponse;
    use crate::llm::tools::{FunctionDescriptor, ToolDescriptor};
    use async_trait::async_trait;
    use futures::stream;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    // Mock gateway scripted with one chunk list per streaming round
    struct MockGateway {
        responses: Vec<LlmGatewayResponse>,
        stream_rounds: Vec<Vec<Result<StreamChunk>>>,
        call_count: Mutex<usize>,
    }

    impl MockGateway {
        fn with_responses(responses: Vec<LlmGatewayResponse>) -> Self {
            Self {
                responses,
                stream_rounds: vec![],
                call_count: Mutex::new(0),
            }
        }

        fn with_stream_rounds(stream_rounds: Vec<Vec<Result<StreamChunk>>>) -> Self {
            Self {
                responses: vec![],
                stream_rounds,
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl LlmGateway for MockGateway {
        async fn complete(
            &self,
            _model: &str,
            _messages: &[LlmMessage],
            _tools: Option<&[Box<dyn LlmTool>]>,
            _config: &CompletionConfig,
        ) -> Result<LlmGatewayResponse> {
            let mut count = self.call_count.lock().unwrap();
            let idx = *count;
            *count += 1;

            if idx < self.responses.len() {
                Ok(self.responses[idx].clone())
            } else {
                Ok(LlmGatewayResponse {
                    content: Some("default response".to_string()),
                    tool_calls: vec![],
                })
            }
        }

        fn complete_stream<'a>(
            &'a self,
            _model: &'a str,
            _messages: &'a [LlmMessage],
            _tools: Option<&'a [Box<dyn LlmTool>]>,
            _config: &'a CompletionConfig,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
            let mut count = self.call_count.lock().unwrap();
            let idx = *count;
            *count += 1;

            let chunks = if idx < self.stream_rounds.len() {
                self.stream_rounds[idx]
                    .iter()
                    .map(|chunk| match chunk {
                        Ok(c) => Ok(c.clone()),
                        Err(_) => Err(MoriatiError::GatewayError("stream failed".to_string())),
                    })
                    .collect()
            } else {
                vec![Ok(StreamChunk::Content("default".to_string()))]
            };

            Box::pin(stream::iter(chunks))
        }
    }

    // Mock tool that records the arguments it ran with
    #[derive(Clone)]
    struct RecordingTool {
        name: String,
        result: Value,
        invocations: Arc<Mutex<Vec<HashMap<String, Value>>>>,
    }

    impl RecordingTool {
        fn new(name: &str, result: Value) -> Self {
            Self {
                name: name.to_string(),
                result,
                invocations: Arc::new(Mutex::new(vec![])),
            }
        }
    }

    #[async_trait]
    impl LlmTool for RecordingTool {
        async fn run(&self, args: &HashMap<String, Value>) -> Result<Value> {
            self.invocations.lock().unwrap().push(args.clone());
            Ok(self.result.clone())
        }

        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                r#type: "function".to_string(),
                function: FunctionDescriptor {
                    name: self.name.clone(),
                    description: "A mock tool".to_string(),
                    parameters: json!({}),
                },
            }
        }

        fn clone_box(&self) -> Box<dyn LlmTool> {
            Box::new(self.clone())
        }
    }

    fn tool_call(name: &str) -> LlmToolCall {
        LlmToolCall {
            id: None,
            name: name.to_string(),
            arguments: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_broker_new() {
        let gateway = Arc::new(MockGateway::with_responses(vec![]));
        let broker = LlmBroker::new("test-model", gateway);
        assert_eq!(broker.model, "test-model");
    }

    #[tokio::test]
    async fn test_generate_simple_response() {
        let gateway = Arc::new(MockGateway::with_responses(vec![LlmGatewayResponse {
            content: Some("Hello, World!".to_string()),
            tool_calls: vec![],
        }]));
        let broker = LlmBroker::new("test-model", gateway);

        let messages = vec![LlmMessage::user("Hi")];
        let result = broker.generate(&messages, None, None).await.unwrap();

        assert_eq!(result, "Hello, World!");
    }

    #[tokio::test]
    async fn test_generate_empty_response_content() {
        let gateway = Arc::new(MockGateway::with_responses(vec![LlmGatewayResponse {
            content: None,
            tool_calls: vec![],
        }]));
        let broker = LlmBroker::new("test-model", gateway);

        let messages = vec![LlmMessage::user("Hi")];
        let result = broker.generate(&messages, None, None).await.unwrap();

        assert_eq!(result, "");
    }

    #[tokio::test]
    async fn test_generate_with_tool_call() {
        let gateway = Arc::new(MockGateway::with_responses(vec![
            LlmGatewayResponse {
                content: None,
                tool_calls: vec![tool_call("test_tool")],
            },
            LlmGatewayResponse {
                content: Some("After tool execution".to_string()),
                tool_calls: vec![],
            },
        ]));
        let broker = LlmBroker::new("test-model", gateway.clone());

        let tool = RecordingTool::new("test_tool", json!({"result": "success"}));
        let tools: Vec<Box<dyn LlmTool>> = vec![Box::new(tool.clone())];

        let messages = vec![LlmMessage::user("Use the tool")];
        let result = broker.generate(&messages, Some(&tools), None).await.unwrap();

        assert_eq!(result, "After tool execution");
        assert_eq!(tool.invocations.lock().unwrap().len(), 1);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn test_generate_honors_only_first_tool_call() {
        let gateway = Arc::new(MockGateway::with_responses(vec![
            LlmGatewayResponse {
                content: None,
                tool_calls: vec![tool_call("first_tool"), tool_call("second_tool")],
            },
            LlmGatewayResponse {
                content: Some("done".to_string()),
                tool_calls: vec![],
            },
        ]));
        let broker = LlmBroker::new("test-model", gateway);

        let first = RecordingTool::new("first_tool", json!("a"));
        let second = RecordingTool::new("second_tool", json!("b"));
        let tools: Vec<Box<dyn LlmTool>> = vec![Box::new(first.clone()), Box::new(second.clone())];

        let messages = vec![LlmMessage::user("Use the tools")];
        broker.generate(&messages, Some(&tools), None).await.unwrap();

        assert_eq!(first.invocations.lock().unwrap().len(), 1);
        assert_eq!(second.invocations.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_generate_stops_when_hop_budget_exhausted() {
        // The gateway keeps asking for the tool on every round
        let gateway = Arc::new(MockGateway::with_responses(vec![
            LlmGatewayResponse {
                content: None,
                tool_calls: vec![tool_call("test_tool")],
            },
            LlmGatewayResponse {
                content: Some("still asking".to_string()),
                tool_calls: vec![tool_call("test_tool")],
            },
            LlmGatewayResponse {
                content: Some("unreachable".to_string()),
                tool_calls: vec![],
            },
        ]));
        let broker = LlmBroker::new("test-model", gateway.clone());

        let tool = RecordingTool::new("test_tool", json!("ok"));
        let tools: Vec<Box<dyn LlmTool>> = vec![Box::new(tool.clone())];

        let messages = vec![LlmMessage::user("Use the tool")];
        let result = broker.generate(&messages, Some(&tools), None).await.unwrap();

        // Default budget is one hop: the second request for the tool is not honored
        assert_eq!(result, "still asking");
        assert_eq!(tool.invocations.lock().unwrap().len(), 1);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn test_generate_with_raised_hop_budget() {
        let gateway = Arc::new(MockGateway::with_responses(vec![
            LlmGatewayResponse {
                content: None,
                tool_calls: vec![tool_call("test_tool")],
            },
            LlmGatewayResponse {
                content: None,
                tool_calls: vec![tool_call("test_tool")],
            },
            LlmGatewayResponse {
                content: Some("after two hops".to_string()),
                tool_calls: vec![],
            },
        ]));
        let broker = LlmBroker::new("test-model", gateway);

        let tool = RecordingTool::new("test_tool", json!("ok"));
        let tools: Vec<Box<dyn LlmTool>> = vec![Box::new(tool.clone())];

        let config = CompletionConfig {
            max_tool_hops: 2,
            ..Default::default()
        };

        let messages = vec![LlmMessage::user("Use the tool twice")];
        let result = broker.generate(&messages, Some(&tools), Some(config)).await.unwrap();

        assert_eq!(result, "after two hops");
        assert_eq!(tool.invocations.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_generate_with_tool_call_no_tools_provided() {
        let gateway = Arc::new(MockGateway::with_responses(vec![LlmGatewayResponse {
            content: Some("fallback".to_string()),
            tool_calls: vec![tool_call("test_tool")],
        }]));
        let broker = LlmBroker::new("test-model", gateway);

        let messages = vec![LlmMessage::user("Use the tool")];
        let result = broker.generate(&messages, None, None).await.unwrap();

        assert_eq!(result, "fallback");
    }

    #[tokio::test]
    async fn test_generate_unknown_tool_returns_content() {
        let gateway = Arc::new(MockGateway::with_responses(vec![LlmGatewayResponse {
            content: Some("partial".to_string()),
            tool_calls: vec![tool_call("unknown_tool")],
        }]));
        let broker = LlmBroker::new("test-model", gateway);

        let tool = RecordingTool::new("other_tool", json!("ok"));
        let tools: Vec<Box<dyn LlmTool>> = vec![Box::new(tool)];

        let messages = vec![LlmMessage::user("Hi")];
        let result = broker.generate(&messages, Some(&tools), None).await.unwrap();

        assert_eq!(result, "partial");
    }

    #[tokio::test]
    async fn test_generate_stream_basic() {
        let gateway = Arc::new(MockGateway::with_stream_rounds(vec![vec![
            Ok(StreamChunk::Content("Hello".to_string())),
            Ok(StreamChunk::Content(" ".to_string())),
            Ok(StreamChunk::Content("World".to_string())),
        ]]));
        let broker = LlmBroker::new("test-model", gateway);

        let messages = vec![LlmMessage::user("Hello")];
        let mut stream = broker.generate_stream(messages, None, None);

        let mut result = String::new();
        while let Some(chunk) = stream.next().await {
            result.push_str(&chunk.unwrap());
        }

        assert_eq!(result, "Hello World");
    }

    #[tokio::test]
    async fn test_generate_stream_with_tool_call() {
        let gateway = Arc::new(MockGateway::with_stream_rounds(vec![
            vec![Ok(StreamChunk::ToolCalls(vec![tool_call("test_tool")]))],
            vec![
                Ok(StreamChunk::Content("After ".to_string())),
                Ok(StreamChunk::Content("tool".to_string())),
            ],
        ]));
        let broker = LlmBroker::new("test-model", gateway.clone());

        let tool = RecordingTool::new("test_tool", json!({"result": "success"}));
        let tools: Vec<Box<dyn LlmTool>> = vec![Box::new(tool.clone())];

        let messages = vec![LlmMessage::user("Use the tool")];
        let mut stream = broker.generate_stream(messages, Some(tools), None);

        let mut result = String::new();
        while let Some(chunk) = stream.next().await {
            result.push_str(&chunk.unwrap());
        }

        assert_eq!(result, "After tool");
        assert_eq!(tool.invocations.lock().unwrap().len(), 1);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn test_generate_stream_does_not_reenter_tool_branch() {
        // Both rounds request the tool; only the first is honored
        let gateway = Arc::new(MockGateway::with_stream_rounds(vec![
            vec![Ok(StreamChunk::ToolCalls(vec![tool_call("test_tool")]))],
            vec![
                Ok(StreamChunk::Content("text".to_string())),
                Ok(StreamChunk::ToolCalls(vec![tool_call("test_tool")])),
            ],
            vec![Ok(StreamChunk::Content("unreachable".to_string()))],
        ]));
        let broker = LlmBroker::new("test-model", gateway.clone());

        let tool = RecordingTool::new("test_tool", json!("ok"));
        let tools: Vec<Box<dyn LlmTool>> = vec![Box::new(tool.clone())];

        let messages = vec![LlmMessage::user("Use the tool")];
        let mut stream = broker.generate_stream(messages, Some(tools), None);

        let mut result = String::new();
        while let Some(chunk) = stream.next().await {
            result.push_str(&chunk.unwrap());
        }

        assert_eq!(result, "text");
        assert_eq!(tool.invocations.lock().unwrap().len(), 1);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn test_generate_stream_error_ends_stream() {
        let gateway = Arc::new(MockGateway::with_stream_rounds(vec![vec![
            Ok(StreamChunk::Content("partial".to_string())),
            Err(MoriatiError::GatewayError("stream failed".to_string())),
        ]]));
        let broker = LlmBroker::new("test-model", gateway);

        let messages = vec![LlmMessage::user("Hi")];
        let mut stream = broker.generate_stream(messages, None, None);

        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_generate_stream_records_tool_exchange_in_messages() {
        let gateway = Arc::new(MockGateway::with_stream_rounds(vec![
            vec![Ok(StreamChunk::ToolCalls(vec![LlmToolCall {
                id: None,
                name: "test_tool".to_string(),
                arguments: HashMap::from([("city".to_string(), json!("جدة"))]),
            }]))],
            vec![Ok(StreamChunk::Content("done".to_string()))],
        ]));
        let broker = LlmBroker::new("test-model", gateway);

        let tool = RecordingTool::new("test_tool", json!("ok"));
        let tools: Vec<Box<dyn LlmTool>> = vec![Box::new(tool.clone())];

        let messages = vec![LlmMessage::user("Use the tool")];
        let mut stream = broker.generate_stream(messages, Some(tools), None);
        while stream.next().await.is_some() {}

        // The tool saw the arguments the model supplied
        let invocations = tool.invocations.lock().unwrap();
        assert_eq!(invocations[0]["city"], "جدة");
    }
}
