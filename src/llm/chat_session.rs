//! Conversational chat sessions with transparent tool resolution.
//!
//! A `ChatSession` owns two views of one conversation: the transcript (what
//! a user interface renders, user and model messages only) and the
//! provider-shaped history the broker sends upstream. One turn is submitted
//! at a time; the returned stream yields the model reply as it grows, and
//! any tool call the model makes is resolved inside the broker before the
//! final text arrives.

use crate::llm::broker::LlmBroker;
use crate::llm::gateway::CompletionConfig;
use crate::llm::models::LlmMessage;
use crate::llm::tools::LlmTool;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use uuid::Uuid;

const TURN_FAILED: &str = "عذراً، حدث خطأ ما. يرجى المحاولة مرة أخرى. ";

/// Who authored a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One transcript entry.
///
/// The id is stable for the life of the message; streaming updates address
/// the in-flight model message by id, never by position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: ChatRole::User,
            text: text.into(),
        }
    }

    fn model(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// A chat session holding the transcript and the provider-shaped history.
///
/// Turns are serialized by `&mut self`: a new turn cannot be submitted while
/// a prior turn's stream is still borrowed. There is no queuing and no
/// cancellation of an in-flight turn.
///
/// # Examples
///
/// ```ignore
/// use futures::stream::StreamExt;
/// use moriati::llm::{ChatSession, LlmBroker};
/// use moriati::llm::gateways::GeminiGateway;
/// use std::sync::Arc;
///
/// let gateway = Arc::new(GeminiGateway::new());
/// let broker = LlmBroker::new("gemini-2.5-flash", gateway);
/// let mut session = ChatSession::new(broker);
///
/// let mut stream = session.submit_turn("What is Rust?");
/// while let Some(snapshot) = stream.next().await {
///     // snapshot is the full reply text so far
/// }
/// ```
pub struct ChatSession {
    broker: LlmBroker,
    transcript: Vec<ChatMessage>,
    history: Vec<LlmMessage>,
    tools: Vec<Box<dyn LlmTool>>,
    temperature: f32,
    max_tool_hops: usize,
}

impl ChatSession {
    /// Create a new chat session with default settings
    pub fn new(broker: LlmBroker) -> Self {
        Self::builder(broker).build()
    }

    /// Create a chat session builder for custom configuration.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let session = ChatSession::builder(broker)
    ///     .system_prompt("You are a helpful assistant.")
    ///     .tools(vec![Box::new(PrayerTimesTool::new())])
    ///     .build();
    /// ```
    pub fn builder(broker: LlmBroker) -> ChatSessionBuilder {
        ChatSessionBuilder::new(broker)
    }

    /// Submit one user turn and stream the model's reply.
    ///
    /// The user message is appended to the transcript synchronously, before
    /// any network activity. Each yielded item is the full reply text
    /// accumulated so far; the stream ends when the reply is complete.
    ///
    /// A turn that fails appends a single localized error message to the
    /// transcript, yields it, and ends — the session stays usable for
    /// subsequent turns. Empty or whitespace-only input is a no-op: the
    /// stream ends immediately and nothing is appended or sent.
    pub fn submit_turn<'a>(
        &'a mut self,
        user_text: &str,
    ) -> Pin<Box<dyn Stream<Item = String> + Send + 'a>> {
        let text = user_text.trim().to_string();

        Box::pin(async_stream::stream! {
            if text.is_empty() {
                return;
            }

            self.transcript.push(ChatMessage::user(&text));
            self.history.push(LlmMessage::user(&text));

            let config = CompletionConfig {
                temperature: self.temperature,
                max_tool_hops: self.max_tool_hops,
                ..Default::default()
            };
            let tools = (!self.tools.is_empty())
                .then(|| self.tools.iter().map(|t| t.clone_box()).collect());
            let mut inner = self.broker.generate_stream(self.history.clone(), tools, Some(config));

            // The model message slot is created on the first text chunk and
            // updated in place by id from then on.
            let mut slot: Option<Uuid> = None;
            let mut accumulated = String::new();

            while let Some(result) = inner.next().await {
                match result {
                    Ok(chunk) => {
                        if chunk.is_empty() {
                            continue;
                        }
                        accumulated.push_str(&chunk);

                        let id = match slot {
                            Some(id) => id,
                            None => {
                                let message = ChatMessage::model("");
                                let id = message.id;
                                self.transcript.push(message);
                                slot = Some(id);
                                id
                            }
                        };
                        self.set_message_text(id, &accumulated);
                        yield accumulated.clone();
                    }
                    Err(e) => {
                        let message = format!("{}{}", TURN_FAILED, e);
                        self.transcript.push(ChatMessage::model(&message));
                        yield message;
                        return;
                    }
                }
            }

            if !accumulated.is_empty() {
                self.history.push(LlmMessage::assistant(&accumulated));
            }
        })
    }

    /// Get the current transcript
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    fn set_message_text(&mut self, id: Uuid, text: &str) {
        if let Some(message) = self.transcript.iter_mut().find(|m| m.id == id) {
            message.text = text.to_string();
        }
    }
}

/// Builder for constructing a `ChatSession` with custom configuration.
pub struct ChatSessionBuilder {
    broker: LlmBroker,
    system_prompt: String,
    tools: Vec<Box<dyn LlmTool>>,
    temperature: f32,
    max_tool_hops: usize,
}

impl ChatSessionBuilder {
    fn new(broker: LlmBroker) -> Self {
        Self {
            broker,
            system_prompt: "You are a helpful assistant.".to_string(),
            tools: Vec::new(),
            temperature: 1.0,
            max_tool_hops: 1,
        }
    }

    /// Set the system prompt (default: "You are a helpful assistant.")
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Set the tools available to the LLM
    pub fn tools(mut self, tools: Vec<Box<dyn LlmTool>>) -> Self {
        self.tools = tools;
        self
    }

    /// Set the temperature for generation (default: 1.0)
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the tool-call hop budget per turn (default: 1)
    pub fn max_tool_hops(mut self, max_tool_hops: usize) -> Self {
        self.max_tool_hops = max_tool_hops;
        self
    }

    /// Build the chat session
    pub fn build(self) -> ChatSession {
        ChatSession {
            broker: self.broker,
            transcript: Vec::new(),
            history: vec![LlmMessage::system(&self.system_prompt)],
            tools: self.tools,
            temperature: self.temperature,
            max_tool_hops: self.max_tool_hops,
        }
    }
}
