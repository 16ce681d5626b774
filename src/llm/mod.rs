pub mod broker;
pub mod chat_session;
pub mod gateway;
pub mod gateways;
pub mod models;
pub mod tools;

pub use broker::LlmBroker;
pub use chat_session::{ChatMessage, ChatRole, ChatSession};
pub use gateway::{CompletionConfig, LlmGateway, StreamChunk};
pub use models::{InlineImage, LlmGatewayResponse, LlmMessage, LlmToolCall, MessageRole};
pub use tools::{FunctionDescriptor, LlmTool, ToolDescriptor};
