pub mod gemini;
pub mod gemini_messages_adapter;

pub use gemini::{GeminiConfig, GeminiGateway};
