pub mod error;
pub mod llm;
pub mod media;
pub mod pdf;
pub mod prayer;
pub mod vision;

pub use error::{MoriatiError, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{MoriatiError, Result};
    pub use crate::llm::gateways::GeminiGateway;
    pub use crate::llm::tools::{FunctionDescriptor, LlmTool, PrayerTimesTool, ToolDescriptor};
    pub use crate::llm::{
        ChatMessage, ChatRole, ChatSession, CompletionConfig, LlmBroker, LlmGateway, LlmMessage,
        MessageRole,
    };
    pub use crate::media::UploadedImage;
    pub use crate::prayer::{PrayerTimes, PrayerTimesClient, PrayerTimesResult};
    pub use crate::vision::ImageAnalyzer;
}
