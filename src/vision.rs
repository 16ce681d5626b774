//! Single-shot image analysis through the LLM broker.

use crate::llm::broker::LlmBroker;
use crate::llm::models::{InlineImage, LlmMessage};
use crate::media::UploadedImage;
use tracing::warn;

/// The analysis instruction the application offers by default.
pub const DEFAULT_ANALYSIS_PROMPT: &str = "حلل هذه الصورة بالتفصيل واشرح محتواها.";

const ANALYSIS_FAILED: &str = "حدث خطأ أثناء تحليل الصورة: ";

/// Analyzes images with a vision-capable model.
///
/// Analysis never returns an error to the caller: a missing credential, a
/// transport failure, or a provider error all become a localized message
/// embedding the failure description.
pub struct ImageAnalyzer {
    broker: LlmBroker,
}

impl ImageAnalyzer {
    /// Create an analyzer on top of a broker
    pub fn new(broker: LlmBroker) -> Self {
        Self { broker }
    }

    /// Analyze a base64-encoded image with a free-text instruction.
    ///
    /// Returns the model's reply, or a localized failure message.
    pub async fn analyze(&self, image_base64: &str, mime_type: &str, prompt: &str) -> String {
        let message = LlmMessage::user(prompt).with_images(vec![InlineImage {
            mime_type: mime_type.to_string(),
            data: image_base64.to_string(),
        }]);

        match self.broker.generate(&[message], None, None).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Image analysis failed: {}", e);
                format!("{}{}", ANALYSIS_FAILED, e)
            }
        }
    }

    /// Analyze an uploaded image, encoding its bytes for transport.
    pub async fn analyze_upload(&self, image: &UploadedImage, prompt: &str) -> String {
        self.analyze(&image.to_base64(), &image.mime_type, prompt).await
    }
}
