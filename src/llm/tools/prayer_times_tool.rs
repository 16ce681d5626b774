use crate::error::Result;
use crate::llm::tools::{FunctionDescriptor, LlmTool, ToolDescriptor};
use crate::prayer::PrayerTimesClient;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

/// Tool that lets the model look up prayer times for a Saudi city.
///
/// Lookup failures are not tool errors: the localized failure message is
/// returned as the tool result so the model can relay it to the user.
#[derive(Debug, Clone)]
pub struct PrayerTimesTool {
    client: PrayerTimesClient,
}

impl PrayerTimesTool {
    /// Create a tool backed by the public schedule provider
    pub fn new() -> Self {
        Self {
            client: PrayerTimesClient::new(),
        }
    }

    /// Create a tool backed by a custom client
    pub fn with_client(client: PrayerTimesClient) -> Self {
        Self { client }
    }
}

impl Default for PrayerTimesTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmTool for PrayerTimesTool {
    async fn run(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let city = args.get("city").and_then(|v| v.as_str()).ok_or_else(|| {
            crate::error::MoriatiError::InvalidArgument("city parameter is required".to_string())
        })?;

        info!(city, "Looking up prayer times for tool call");
        let result = self.client.fetch(city).await;

        Ok(serde_json::to_value(&result)?)
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            r#type: "function".to_string(),
            function: FunctionDescriptor {
                name: "get_prayer_times".to_string(),
                description: "الحصول على أوقات الصلاة لمدينة محددة في المملكة العربية السعودية"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "city": {
                            "type": "string",
                            "description": "المدينة في المملكة العربية السعودية، مثل: الرياض، جدة"
                        }
                    },
                    "required": ["city"]
                }),
            },
        }
    }

    fn clone_box(&self) -> Box<dyn LlmTool> {
        Box::new(self.clone())
    }
}
