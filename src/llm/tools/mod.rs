pub mod prayer_times_tool;
pub mod tool;

pub use prayer_times_tool::PrayerTimesTool;
pub use tool::{FunctionDescriptor, LlmTool, ToolDescriptor};
