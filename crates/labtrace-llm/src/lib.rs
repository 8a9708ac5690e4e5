pub mod anthropic;
pub mod anthropic_stream;
pub mod provider;
pub mod stream;
pub mod structured;

pub use anthropic::AnthropicProvider;
pub use provider::{ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, Role, ToolCall, ToolDefinition};
pub use stream::StreamEvent;
pub use structured::complete_json;
