pub mod anthropic;
pub mod error;
pub mod fallback;
pub mod openai;
pub mod provider;
pub mod retry;

pub use anthropic::AnthropicVision;
pub use error::VisionError;
pub use fallback::{FallbackError, FallbackProvider, OnSwitch};
pub use openai::OpenAiVision;
pub use provider::{VisionInput, VisionProvider};
