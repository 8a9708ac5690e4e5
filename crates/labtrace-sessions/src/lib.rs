pub mod error;
pub mod manager;
pub mod types;

pub use error::SessionError;
pub use manager::{OnExpireHook, SessionManager};
pub use types::{ChatMessage, ChatRole, OnboardingContext, Session, ToolCallRequest};
