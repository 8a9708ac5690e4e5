use thiserror::Error;

use labtrace_core::error::ErrorKind;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("session not found")]
    SessionNotFound,

    #[error("patient not found")]
    PatientNotFound,

    #[error("session is busy processing another message")]
    Busy,

    #[error("selected patient is no longer available")]
    PatientUnavailable,

    #[error("iteration limit exceeded")]
    IterationLimitExceeded,

    #[error("agent error: {0}")]
    Agent(#[from] labtrace_agent::AgentError),

    #[error("llm provider error: {0}")]
    Provider(#[from] labtrace_llm::ProviderError),

    #[error("schema error: {0}")]
    Schema(#[from] labtrace_schema::SchemaError),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::SessionNotFound | ChatError::PatientNotFound => "NOT_FOUND",
            ChatError::Busy => "BUSY",
            ChatError::PatientUnavailable => "PATIENT_UNAVAILABLE",
            ChatError::IterationLimitExceeded => "ITERATION_LIMIT_EXCEEDED",
            ChatError::Agent(e) => e.code(),
            ChatError::Provider(_) => "PROVIDER_REFUSAL",
            ChatError::Schema(_) => "INTERNAL_ERROR",
            ChatError::Db(_) => "STORE_ERROR",
        }
    }
}

impl From<ChatError> for ErrorKind {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::SessionNotFound | ChatError::PatientNotFound => ErrorKind::NotFound(e.to_string()),
            ChatError::Busy => ErrorKind::Conflict(e.to_string()),
            ChatError::PatientUnavailable => ErrorKind::Gone(e.to_string()),
            ChatError::IterationLimitExceeded => ErrorKind::Validation(e.to_string()),
            ChatError::Agent(inner) => ErrorKind::from(inner),
            ChatError::Provider(inner) => {
                if inner.is_retryable() {
                    ErrorKind::ProviderTransient(inner.to_string())
                } else {
                    ErrorKind::ProviderRefusal(inner.to_string())
                }
            }
            ChatError::Schema(inner) => ErrorKind::Internal(inner.to_string()),
            ChatError::Db(inner) => ErrorKind::Store(inner.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
