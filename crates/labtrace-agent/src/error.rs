use thiserror::Error;

use labtrace_core::error::ErrorKind;
use labtrace_llm::ProviderError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("scope violation: {0}")]
    ScopeViolation(String),

    #[error("sql validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("llm provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("tool loop exceeded {0} iterations without a final response")]
    IterationLimitExceeded(usize),

    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl AgentError {
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::ScopeViolation(_) => "SCOPE_VIOLATION",
            AgentError::Validation(_) | AgentError::UnknownTool(_) => "VALIDATION",
            AgentError::Db(_) => "STORE_ERROR",
            AgentError::Provider(_) => "PROVIDER_REFUSAL",
            AgentError::IterationLimitExceeded(_) => "ITERATION_LIMIT_EXCEEDED",
        }
    }
}

impl From<AgentError> for ErrorKind {
    fn from(e: AgentError) -> Self {
        match &e {
            AgentError::ScopeViolation(_) => ErrorKind::ScopeViolation(e.to_string()),
            AgentError::Validation(_) | AgentError::UnknownTool(_) => ErrorKind::Validation(e.to_string()),
            AgentError::Db(_) => ErrorKind::Store(e.to_string()),
            AgentError::Provider(inner) => {
                if inner.is_retryable() {
                    ErrorKind::ProviderTransient(e.to_string())
                } else {
                    ErrorKind::ProviderRefusal(e.to_string())
                }
            }
            AgentError::IterationLimitExceeded(_) => ErrorKind::Validation(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
