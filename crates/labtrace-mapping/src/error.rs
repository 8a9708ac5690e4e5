use thiserror::Error;

use labtrace_core::error::ErrorKind;
use labtrace_llm::ProviderError;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("llm provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("llm proposal did not match expected shape: {0}")]
    MalformedProposal(String),

    #[error("analyte {0} not found")]
    AnalyteNotFound(labtrace_core::types::AnalyteId),

    #[error("pending analyte {0} not found")]
    PendingAnalyteNotFound(labtrace_core::types::PendingAnalyteId),

    #[error("match review {0} not found")]
    MatchReviewNotFound(labtrace_core::types::MatchReviewId),

    #[error("match review {0} is not in pending state")]
    MatchReviewNotPending(labtrace_core::types::MatchReviewId),
}

impl MappingError {
    pub fn code(&self) -> &'static str {
        match self {
            MappingError::Db(_) => "STORE_ERROR",
            MappingError::Provider(_) => "PROVIDER_REFUSAL",
            MappingError::MalformedProposal(_) => "VALIDATION",
            MappingError::AnalyteNotFound(_)
            | MappingError::PendingAnalyteNotFound(_)
            | MappingError::MatchReviewNotFound(_) => "NOT_FOUND",
            MappingError::MatchReviewNotPending(_) => "CONFLICT",
        }
    }
}

impl From<MappingError> for ErrorKind {
    fn from(e: MappingError) -> Self {
        match &e {
            MappingError::Db(_) => ErrorKind::Store(e.to_string()),
            MappingError::Provider(inner) => {
                if inner.is_retryable() {
                    ErrorKind::ProviderTransient(e.to_string())
                } else {
                    ErrorKind::ProviderRefusal(e.to_string())
                }
            }
            MappingError::MalformedProposal(_) => ErrorKind::Validation(e.to_string()),
            MappingError::AnalyteNotFound(_)
            | MappingError::PendingAnalyteNotFound(_)
            | MappingError::MatchReviewNotFound(_) => ErrorKind::NotFound(e.to_string()),
            MappingError::MatchReviewNotPending(_) => ErrorKind::Conflict(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, MappingError>;
