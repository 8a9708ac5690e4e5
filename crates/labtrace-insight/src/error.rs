use thiserror::Error;

use labtrace_core::error::ErrorKind;
use labtrace_llm::ProviderError;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("llm provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed insight output: {0}")]
    MalformedInsight(String),

    #[error("no parameter rows found for the given reports")]
    NoData,
}

impl InsightError {
    pub fn code(&self) -> &'static str {
        match self {
            InsightError::Db(_) => "STORE_ERROR",
            InsightError::Provider(_) => "PROVIDER_REFUSAL",
            InsightError::MalformedInsight(_) => "PROVIDER_REFUSAL",
            InsightError::NoData => "VALIDATION",
        }
    }
}

impl From<InsightError> for ErrorKind {
    fn from(e: InsightError) -> Self {
        match &e {
            InsightError::Db(_) => ErrorKind::Store(e.to_string()),
            InsightError::Provider(inner) => {
                if inner.is_retryable() {
                    ErrorKind::ProviderTransient(e.to_string())
                } else {
                    ErrorKind::ProviderRefusal(e.to_string())
                }
            }
            InsightError::MalformedInsight(_) => ErrorKind::ProviderRefusal(e.to_string()),
            InsightError::NoData => ErrorKind::Validation(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, InsightError>;
