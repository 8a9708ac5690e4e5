use thiserror::Error;

use labtrace_core::error::ErrorKind;
use labtrace_vision::FallbackError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported mime type: {0}")]
    UnsupportedMime(String),

    #[error("file too large: {size} bytes exceeds {limit}-byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("pdf has {pages} pages, exceeds {limit}-page limit")]
    TooManyPages { pages: usize, limit: usize },

    #[error("failed to read pdf structure: {0}")]
    MalformedPdf(String),

    #[error("rasterization failed: {0}")]
    Rasterize(String),

    #[error("vision provider failed: {0}")]
    Vision(#[from] FallbackError),

    #[error("store error: {0}")]
    Store(String),
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::UnsupportedMime(_)
            | IngestError::TooLarge { .. }
            | IngestError::TooManyPages { .. } => "VALIDATION",
            IngestError::MalformedPdf(_) => "VALIDATION",
            IngestError::Rasterize(_) => "INTERNAL_ERROR",
            IngestError::Vision(_) => "PROVIDER_REFUSAL",
            IngestError::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(e: sqlx::Error) -> Self {
        IngestError::Store(e.to_string())
    }
}

impl From<IngestError> for ErrorKind {
    fn from(e: IngestError) -> Self {
        match &e {
            IngestError::UnsupportedMime(_)
            | IngestError::TooLarge { .. }
            | IngestError::TooManyPages { .. }
            | IngestError::MalformedPdf(_) => ErrorKind::Validation(e.to_string()),
            IngestError::Rasterize(_) => ErrorKind::Internal(e.to_string()),
            IngestError::Vision(_) => ErrorKind::ProviderRefusal(e.to_string()),
            IngestError::Store(_) => ErrorKind::Store(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
