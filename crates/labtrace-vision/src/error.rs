use thiserror::Error;

use labtrace_core::error::ErrorKind;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider api error ({status}) from {provider}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited { provider: String, retry_after_ms: u64 },

    #[error("provider {provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    #[error("payload of {size} bytes exceeds {provider}'s {limit}-byte limit")]
    TooLarge {
        provider: String,
        size: usize,
        limit: usize,
    },

    #[error("{provider} returned output that did not conform to the requested schema: {reason}")]
    SchemaViolation { provider: String, reason: String },
}

impl VisionError {
    /// Whether this error belongs to the retryable class (rate limit,
    /// overload, 5xx, specific network codes) per §4.5's fallback policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VisionError::Http(_)
                | VisionError::RateLimited { .. }
                | VisionError::Unavailable { .. }
                | VisionError::Api { status: 500..=599, .. }
        )
    }

    pub fn provider_name(&self) -> Option<&str> {
        match self {
            VisionError::Api { provider, .. }
            | VisionError::RateLimited { provider, .. }
            | VisionError::Unavailable { provider, .. }
            | VisionError::TooLarge { provider, .. }
            | VisionError::SchemaViolation { provider, .. } => Some(provider),
            VisionError::Http(_) => None,
        }
    }
}

impl From<VisionError> for ErrorKind {
    fn from(e: VisionError) -> Self {
        match e {
            VisionError::TooLarge { .. } => ErrorKind::Validation(e.to_string()),
            VisionError::SchemaViolation { .. } => ErrorKind::ProviderRefusal(e.to_string()),
            other if other.is_retryable() => ErrorKind::ProviderTransient(other.to_string()),
            other => ErrorKind::ProviderRefusal(other.to_string()),
        }
    }
}
