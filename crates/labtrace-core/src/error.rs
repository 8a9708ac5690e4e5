use thiserror::Error;

/// Top-level error taxonomy (§7). Per-crate errors (`IngestError`,
/// `MappingError`, `SessionError`, ...) convert into this at the gateway
/// boundary so every transport (SSE event, tool-result JSON, job record)
/// surfaces the same shape.
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("gone: {0}")]
    Gone(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("scope violation: {0}")]
    ScopeViolation(String),

    #[error("provider transient error: {0}")]
    ProviderTransient(String),

    #[error("provider refused or truncated: {0}")]
    ProviderRefusal(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("iteration ceiling exceeded: {0}")]
    IterationCeiling(String),

    #[error("session expired mid-turn: {0}")]
    SessionExpired(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// Short machine-readable code, used as the `error.code` SSE field and
    /// as the `code` key of a tool-result error JSON object.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation(_) => "VALIDATION",
            ErrorKind::NotFound(_) => "NOT_FOUND",
            ErrorKind::Gone(_) => "GONE",
            ErrorKind::Conflict(_) => "CONFLICT",
            ErrorKind::ScopeViolation(_) => "SCOPE_VIOLATION",
            ErrorKind::ProviderTransient(_) => "PROVIDER_TRANSIENT",
            ErrorKind::ProviderRefusal(_) => "PROVIDER_REFUSAL",
            ErrorKind::Store(_) => "STORE_ERROR",
            ErrorKind::IterationCeiling(_) => "ITERATION_LIMIT_EXCEEDED",
            ErrorKind::SessionExpired(_) => "SESSION_EXPIRED",
            ErrorKind::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may retry the operation unchanged (used by chat
    /// tool dispatch to decide whether to surface the error back to the LLM
    /// for self-correction vs. terminate the turn).
    pub fn is_retryable_by_caller(&self) -> bool {
        matches!(
            self,
            ErrorKind::Validation(_) | ErrorKind::ScopeViolation(_) | ErrorKind::Conflict(_)
        )
    }
}

impl From<sqlx::Error> for ErrorKind {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => ErrorKind::NotFound("row not found".to_string()),
            other => ErrorKind::Store(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ErrorKind>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorKind::Conflict("x".into()).code(), "CONFLICT");
        assert_eq!(
            ErrorKind::IterationCeiling("x".into()).code(),
            "ITERATION_LIMIT_EXCEEDED"
        );
    }

    #[test]
    fn retryable_classification() {
        assert!(ErrorKind::ScopeViolation("x".into()).is_retryable_by_caller());
        assert!(!ErrorKind::Internal("x".into()).is_retryable_by_caller());
    }
}
