use thiserror::Error;

use labtrace_core::error::ErrorKind;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    /// Returned by `tryAcquireLock` on contention — retryable by the caller.
    #[error("session busy: a turn is already in progress")]
    Busy,

    #[error("session expired mid-turn: {0}")]
    Expired(String),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NotFound(_) => "NOT_FOUND",
            SessionError::Busy => "SESSION_BUSY",
            SessionError::Expired(_) => "SESSION_EXPIRED",
        }
    }
}

impl From<SessionError> for ErrorKind {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(id) => ErrorKind::NotFound(format!("session {id}")),
            SessionError::Busy => ErrorKind::Conflict("session busy".to_string()),
            SessionError::Expired(reason) => ErrorKind::SessionExpired(reason),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
