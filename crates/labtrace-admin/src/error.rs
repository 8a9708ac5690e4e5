use thiserror::Error;

use labtrace_core::error::ErrorKind;
use labtrace_mapping::MappingError;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("permission denied: {0}")]
    Denied(String),

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl AdminError {
    pub fn code(&self) -> &'static str {
        match self {
            AdminError::Denied(_) => "SCOPE_VIOLATION",
            AdminError::Mapping(_) => "STORE_ERROR",
            AdminError::Db(_) => "STORE_ERROR",
        }
    }
}

impl From<AdminError> for ErrorKind {
    fn from(e: AdminError) -> Self {
        match e {
            AdminError::Denied(reason) => ErrorKind::ScopeViolation(reason),
            AdminError::Mapping(inner) => ErrorKind::from(inner),
            AdminError::Db(inner) => ErrorKind::from(inner),
        }
    }
}

pub type Result<T> = std::result::Result<T, AdminError>;
