use thiserror::Error;

use labtrace_core::error::ErrorKind;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("store error: {0}")]
    Store(String),
}

impl SchemaError {
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<sqlx::Error> for SchemaError {
    fn from(e: sqlx::Error) -> Self {
        SchemaError::Store(e.to_string())
    }
}

impl From<SchemaError> for ErrorKind {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::Store(msg) => ErrorKind::Store(msg),
        }
    }
}
