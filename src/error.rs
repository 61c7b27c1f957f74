use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("external collaborator error: {0}")]
    External(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Error::NotFound(entity.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn external(message: impl Into<String>) -> Self {
        Error::External(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
