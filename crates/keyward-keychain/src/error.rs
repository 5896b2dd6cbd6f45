use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("failed to parse private key: {0}")]
    Parse(String),
    #[error("failed to decrypt private key: {0}")]
    Decrypt(String),
    #[error("agent: {0}")]
    Agent(String),
    #[error("key not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Backend,
    Parse,
}

impl KeychainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeychainError::InvalidName(_) => ErrorKind::Validation,
            KeychainError::Parse(_) => ErrorKind::Parse,
            KeychainError::Decrypt(_)
            | KeychainError::Agent(_)
            | KeychainError::NotFound
            | KeychainError::Storage(_)
            | KeychainError::Io(_) => ErrorKind::Backend,
        }
    }
}
