use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to decode blob: {0}")]
    Blob(#[from] base64::DecodeError),
}
