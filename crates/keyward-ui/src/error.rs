use keyward_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UiError {
    #[error("element not found: {0}")]
    MissingElement(String),
    #[error("{0} dialog is already open")]
    DialogBusy(&'static str),
    #[error(transparent)]
    Core(#[from] CoreError),
}
