use sidefx_metadata::IndexError;
use sidefx_types::RequestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SideEffectsError {
    #[error("side effects request failed: {0}")]
    Request(#[from] RequestError),
    #[error(transparent)]
    Index(#[from] IndexError),
}
