//! Top-level client errors.

use thiserror::Error;

use crate::dao::store::StorageError;

/// Errors surfaced to the embedding application.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Storage(#[from] StorageError),
    /// A requested game id contained no usable characters.
    #[error("invalid game id `{0}`")]
    InvalidGameId(String),
}
