//! Store-agnostic abstraction over the remote scoreboard document store.

use std::error::Error;

use futures::{future::BoxFuture, stream::BoxStream};
use thiserror::Error;

use crate::{dao::models::GameStateDoc, ident::GameId};

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not complete the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failed operation.
        message: String,
        /// Backend-specific cause.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// One document delivery from a store subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEnvelope {
    /// Whether the document exists server-side. A missing document is not an
    /// error; it means no state has been written for this game yet.
    pub exists: bool,
    /// The decoded document, when it exists.
    pub doc: Option<GameStateDoc>,
}

/// Stream of snapshot deliveries for one subscribed game.
pub type SnapshotStream = BoxStream<'static, SnapshotEnvelope>;

/// Abstraction over the shared per-game scoreboard document.
///
/// Writes replace the whole document (last-write-wins at document
/// granularity); subscriptions deliver the current snapshot immediately and
/// then fan out every subsequent write. Implementations substitute their own
/// clock for the server-timestamp sentinel (`last_update == None`) at write
/// time.
pub trait BoardStore: Send + Sync {
    /// Replace the game's shared document.
    fn write_state(&self, game: GameId, doc: GameStateDoc)
    -> BoxFuture<'static, StorageResult<()>>;

    /// Fetch the game's shared document once.
    fn load_state(&self, game: GameId) -> BoxFuture<'static, StorageResult<Option<GameStateDoc>>>;

    /// Subscribe to snapshot deliveries for the game.
    fn subscribe(&self, game: GameId) -> BoxFuture<'static, StorageResult<SnapshotStream>>;

    /// Read the friendly display name stored for the game, if any.
    fn read_name(&self, game: GameId) -> BoxFuture<'static, StorageResult<Option<String>>>;

    /// Store the friendly display name for the game.
    fn write_name(&self, game: GameId, name: String) -> BoxFuture<'static, StorageResult<()>>;

    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
