//! Process-local store backend.
//!
//! Backs tests and offline operation. Behaves like the remote store at the
//! seam: writes stamp the server timestamp, subscriptions replay the current
//! snapshot immediately and then fan out every later write.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tracing::trace;

use crate::{
    clock::Clock,
    dao::{
        models::GameStateDoc,
        store::{BoardStore, SnapshotEnvelope, SnapshotStream, StorageResult},
    },
    ident::GameId,
};

const FANOUT_CAPACITY: usize = 64;

/// In-memory [`BoardStore`] keyed by game id.
#[derive(Clone)]
pub struct MemoryStore {
    docs: Arc<DashMap<GameId, GameStateDoc>>,
    names: Arc<DashMap<GameId, String>>,
    hubs: Arc<DashMap<GameId, broadcast::Sender<SnapshotEnvelope>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Empty store stamping writes with the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            docs: Arc::new(DashMap::new()),
            names: Arc::new(DashMap::new()),
            hubs: Arc::new(DashMap::new()),
            clock,
        }
    }

    fn hub(&self, game: &GameId) -> broadcast::Sender<SnapshotEnvelope> {
        self.hubs
            .entry(game.clone())
            .or_insert_with(|| broadcast::channel(FANOUT_CAPACITY).0)
            .clone()
    }
}

impl BoardStore for MemoryStore {
    fn write_state(
        &self,
        game: GameId,
        mut doc: GameStateDoc,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            doc.last_update = Some(store.clock.now_ms());
            store.docs.insert(game.clone(), doc.clone());
            let delivered = store
                .hub(&game)
                .send(SnapshotEnvelope {
                    exists: true,
                    doc: Some(doc),
                })
                .unwrap_or(0);
            trace!(game = %game, subscribers = delivered, "memory store write");
            Ok(())
        })
    }

    fn load_state(&self, game: GameId) -> BoxFuture<'static, StorageResult<Option<GameStateDoc>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.docs.get(&game).map(|entry| entry.clone())) })
    }

    fn subscribe(&self, game: GameId) -> BoxFuture<'static, StorageResult<SnapshotStream>> {
        let store = self.clone();
        Box::pin(async move {
            let mut rx = store.hub(&game).subscribe();
            let initial = match store.docs.get(&game) {
                Some(entry) => SnapshotEnvelope {
                    exists: true,
                    doc: Some(entry.clone()),
                },
                None => SnapshotEnvelope {
                    exists: false,
                    doc: None,
                },
            };

            let stream = async_stream::stream! {
                yield initial;
                loop {
                    match rx.recv().await {
                        Ok(envelope) => yield envelope,
                        // A lagged subscriber only needs the latest snapshot,
                        // which the next delivery carries anyway.
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };

            Ok(Box::pin(stream) as SnapshotStream)
        })
    }

    fn read_name(&self, game: GameId) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.names.get(&game).map(|entry| entry.clone())) })
    }

    fn write_name(&self, game: GameId, name: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.names.insert(game, name);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::clock::ManualClock;

    fn store_at(now_ms: i64) -> MemoryStore {
        MemoryStore::new(Arc::new(ManualClock::at(now_ms)))
    }

    #[tokio::test]
    async fn subscription_replays_current_snapshot_first() {
        let store = store_at(1_000);
        let game = GameId::sanitize("main").unwrap();

        let mut doc = GameStateDoc::default();
        doc.timer_seconds = 42;
        store.write_state(game.clone(), doc).await.unwrap();

        let mut stream = store.subscribe(game).await.unwrap();
        let first = stream.next().await.unwrap();
        assert!(first.exists);
        assert_eq!(first.doc.unwrap().timer_seconds, 42);
    }

    #[tokio::test]
    async fn missing_document_is_delivered_as_absent() {
        let store = store_at(0);
        let game = GameId::sanitize("empty").unwrap();

        let mut stream = store.subscribe(game).await.unwrap();
        let first = stream.next().await.unwrap();
        assert!(!first.exists);
        assert_eq!(first.doc, None);
    }

    #[tokio::test]
    async fn writes_fan_out_to_every_subscriber() {
        let store = store_at(5_000);
        let game = GameId::sanitize("main").unwrap();

        let mut a = store.subscribe(game.clone()).await.unwrap();
        let mut b = store.subscribe(game.clone()).await.unwrap();
        assert!(!a.next().await.unwrap().exists);
        assert!(!b.next().await.unwrap().exists);

        store
            .write_state(game, GameStateDoc::default())
            .await
            .unwrap();

        for stream in [&mut a, &mut b] {
            let envelope = stream.next().await.unwrap();
            let doc = envelope.doc.unwrap();
            assert_eq!(doc.last_update, Some(5_000));
        }
    }

    #[tokio::test]
    async fn games_are_isolated() {
        let store = store_at(0);
        let rink_a = GameId::sanitize("rink-a").unwrap();
        let rink_b = GameId::sanitize("rink-b").unwrap();

        store
            .write_state(rink_a.clone(), GameStateDoc::default())
            .await
            .unwrap();

        assert!(store.load_state(rink_a).await.unwrap().is_some());
        assert!(store.load_state(rink_b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn names_round_trip() {
        let store = store_at(0);
        let game = GameId::sanitize("game-abc123").unwrap();

        assert_eq!(store.read_name(game.clone()).await.unwrap(), None);
        store
            .write_name(game.clone(), "Friday Night".into())
            .await
            .unwrap();
        assert_eq!(
            store.read_name(game).await.unwrap().as_deref(),
            Some("Friday Night")
        );
    }
}
