//! The bridge between one process's session and the shared document.
//!
//! Writes stamp a fresh correlation token and remember it; when a snapshot
//! comes back carrying a remembered token it is classified as an echo and
//! applied without engine transitions. Snapshots carrying an unknown or
//! absent token are foreign and reconciled fully.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::StreamExt;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    cache::SnapshotCache,
    clock::Clock,
    dao::store::{BoardStore, SnapshotEnvelope, StorageResult},
    ident::GameId,
    state::GameSession,
    sync::{
        LinkState, Role,
        hub::{BoardEvent, UpdateHub},
    },
};

/// Tokens kept for echo classification. Writes outpacing deliveries by more
/// than this misclassify the oldest echoes as foreign, which reconciliation
/// absorbs.
const PENDING_TOKEN_CAP: usize = 64;

const HUB_CAPACITY: usize = 64;

/// Owns the store subscription and write path for one game.
pub struct SyncBridge {
    game: GameId,
    role: Role,
    store: Arc<dyn BoardStore>,
    clock: Arc<dyn Clock>,
    session: Arc<RwLock<GameSession>>,
    pending: Mutex<VecDeque<Uuid>>,
    link_tx: watch::Sender<LinkState>,
    hub: UpdateHub,
    cache: Option<Arc<SnapshotCache>>,
}

impl SyncBridge {
    /// Bridge for one game with a fresh default session.
    pub fn new(game: GameId, role: Role, store: Arc<dyn BoardStore>, clock: Arc<dyn Clock>) -> Self {
        let (link_tx, _) = watch::channel(LinkState::Disconnected);
        Self {
            game,
            role,
            store,
            clock,
            session: Arc::new(RwLock::new(GameSession::new())),
            pending: Mutex::new(VecDeque::new()),
            link_tx,
            hub: UpdateHub::new(HUB_CAPACITY),
            cache: None,
        }
    }

    /// Persist every applied snapshot to the given local cache.
    pub fn with_cache(mut self, cache: Arc<SnapshotCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The game this bridge is bound to.
    pub fn game(&self) -> &GameId {
        &self.game
    }

    /// This process's role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Shared handle to the session this bridge reconciles into.
    pub fn session(&self) -> Arc<RwLock<GameSession>> {
        Arc::clone(&self.session)
    }

    /// Subscribe to local board events.
    pub fn events(&self) -> tokio::sync::broadcast::Receiver<BoardEvent> {
        self.hub.subscribe()
    }

    /// Fan an event out to local subscribers.
    pub fn announce(&self, event: BoardEvent) {
        self.hub.broadcast(event);
    }

    /// Watch the store link state.
    pub fn link(&self) -> watch::Receiver<LinkState> {
        self.link_tx.subscribe()
    }

    fn set_link(&self, state: LinkState) {
        if *self.link_tx.borrow() != state {
            self.link_tx.send_replace(state);
            self.hub.broadcast(BoardEvent::Link(state));
        }
    }

    /// Publish the current session to the store, stamped with a fresh
    /// correlation token. Viewers never write; their call is a no-op.
    pub async fn push(&self) -> StorageResult<()> {
        if self.role == Role::Viewer {
            return Ok(());
        }

        let origin = Uuid::new_v4();
        let doc = self.session.read().await.snapshot_doc(origin);
        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.push_back(origin);
            while pending.len() > PENDING_TOKEN_CAP {
                pending.pop_front();
            }
        }

        match self.store.write_state(self.game.clone(), doc).await {
            Ok(()) => Ok(()),
            Err(error) => {
                // Drop the token; no echo is coming back for a failed write.
                self.forget_token(origin);
                warn!(game = %self.game, %error, "state write failed");
                Err(error)
            }
        }
    }

    /// Read the friendly display name shared alongside the game document.
    pub async fn read_friendly_name(&self) -> StorageResult<Option<String>> {
        self.store.read_name(self.game.clone()).await
    }

    /// Store the friendly display name. Viewers never write; their call is a
    /// no-op.
    pub async fn write_friendly_name(&self, name: String) -> StorageResult<()> {
        if self.role == Role::Viewer {
            return Ok(());
        }
        self.store.write_name(self.game.clone(), name).await
    }

    fn forget_token(&self, origin: Uuid) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|token| *token != origin);
    }

    /// Echo classification: a token is recognized at most once.
    fn take_echo(&self, origin: Option<Uuid>) -> bool {
        let Some(origin) = origin else { return false };
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        match pending.iter().position(|token| *token == origin) {
            Some(idx) => {
                pending.remove(idx);
                true
            }
            None => false,
        }
    }

    async fn apply_envelope(&self, envelope: SnapshotEnvelope) -> StorageResult<()> {
        let Some(doc) = envelope.doc else {
            // No shared state yet. The controller seeds the document so
            // viewers have something to converge on; viewers keep waiting.
            if self.role == Role::Controller {
                info!(game = %self.game, "no shared document, seeding defaults");
                self.push().await?;
            } else {
                debug!(game = %self.game, "no shared document yet, waiting");
            }
            return Ok(());
        };

        let echo = self.take_echo(doc.origin);
        if !echo && *self.link_tx.borrow() == LinkState::Synced {
            self.set_link(LinkState::Reconciling);
        }
        let now_ms = self.clock.now_ms();
        let outcome = self.session.write().await.apply_remote(&doc, echo, now_ms);

        if let Some(cache) = &self.cache {
            let mut cached = doc.clone();
            cached.origin = None;
            cache.store(&self.game, &cached, now_ms);
        }

        if outcome.timer_started || outcome.timer_stopped {
            debug!(
                game = %self.game,
                started = outcome.timer_started,
                stopped = outcome.timer_stopped,
                "remote timer transition"
            );
        }

        self.set_link(LinkState::Synced);
        self.hub.broadcast(BoardEvent::StateChanged);
        Ok(())
    }

    /// Subscription pump: apply every delivered snapshot until the stream
    /// ends. Returns so the caller can re-subscribe with its own backoff.
    pub async fn run(&self) -> StorageResult<()> {
        self.set_link(LinkState::Subscribing);
        let mut stream = self.store.subscribe(self.game.clone()).await?;
        info!(game = %self.game, role = ?self.role, "subscribed to shared document");

        while let Some(envelope) = stream.next().await {
            self.apply_envelope(envelope).await?;
        }

        warn!(game = %self.game, "snapshot stream ended");
        self.set_link(LinkState::Disconnected);
        Ok(())
    }

    /// Periodic resync writes while the timer runs, so joiners converge even
    /// if a regular write was lost. Controller only; never fires while the
    /// timer is stopped.
    pub async fn run_resync(&self) {
        if self.role == Role::Viewer {
            return;
        }
        loop {
            let (running, interval_ms) = {
                let session = self.session.read().await;
                (
                    session.engine().is_running(),
                    session.advanced().sync_interval_ms,
                )
            };
            if running {
                if let Err(error) = self.push().await {
                    warn!(game = %self.game, %error, "resync write failed");
                }
            }
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, dao::memory::MemoryStore, dao::models::GameStateDoc};

    fn bridge(role: Role, clock: Arc<ManualClock>, store: Arc<MemoryStore>) -> SyncBridge {
        SyncBridge::new(GameId::sanitize("main").unwrap(), role, store, clock)
    }

    fn shared() -> (Arc<ManualClock>, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::at(0));
        let store = Arc::new(MemoryStore::new(clock.clone() as Arc<dyn Clock>));
        (clock, store)
    }

    #[tokio::test]
    async fn echo_of_own_write_does_not_restart_timer() {
        let (clock, store) = shared();
        let bridge = bridge(Role::Controller, clock.clone(), store.clone());

        bridge.session().write().await.start_timer(clock.now_ms());
        bridge.push().await.unwrap();

        // Simulate the store delivering the write back later.
        clock.advance(5_000);
        let doc = store
            .load_state(bridge.game().clone())
            .await
            .unwrap()
            .unwrap();
        let echo = bridge.take_echo(doc.origin);
        assert!(echo);

        let session = bridge.session();
        let mut guard = session.write().await;
        let before = guard.engine().anchor();
        guard.apply_remote(&doc, echo, clock.now_ms());
        assert_eq!(guard.engine().anchor(), before);
        assert!(guard.engine().is_running());
    }

    #[tokio::test]
    async fn each_token_is_recognized_once() {
        let (clock, store) = shared();
        let bridge = bridge(Role::Controller, clock, store);

        let token = Uuid::new_v4();
        bridge
            .pending
            .lock()
            .unwrap()
            .push_back(token);

        assert!(bridge.take_echo(Some(token)));
        assert!(!bridge.take_echo(Some(token)));
        assert!(!bridge.take_echo(None));
    }

    #[tokio::test]
    async fn controller_seeds_missing_document() {
        let (clock, store) = shared();
        let bridge = bridge(Role::Controller, clock, store.clone());

        bridge
            .apply_envelope(SnapshotEnvelope {
                exists: false,
                doc: None,
            })
            .await
            .unwrap();

        let seeded = store
            .load_state(bridge.game().clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seeded.timer_seconds, 18 * 60);
        assert!(!seeded.timer_running);
    }

    #[tokio::test]
    async fn viewer_never_writes() {
        let (clock, store) = shared();
        let bridge = bridge(Role::Viewer, clock, store.clone());

        bridge
            .apply_envelope(SnapshotEnvelope {
                exists: false,
                doc: None,
            })
            .await
            .unwrap();
        bridge.push().await.unwrap();

        assert!(
            store
                .load_state(bridge.game().clone())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn friendly_name_round_trips_and_viewers_cannot_rename() {
        let (clock, store) = shared();
        let controller = bridge(Role::Controller, clock.clone(), store.clone());
        let viewer = bridge(Role::Viewer, clock, store);

        assert_eq!(controller.read_friendly_name().await.unwrap(), None);

        controller
            .write_friendly_name("Friday Night".to_string())
            .await
            .unwrap();
        viewer
            .write_friendly_name("Hijacked".to_string())
            .await
            .unwrap();

        assert_eq!(
            viewer.read_friendly_name().await.unwrap().as_deref(),
            Some("Friday Night")
        );
    }

    #[tokio::test]
    async fn foreign_snapshot_adopts_running_timer() {
        let (clock, store) = shared();
        let bridge = bridge(Role::Viewer, clock.clone(), store);

        let mut doc = GameStateDoc::default();
        doc.timer_running = true;
        doc.timer_seconds = 1200;
        doc.timer_started_at_ms = Some(0);
        doc.timer_initial_seconds = Some(1200);
        doc.origin = Some(Uuid::new_v4());

        clock.set(60_000);
        bridge
            .apply_envelope(SnapshotEnvelope {
                exists: true,
                doc: Some(doc),
            })
            .await
            .unwrap();

        let session = bridge.session();
        let guard = session.read().await;
        assert!(guard.engine().is_running());
        // One minute elapsed against the anchor.
        assert_eq!(guard.engine().remaining(), 1140);
        assert_eq!(*bridge.link_tx.borrow(), LinkState::Synced);
    }

    #[tokio::test]
    async fn push_and_delivery_round_trip_through_memory_store() {
        let (clock, store) = shared();
        let controller = Arc::new(bridge(Role::Controller, clock.clone(), store.clone()));
        let viewer = Arc::new(bridge(Role::Viewer, clock.clone(), store.clone()));

        {
            let session = controller.session();
            let mut guard = session.write().await;
            guard.add_score(crate::state::Team::A, 2);
            guard.start_timer(clock.now_ms());
        }
        controller.push().await.unwrap();

        let doc = store
            .load_state(viewer.game().clone())
            .await
            .unwrap()
            .unwrap();
        viewer
            .apply_envelope(SnapshotEnvelope {
                exists: true,
                doc: Some(doc),
            })
            .await
            .unwrap();

        let session = viewer.session();
        let guard = session.read().await;
        assert_eq!(guard.team(crate::state::Team::A).score, 2);
        assert!(guard.engine().is_running());
    }
}
