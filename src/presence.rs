//! Who else is looking at this game.
//!
//! Presence is advisory display data (the "2 viewers" badge), never an input
//! to synchronization decisions. Registration hands back a guard whose drop
//! deregisters, so a panicking or shutting-down task can not leak a count.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::watch;

use crate::{ident::GameId, sync::Role};

/// Refresh cadence for backends that expire stale records. A backend that
/// needs it runs the interval itself inside `register`; [`MemoryPresence`]
/// never expires and runs no loop.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 15;

/// Connected-client counts for one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceCounts {
    /// Connected control surfaces.
    pub controllers: usize,
    /// Connected display surfaces.
    pub viewers: usize,
}

impl PresenceCounts {
    /// Every connected client.
    pub fn total(&self) -> usize {
        self.controllers + self.viewers
    }
}

/// Advisory registry of connected clients per game.
///
/// Keep-alive is an implementation concern: a remote backend that expires
/// stale records refreshes them on [`HEARTBEAT_INTERVAL_SECS`] from its own
/// task, owned by the guard it returns.
pub trait Presence: Send + Sync {
    /// Register a client; dropping the guard deregisters it.
    fn register(&self, game: GameId, role: Role) -> PresenceGuard;

    /// Current counts for a game.
    fn counts(&self, game: &GameId) -> PresenceCounts;

    /// Watch a game's counts as they change.
    fn watch(&self, game: &GameId) -> watch::Receiver<PresenceCounts>;
}

/// Registration handle; deregisters on drop.
pub struct PresenceGuard {
    slot: Arc<Slot>,
    role: Role,
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        self.slot.adjust(self.role, -1);
    }
}

struct Slot {
    counts: Mutex<PresenceCounts>,
    tx: watch::Sender<PresenceCounts>,
}

impl Slot {
    fn new() -> Self {
        let (tx, _) = watch::channel(PresenceCounts::default());
        Self {
            counts: Mutex::new(PresenceCounts::default()),
            tx,
        }
    }

    fn adjust(&self, role: Role, delta: isize) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let slot = match role {
            Role::Controller => &mut counts.controllers,
            Role::Viewer => &mut counts.viewers,
        };
        *slot = slot.saturating_add_signed(delta);
        let _ = self.tx.send(*counts);
    }
}

/// Process-local [`Presence`] registry.
#[derive(Default)]
pub struct MemoryPresence {
    slots: DashMap<GameId, Arc<Slot>>,
}

impl MemoryPresence {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, game: &GameId) -> Arc<Slot> {
        self.slots
            .entry(game.clone())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone()
    }
}

impl Presence for MemoryPresence {
    fn register(&self, game: GameId, role: Role) -> PresenceGuard {
        let slot = self.slot(&game);
        slot.adjust(role, 1);
        PresenceGuard { slot, role }
    }

    fn counts(&self, game: &GameId) -> PresenceCounts {
        *self
            .slot(game)
            .counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn watch(&self, game: &GameId) -> watch::Receiver<PresenceCounts> {
        self.slot(game).tx.subscribe()
    }
}
