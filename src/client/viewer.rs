//! The display surface: subscribes, interpolates the running clock between
//! snapshot deliveries, and never writes the shared document.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{MissedTickBehavior, interval, sleep},
};
use tracing::{info, warn};

use crate::{
    cache::SnapshotCache,
    clock::Clock,
    client::DisplayState,
    dao::store::BoardStore,
    ident::GameId,
    presence::{Presence, PresenceGuard},
    sync::{Role, SyncBridge},
};

const RECONNECT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(10);

/// A connected viewer. Dropping it stops its background tasks.
pub struct Viewer {
    bridge: Arc<SyncBridge>,
    display_rx: watch::Receiver<DisplayState>,
    tasks: Vec<JoinHandle<()>>,
    _presence: PresenceGuard,
}

impl Viewer {
    /// Join a game as a read-only display.
    pub async fn connect(
        game: GameId,
        store: Arc<dyn BoardStore>,
        clock: Arc<dyn Clock>,
        presence: &dyn Presence,
        cache: Arc<SnapshotCache>,
        tick_interval_ms: u64,
    ) -> Self {
        let bridge = Arc::new(
            SyncBridge::new(game.clone(), Role::Viewer, store, Arc::clone(&clock))
                .with_cache(Arc::clone(&cache)),
        );

        if let Some(cached) = cache.load(&game, clock.now_ms()) {
            info!(game = %game, "priming display from local cache");
            bridge
                .session()
                .write()
                .await
                .apply_remote(&cached, false, clock.now_ms());
        }

        let guard = presence.register(game, Role::Viewer);

        let initial = {
            let session = bridge.session();
            let state = *bridge.link().borrow();
            let guard = session.read().await;
            DisplayState::project(&guard, state)
        };
        let (display_tx, display_rx) = watch::channel(initial);

        let pump_bridge = Arc::clone(&bridge);
        let pump = tokio::spawn(async move {
            let mut delay = RECONNECT_INITIAL_DELAY;
            loop {
                match pump_bridge.run().await {
                    Ok(()) => delay = RECONNECT_INITIAL_DELAY,
                    Err(error) => {
                        warn!(game = %pump_bridge.game(), %error, "subscription failed; retrying");
                    }
                }
                sleep(delay).await;
                delay = (delay * 2).min(RECONNECT_MAX_DELAY);
            }
        });

        let tasks = vec![
            pump,
            spawn_display_loop(
                Arc::clone(&bridge),
                Arc::clone(&clock),
                display_tx,
                tick_interval_ms,
            ),
        ];

        Self {
            bridge,
            display_rx,
            tasks,
            _presence: guard,
        }
    }

    /// The bridge this viewer reads from.
    pub fn bridge(&self) -> &Arc<SyncBridge> {
        &self.bridge
    }

    /// Watch the rendered display state.
    pub fn display(&self) -> watch::Receiver<DisplayState> {
        self.display_rx.clone()
    }

    /// Stop the background tasks.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Interpolate the running clock between snapshot deliveries so the display
/// counts down smoothly instead of jumping on each write.
fn spawn_display_loop(
    bridge: Arc<SyncBridge>,
    clock: Arc<dyn Clock>,
    display_tx: watch::Sender<DisplayState>,
    tick_interval_ms: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut link = bridge.link();
        loop {
            ticker.tick().await;

            let projected = {
                let session = bridge.session();
                let mut guard = session.write().await;
                guard.tick(clock.now_ms());
                DisplayState::project(&guard, *link.borrow_and_update())
            };

            display_tx.send_if_modified(|current| {
                if *current == projected {
                    false
                } else {
                    *current = projected;
                    true
                }
            });
        }
    })
}
