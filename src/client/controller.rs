//! The control surface: owns the session, drives the tick loop, plays the
//! alarms, and pushes every local change to the store.

use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval, sleep},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    alarm::{AlarmEvent, AudioSink, SoundBank, spawn_end_sequence},
    cache::SnapshotCache,
    clock::Clock,
    dao::store::BoardStore,
    engine::Tick,
    ident::GameId,
    presence::{Presence, PresenceGuard},
    state::{GameSession, ResetOptions, Team, Theme},
    sync::{BoardEvent, Role, SyncBridge},
};

const RECONNECT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(10);

/// A connected controller. Dropping it (or calling [`shutdown`]) stops its
/// background tasks.
///
/// [`shutdown`]: Controller::shutdown
pub struct Controller {
    bridge: Arc<SyncBridge>,
    clock: Arc<dyn Clock>,
    cache: Arc<SnapshotCache>,
    tasks: Vec<JoinHandle<()>>,
    _presence: PresenceGuard,
}

impl Controller {
    /// Join a game as its controller: prime the session from the local
    /// cache, then spawn the subscription pump, the tick loop, and the
    /// running-timer resync loop.
    #[allow(clippy::too_many_arguments)]
    pub async fn connect(
        game: GameId,
        store: Arc<dyn BoardStore>,
        clock: Arc<dyn Clock>,
        presence: &dyn Presence,
        cache: Arc<SnapshotCache>,
        sink: Arc<dyn AudioSink>,
        sounds: SoundBank,
        tick_interval_ms: u64,
    ) -> Self {
        let bridge = Arc::new(
            SyncBridge::new(game.clone(), Role::Controller, store, Arc::clone(&clock))
                .with_cache(Arc::clone(&cache)),
        );

        if let Some(cached) = cache.load(&game, clock.now_ms()) {
            info!(game = %game, "priming session from local cache");
            bridge
                .session()
                .write()
                .await
                .apply_remote(&cached, false, clock.now_ms());
        }

        let guard = presence.register(game, Role::Controller);

        let mut tasks = vec![spawn_pump(Arc::clone(&bridge))];
        tasks.push(spawn_tick_loop(
            Arc::clone(&bridge),
            Arc::clone(&clock),
            sink,
            sounds,
            tick_interval_ms,
        ));
        let resync_bridge = Arc::clone(&bridge);
        tasks.push(tokio::spawn(async move {
            resync_bridge.run_resync().await;
        }));

        Self {
            bridge,
            clock,
            cache,
            tasks,
            _presence: guard,
        }
    }

    /// The bridge this controller drives, for event and link subscriptions.
    pub fn bridge(&self) -> &Arc<SyncBridge> {
        &self.bridge
    }

    /// Run one mutation against the session, then publish and cache the
    /// result. The publish is fire-and-forget; the local session is already
    /// authoritative for this process.
    async fn mutate(&self, apply: impl FnOnce(&mut GameSession, i64)) {
        let now_ms = self.clock.now_ms();
        let doc = {
            let session = self.bridge.session();
            let mut guard = session.write().await;
            apply(&mut guard, now_ms);

            let mut doc = guard.snapshot_doc(Uuid::new_v4());
            doc.origin = None;
            doc
        };
        // File I/O happens after the lock drops so a slow disk cannot stall
        // the tick and reconcile paths.
        self.cache.store(self.bridge.game(), &doc, now_ms);
        self.bridge.announce(BoardEvent::StateChanged);

        let bridge = Arc::clone(&self.bridge);
        tokio::spawn(async move {
            let _ = bridge.push().await;
        });
    }

    /// Publish the current session and wait for the write to finish. The
    /// fire-and-forget action methods cover normal operation; this exists
    /// for orderly shutdown and tests.
    pub async fn sync_now(&self) -> crate::dao::store::StorageResult<()> {
        self.bridge.push().await
    }

    /// Start the countdown.
    pub async fn start_timer(&self) {
        self.mutate(|session, now| {
            session.start_timer(now);
        })
        .await;
    }

    /// Stop the countdown.
    pub async fn stop_timer(&self) {
        self.mutate(|session, now| session.stop_timer(now)).await;
    }

    /// Put the default period length back on the clock.
    pub async fn reset_timer(&self) {
        self.mutate(|session, _| session.reset_timer()).await;
    }

    /// Apply free-text clock input.
    pub async fn set_timer_text(&self, text: &str) {
        self.mutate(|session, now| {
            session.set_timer_text(text, now);
        })
        .await;
    }

    /// Adjust a team's score.
    pub async fn add_score(&self, team: Team, delta: i32) {
        self.mutate(|session, _| session.add_score(team, delta))
            .await;
    }

    /// Adjust the regulation period number.
    pub async fn change_period(&self, delta: i32) {
        self.mutate(|session, _| session.change_period(delta)).await;
    }

    /// Advance to the next game stage.
    pub async fn advance_phase(&self) {
        self.mutate(|session, _| session.advance_phase()).await;
    }

    /// Rename a team.
    pub async fn set_team_name(&self, team: Team, name: String) {
        self.mutate(move |session, _| session.set_team_name(team, &name))
            .await;
    }

    /// Rename the league.
    pub async fn set_league_name(&self, name: String) {
        self.mutate(move |session, _| session.set_league_name(&name))
            .await;
    }

    /// Flip the theme.
    pub async fn toggle_theme(&self) -> Theme {
        let mut theme = Theme::Dark;
        self.mutate(|session, _| theme = session.toggle_theme())
            .await;
        theme
    }

    /// Set one visibility toggle.
    pub async fn set_visibility(&self, key: String, shown: bool) {
        self.mutate(move |session, _| session.set_visibility(&key, shown))
            .await;
    }

    /// Change the default period length.
    pub async fn set_default_period_minutes(&self, minutes: u32) {
        self.mutate(move |session, _| session.set_default_period_minutes(minutes))
            .await;
    }

    /// Toggle the automatic minute beep.
    pub async fn set_auto_minute_horn(&self, enabled: bool) {
        self.mutate(move |session, _| session.set_auto_minute_horn(enabled))
            .await;
    }

    /// Reset the game.
    pub async fn reset_game(&self, options: ResetOptions) {
        self.mutate(move |session, _| session.reset_with(options))
            .await;
    }

    /// Stop the background tasks.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Keep the subscription alive, re-subscribing with exponential backoff.
fn spawn_pump(bridge: Arc<SyncBridge>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut delay = RECONNECT_INITIAL_DELAY;
        loop {
            match bridge.run().await {
                Ok(()) => delay = RECONNECT_INITIAL_DELAY,
                Err(error) => {
                    warn!(game = %bridge.game(), %error, "subscription failed; retrying");
                }
            }
            sleep(delay).await;
            delay = (delay * 2).min(RECONNECT_MAX_DELAY);
        }
    })
}

/// The recompute loop: advance the engine, sound alarms, and publish the
/// zero crossing so viewers converge on the stopped state.
fn spawn_tick_loop(
    bridge: Arc<SyncBridge>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn AudioSink>,
    sounds: SoundBank,
    tick_interval_ms: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;

            let (tick, alarm) = {
                let session = bridge.session();
                let mut guard = session.write().await;
                guard.tick(clock.now_ms())
            };

            if let Some(event) = alarm {
                bridge.announce(BoardEvent::Alarm(event));
                match event {
                    AlarmEvent::MinuteMark(_) => {
                        let beep = sounds.minute_beep();
                        let sink = Arc::clone(&sink);
                        tokio::spawn(async move {
                            if let Err(error) = beep.play(sink).await {
                                warn!(%error, "minute beep failed");
                            }
                        });
                    }
                    AlarmEvent::PeriodEnd => {
                        spawn_end_sequence(&sounds, Arc::clone(&sink));
                    }
                }
            }

            match tick {
                Tick::Running(_) => bridge.announce(BoardEvent::StateChanged),
                Tick::Expired => {
                    bridge.announce(BoardEvent::StateChanged);
                    let _ = bridge.push().await;
                }
                Tick::Idle => {}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        alarm::NullSink,
        clock::ManualClock,
        dao::{memory::MemoryStore, store::BoardStore},
        presence::MemoryPresence,
    };
    use tempfile::TempDir;

    async fn controller(
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
        cache_dir: &TempDir,
    ) -> Controller {
        Controller::connect(
            GameId::sanitize("main").unwrap(),
            store,
            clock,
            &MemoryPresence::new(),
            Arc::new(SnapshotCache::new(cache_dir.path())),
            Arc::new(NullSink),
            SoundBank::synthesized(),
            100,
        )
        .await
    }

    #[tokio::test]
    async fn actions_mutate_the_session_and_publish() {
        let clock = Arc::new(ManualClock::at(0));
        let store = Arc::new(MemoryStore::new(clock.clone() as Arc<dyn Clock>));
        let dir = TempDir::new().unwrap();
        let controller = controller(clock.clone(), store.clone(), &dir).await;

        controller.add_score(Team::A, 1).await;
        controller.start_timer().await;
        controller.sync_now().await.unwrap();

        let doc = store
            .load_state(GameId::sanitize("main").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.team_a.score, 1);
        assert!(doc.timer_running);
    }

    #[tokio::test]
    async fn session_is_cached_after_each_action() {
        let clock = Arc::new(ManualClock::at(0));
        let store = Arc::new(MemoryStore::new(clock.clone() as Arc<dyn Clock>));
        let dir = TempDir::new().unwrap();
        let cache = SnapshotCache::new(dir.path());
        let controller = controller(clock.clone(), store, &dir).await;

        controller.add_score(Team::B, 3).await;

        let cached = cache
            .load(&GameId::sanitize("main").unwrap(), clock.now_ms())
            .unwrap();
        assert_eq!(cached.team_b.score, 3);
        assert_eq!(cached.origin, None);
    }

    #[tokio::test]
    async fn next_launch_primes_from_cache() {
        let clock = Arc::new(ManualClock::at(0));
        let store = Arc::new(MemoryStore::new(clock.clone() as Arc<dyn Clock>));
        let dir = TempDir::new().unwrap();

        {
            let first = controller(clock.clone(), store.clone(), &dir).await;
            first.add_score(Team::A, 5).await;
        }

        let second = controller(clock.clone(), store, &dir).await;
        let session = second.bridge().session();
        assert_eq!(session.read().await.team(Team::A).score, 5);
    }
}
