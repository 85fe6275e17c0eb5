use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    alarm::{AlarmEvent, AlarmScheduler},
    dao::models::GameStateDoc,
    engine::{Tick, TimerEngine, parse_timer_text},
    state::phase::GamePhase,
};

/// The per-element visibility toggles, control surface and display surface
/// each getting their own switch.
pub const VISIBILITY_KEYS: [&str; 12] = [
    "showPeriodControl",
    "showPeriodView",
    "showTimerControl",
    "showTimerView",
    "showScoresControl",
    "showScoresView",
    "showTeamLogosControl",
    "showTeamLogosView",
    "showTeamNamesControl",
    "showTeamNamesView",
    "showLeagueControl",
    "showLeagueView",
];

/// Visibility map with every element shown.
pub fn default_visibility() -> IndexMap<String, bool> {
    VISIBILITY_KEYS
        .iter()
        .map(|key| ((*key).to_string(), true))
        .collect()
}

/// Display theme shared across clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    /// Light palette.
    Light,
    /// Dark palette; also what unknown wire values coerce to.
    Dark,
}

impl Serialize for Theme {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        })
    }
}

impl<'de> Deserialize<'de> for Theme {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Unknown values coerce to the dark default rather than failing the
        // whole document.
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "light" => Theme::Light,
            _ => Theme::Dark,
        })
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Dark
    }
}

impl Theme {
    /// The other theme.
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Which side of the scoreboard a team occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    /// Home side.
    A,
    /// Away side.
    B,
}

impl Team {
    /// Parse a user-supplied team selector. Anything unrecognized yields
    /// `None` so callers can treat it as a silent no-op.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a" | "home" => Some(Team::A),
            "b" | "away" => Some(Team::B),
            _ => None,
        }
    }
}

/// One team's scoreboard line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamSide {
    /// Display name.
    pub name: String,
    /// Logo reference; empty when unset.
    pub logo: String,
    /// Goals scored, never negative.
    pub score: u32,
}

impl Default for TeamSide {
    fn default() -> Self {
        Self::home_default()
    }
}

impl TeamSide {
    /// Default home side.
    pub fn home_default() -> Self {
        Self {
            name: "Home Team".into(),
            logo: String::new(),
            score: 0,
        }
    }

    /// Default away side.
    pub fn away_default() -> Self {
        Self {
            name: "Away Team".into(),
            logo: String::new(),
            score: 0,
        }
    }
}

const MIN_PERIOD_MINUTES: u32 = 1;
const MAX_PERIOD_MINUTES: u32 = 99;
const MIN_SYNC_INTERVAL_MS: u64 = 50;
const MAX_SYNC_INTERVAL_MS: u64 = 60_000;

/// Operator-tunable settings shared across clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvancedSettings {
    /// Minutes a freshly reset period starts with.
    pub default_period_minutes: u32,
    /// Whether the minute-boundary beep plays automatically.
    pub auto_minute_horn_enabled: bool,
    /// Interval of the running-timer resync writes, milliseconds.
    pub sync_interval_ms: u64,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            default_period_minutes: 18,
            auto_minute_horn_enabled: true,
            sync_interval_ms: 100,
        }
    }
}

/// Which parts of the session a game reset wipes; everything not selected is
/// preserved in place (team identity, league branding, settings).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetOptions {
    /// Zero both scores.
    pub scores: bool,
    /// Put the default period length back on the clock.
    pub timer: bool,
    /// Return to regulation period 1.
    pub phase: bool,
    /// Restore default team names and clear logos.
    pub teams: bool,
    /// Restore default theme, visibility, and advanced settings.
    pub settings: bool,
}

impl Default for ResetOptions {
    fn default() -> Self {
        Self {
            scores: true,
            timer: true,
            phase: true,
            teams: false,
            settings: false,
        }
    }
}

/// What applying a remote snapshot did to the local timer, for logging and
/// side-effect decisions upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteOutcome {
    /// The local engine transitioned from stopped to running.
    pub timer_started: bool,
    /// The local engine transitioned from running to stopped.
    pub timer_stopped: bool,
    /// `default_period_minutes` changed value.
    pub defaults_changed: bool,
}

/// The owned aggregate of everything one scoreboard process knows about its
/// game: canonical shared fields plus the timer engine and alarm scheduler.
///
/// All mutation goes through explicit methods; there is no ambient module
/// state. Invalid inputs clamp or no-op instead of erroring, so UI bindings
/// can forward user input without pre-validating it.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    engine: TimerEngine,
    alarms: AlarmScheduler,
    phase: GamePhase,
    team_a: TeamSide,
    team_b: TeamSide,
    league_name: String,
    league_logo: String,
    theme: Theme,
    visibility: IndexMap<String, bool>,
    advanced: AdvancedSettings,
}

impl Default for GameSession {
    fn default() -> Self {
        let advanced = AdvancedSettings::default();
        Self {
            engine: TimerEngine::new(advanced.default_period_minutes * 60),
            alarms: AlarmScheduler::new(),
            phase: GamePhase::default(),
            team_a: TeamSide::home_default(),
            team_b: TeamSide::away_default(),
            league_name: "House League".into(),
            league_logo: String::new(),
            theme: Theme::default(),
            visibility: default_visibility(),
            advanced,
        }
    }
}

impl GameSession {
    /// Fresh session with default state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The countdown engine (read-only; mutate through session methods).
    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    /// Current game phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// One team's line.
    pub fn team(&self, team: Team) -> &TeamSide {
        match team {
            Team::A => &self.team_a,
            Team::B => &self.team_b,
        }
    }

    /// League branding line.
    pub fn league_name(&self) -> &str {
        &self.league_name
    }

    /// League logo reference.
    pub fn league_logo(&self) -> &str {
        &self.league_logo
    }

    /// Current theme.
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Visibility toggles.
    pub fn visibility(&self) -> &IndexMap<String, bool> {
        &self.visibility
    }

    /// Shared settings.
    pub fn advanced(&self) -> &AdvancedSettings {
        &self.advanced
    }

    // --- timer -------------------------------------------------------------

    /// Start the countdown; re-arms the alarms on success.
    pub fn start_timer(&mut self, now_ms: i64) -> bool {
        let started = self.engine.start(now_ms);
        if started {
            self.alarms.arm();
        }
        started
    }

    /// Stop the countdown at its exact current value.
    pub fn stop_timer(&mut self, now_ms: i64) {
        self.engine.stop(now_ms);
    }

    /// Stop and put the default period length back on the clock.
    pub fn reset_timer(&mut self) {
        self.engine.reset(self.advanced.default_period_minutes * 60);
        self.alarms.arm();
    }

    /// Apply free-text clock input. Editing while running stops the timer
    /// first; returns the seconds value that ended up on the clock.
    pub fn set_timer_text(&mut self, text: &str, now_ms: i64) -> u32 {
        self.engine.stop(now_ms);
        let seconds = parse_timer_text(text);
        self.engine.reset(seconds);
        self.alarms.arm();
        seconds
    }

    /// One recompute pass: advance the engine and ask the alarm scheduler
    /// whether anything should sound. Minute beeps honor the auto-horn
    /// setting (the boundary is still recorded so toggling the setting never
    /// replays old boundaries).
    pub fn tick(&mut self, now_ms: i64) -> (Tick, Option<AlarmEvent>) {
        let tick = self.engine.tick(now_ms);
        let alarm = match tick {
            Tick::Running(remaining) => self
                .alarms
                .observe(remaining, true)
                .filter(|_| self.advanced.auto_minute_horn_enabled),
            Tick::Expired => self.alarms.observe(0, false),
            Tick::Idle => None,
        };
        (tick, alarm)
    }

    // --- scores / phase ----------------------------------------------------

    /// Adjust a team's score; clamps at zero.
    pub fn add_score(&mut self, team: Team, delta: i32) {
        let side = match team {
            Team::A => &mut self.team_a,
            Team::B => &mut self.team_b,
        };
        side.score = (i64::from(side.score) + i64::from(delta)).max(0) as u32;
    }

    /// Adjust the period number (regulation only, clamped).
    pub fn change_period(&mut self, delta: i32) {
        self.phase.change_period(delta);
    }

    /// Advance to the next game stage.
    pub fn advance_phase(&mut self) {
        self.phase.advance();
    }

    /// Return to regulation period 1.
    pub fn reset_phase(&mut self) {
        self.phase.reset();
    }

    // --- branding / settings -----------------------------------------------

    /// Rename a team; blank input is ignored.
    pub fn set_team_name(&mut self, team: Team, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        match team {
            Team::A => self.team_a.name = name.to_string(),
            Team::B => self.team_b.name = name.to_string(),
        }
    }

    /// Replace a team's logo reference (empty clears it).
    pub fn set_team_logo(&mut self, team: Team, logo: String) {
        match team {
            Team::A => self.team_a.logo = logo,
            Team::B => self.team_b.logo = logo,
        }
    }

    /// Rename the league; blank input is ignored.
    pub fn set_league_name(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.league_name = name.to_string();
        }
    }

    /// Replace the league logo reference.
    pub fn set_league_logo(&mut self, logo: String) {
        self.league_logo = logo;
    }

    /// Set the theme.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Flip the theme, returning the new value.
    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    /// Set one visibility toggle; unknown keys are ignored.
    pub fn set_visibility(&mut self, key: &str, shown: bool) {
        match self.visibility.get_mut(key) {
            Some(slot) => *slot = shown,
            None => debug!(key, "ignoring unknown visibility toggle"),
        }
    }

    /// Change the default period length, minutes in `[1, 99]`; out-of-range
    /// values are silently ignored. When the timer is idle the displayed
    /// value is recomputed from the new default.
    pub fn set_default_period_minutes(&mut self, minutes: u32) {
        if !(MIN_PERIOD_MINUTES..=MAX_PERIOD_MINUTES).contains(&minutes) {
            debug!(minutes, "ignoring out-of-range period length");
            return;
        }
        if self.advanced.default_period_minutes == minutes {
            return;
        }
        self.advanced.default_period_minutes = minutes;
        if !self.engine.is_running() {
            self.engine.reset(minutes * 60);
            self.alarms.arm();
        }
    }

    /// Toggle the automatic minute beep.
    pub fn set_auto_minute_horn(&mut self, enabled: bool) {
        self.advanced.auto_minute_horn_enabled = enabled;
    }

    /// Change the resync interval, clamped to a sane range; out-of-range
    /// values are silently ignored.
    pub fn set_sync_interval_ms(&mut self, interval_ms: u64) {
        if (MIN_SYNC_INTERVAL_MS..=MAX_SYNC_INTERVAL_MS).contains(&interval_ms) {
            self.advanced.sync_interval_ms = interval_ms;
        } else {
            debug!(interval_ms, "ignoring out-of-range sync interval");
        }
    }

    /// Overwrite selected parts of the session in place, preserving the rest.
    pub fn reset_with(&mut self, options: ResetOptions) {
        if options.scores {
            self.team_a.score = 0;
            self.team_b.score = 0;
        }
        if options.phase {
            self.phase.reset();
        }
        if options.teams {
            let scores = (self.team_a.score, self.team_b.score);
            self.team_a = TeamSide::home_default();
            self.team_b = TeamSide::away_default();
            self.team_a.score = scores.0;
            self.team_b.score = scores.1;
        }
        if options.settings {
            self.theme = Theme::default();
            self.visibility = default_visibility();
            self.advanced = AdvancedSettings::default();
        }
        if options.timer {
            self.reset_timer();
        }
    }

    // --- document conversion -----------------------------------------------

    /// Serialize the session into the wire document, stamped with the given
    /// correlation token. The server-timestamp field is left as the sentinel
    /// for the store to fill.
    pub fn snapshot_doc(&self, origin: Uuid) -> GameStateDoc {
        let anchor = self.engine.anchor();
        GameStateDoc {
            timer_seconds: self.engine.remaining(),
            timer_running: self.engine.is_running(),
            timer_started_at_ms: anchor.map(|(at, _)| at),
            timer_initial_seconds: anchor.map(|(_, initial)| initial),
            period: self.phase.period().unwrap_or(1),
            game_phase: self.phase.wire_code().into(),
            team_a: self.team_a.clone(),
            team_b: self.team_b.clone(),
            league_name: self.league_name.clone(),
            league_logo: self.league_logo.clone(),
            theme: self.theme,
            visibility: self.visibility.clone(),
            advanced: self.advanced.clone(),
            origin: Some(origin),
            last_update: None,
        }
    }

    /// Reconcile a received snapshot into the session. Remote values are
    /// authoritative on receipt.
    ///
    /// The engine is only started or stopped when the remote running flag
    /// actually differs from the local one; while both sides run, the remote
    /// anchor pair is adopted (correcting clock skew) without restarting. An
    /// echo of this process's own write is applied idempotently and never
    /// triggers an engine transition or re-arms the alarms.
    pub fn apply_remote(
        &mut self,
        doc: &GameStateDoc,
        echo: bool,
        now_ms: i64,
    ) -> RemoteOutcome {
        let mut outcome = RemoteOutcome::default();

        self.phase = GamePhase::from_wire(&doc.game_phase, doc.period);
        self.team_a = doc.team_a.clone();
        self.team_b = doc.team_b.clone();
        self.league_name = doc.league_name.clone();
        self.league_logo = doc.league_logo.clone();
        self.theme = doc.theme;

        // Overlay known toggles on a complete default map so older documents
        // missing a key still render every element.
        let mut visibility = default_visibility();
        for (key, shown) in &doc.visibility {
            if let Some(slot) = visibility.get_mut(key.as_str()) {
                *slot = *shown;
            }
        }
        self.visibility = visibility;

        if !echo {
            let locally_running = self.engine.is_running();
            match (doc.timer_running, locally_running) {
                (true, false) => {
                    self.engine
                        .adopt_running(doc.anchor(), doc.timer_seconds, now_ms);
                    self.alarms.arm();
                    outcome.timer_started = true;
                }
                (false, true) => {
                    self.engine.adopt_stopped(doc.timer_seconds);
                    outcome.timer_stopped = true;
                }
                (true, true) => {
                    // Refresh the anchor without a start/stop transition.
                    self.engine
                        .adopt_running(doc.anchor(), doc.timer_seconds, now_ms);
                }
                (false, false) => {
                    // Zero is a real value here, never "missing".
                    self.engine.adopt_stopped(doc.timer_seconds);
                }
            }
        }

        let defaults_changed =
            self.advanced.default_period_minutes != doc.advanced.default_period_minutes;
        outcome.defaults_changed = defaults_changed;
        self.advanced.auto_minute_horn_enabled = doc.advanced.auto_minute_horn_enabled;
        self.set_sync_interval_ms(doc.advanced.sync_interval_ms);
        if defaults_changed {
            // Settings-driven idle reset: recompute the displayed value from
            // the new default, but never touch a running countdown.
            self.set_default_period_minutes(doc.advanced.default_period_minutes);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_never_go_negative() {
        let mut session = GameSession::new();
        session.add_score(Team::A, -1);
        assert_eq!(session.team(Team::A).score, 0);

        session.add_score(Team::A, 3);
        session.add_score(Team::A, -100);
        assert_eq!(session.team(Team::A).score, 0);
    }

    #[test]
    fn unknown_team_selector_parses_to_none() {
        assert_eq!(Team::parse("a"), Some(Team::A));
        assert_eq!(Team::parse("AWAY"), Some(Team::B));
        assert_eq!(Team::parse("c"), None);
        assert_eq!(Team::parse(""), None);
    }

    #[test]
    fn out_of_range_settings_are_ignored() {
        let mut session = GameSession::new();
        session.set_default_period_minutes(0);
        session.set_default_period_minutes(100);
        assert_eq!(session.advanced().default_period_minutes, 18);

        session.set_sync_interval_ms(10);
        session.set_sync_interval_ms(600_000);
        assert_eq!(session.advanced().sync_interval_ms, 100);
    }

    #[test]
    fn changing_default_minutes_resets_idle_display_only() {
        let mut session = GameSession::new();
        session.set_default_period_minutes(20);
        assert_eq!(session.engine().remaining(), 20 * 60);

        session.start_timer(0);
        session.set_default_period_minutes(15);
        assert!(session.engine().is_running());
        assert_eq!(session.engine().anchor().unwrap().1, 20 * 60);
    }

    #[test]
    fn timer_edit_while_running_stops_first() {
        let mut session = GameSession::new();
        session.start_timer(0);
        let seconds = session.set_timer_text("5:30", 10_000);
        assert_eq!(seconds, 330);
        assert!(!session.engine().is_running());
        assert_eq!(session.engine().remaining(), 330);
    }

    #[test]
    fn minute_beep_honors_auto_horn_setting() {
        let mut session = GameSession::new();
        session.set_auto_minute_horn(false);
        session.set_timer_text("2:01", 0);
        session.start_timer(0);

        let (_, alarm) = session.tick(1_000);
        assert_eq!(alarm, None);

        // The boundary was recorded even though nothing sounded.
        session.set_auto_minute_horn(true);
        let (_, alarm) = session.tick(1_500);
        assert_eq!(alarm, None);
    }

    #[test]
    fn expiry_produces_period_end_alarm() {
        let mut session = GameSession::new();
        session.set_timer_text("0:02", 0);
        session.start_timer(0);

        let (tick, alarm) = session.tick(2_000);
        assert_eq!(tick, Tick::Expired);
        assert_eq!(alarm, Some(AlarmEvent::PeriodEnd));

        let (tick, alarm) = session.tick(3_000);
        assert_eq!(tick, Tick::Idle);
        assert_eq!(alarm, None);
    }

    #[test]
    fn reset_preserves_unselected_fields() {
        let mut session = GameSession::new();
        session.set_team_name(Team::A, "Sharks");
        session.set_league_name("City League");
        session.add_score(Team::A, 4);
        session.advance_phase();

        session.reset_with(ResetOptions::default());
        assert_eq!(session.team(Team::A).score, 0);
        assert_eq!(session.phase(), GamePhase::Regulation(1));
        // Identity and branding survive a default reset.
        assert_eq!(session.team(Team::A).name, "Sharks");
        assert_eq!(session.league_name(), "City League");
    }

    #[test]
    fn snapshot_doc_carries_anchor_and_token() {
        let mut session = GameSession::new();
        session.start_timer(5_000);
        let origin = Uuid::new_v4();
        let doc = session.snapshot_doc(origin);

        assert!(doc.timer_running);
        assert_eq!(doc.anchor(), Some((5_000, 18 * 60)));
        assert_eq!(doc.origin, Some(origin));
        assert_eq!(doc.last_update, None);
    }

    #[test]
    fn foreign_snapshot_starts_timer_from_anchor() {
        let mut session = GameSession::new();
        let mut remote = GameStateDoc::default();
        remote.timer_running = true;
        remote.timer_seconds = 1200;
        remote.timer_started_at_ms = Some(0);
        remote.timer_initial_seconds = Some(1200);

        let outcome = session.apply_remote(&remote, false, 60_000);
        assert!(outcome.timer_started);
        assert_eq!(session.engine().remaining(), 1140);
    }

    #[test]
    fn echo_never_transitions_the_engine() {
        let mut session = GameSession::new();
        session.start_timer(0);
        let doc = session.snapshot_doc(Uuid::new_v4());

        let outcome = session.apply_remote(&doc, true, 1_000);
        assert!(!outcome.timer_started && !outcome.timer_stopped);
        assert!(session.engine().is_running());
        assert_eq!(session.engine().anchor(), Some((0, 18 * 60)));
    }

    #[test]
    fn remote_zero_seconds_is_applied() {
        let mut session = GameSession::new();
        let mut remote = GameStateDoc::default();
        remote.timer_seconds = 0;
        remote.timer_running = false;

        session.apply_remote(&remote, false, 0);
        assert_eq!(session.engine().remaining(), 0);
    }

    #[test]
    fn remote_default_minutes_change_resets_idle_clock() {
        let mut session = GameSession::new();
        let mut remote = GameStateDoc::default();
        remote.advanced.default_period_minutes = 12;
        remote.timer_seconds = 18 * 60;

        session.apply_remote(&remote, false, 0);
        assert_eq!(session.engine().remaining(), 12 * 60);
    }
}
