//! Wire shape of the shared scoreboard document.
//!
//! This is the single place where the loosely-typed remote payload is decoded
//! and defaulted; the rest of the crate only ever sees the typed document.
//! Unknown fields are ignored, missing fields take their documented defaults,
//! and a zero `timerSeconds` is a real value, never defaulted away.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{AdvancedSettings, TeamSide, Theme, default_visibility};

/// Flat, JSON-serializable snapshot of one game's shared state.
///
/// Field names follow the historical document shape (camelCase), so documents
/// written by older clients decode cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameStateDoc {
    /// Seconds left in the current period.
    pub timer_seconds: u32,
    /// Whether the countdown is running.
    pub timer_running: bool,
    /// Wall-clock instant the countdown started (anchor, epoch ms).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_started_at_ms: Option<i64>,
    /// Seconds on the clock when the countdown started (anchor).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_initial_seconds: Option<u32>,
    /// Regulation period number; meaningful only while `gamePhase == "REG"`.
    pub period: u8,
    /// Phase wire code: `REG`, `OT`, or `SO`. Unknown codes coerce to `REG`.
    pub game_phase: String,
    /// Home side.
    pub team_a: TeamSide,
    /// Away side.
    pub team_b: TeamSide,
    /// League branding line.
    pub league_name: String,
    /// League logo reference (URL or data reference; empty when unset).
    pub league_logo: String,
    /// Display theme.
    pub theme: Theme,
    /// Per-element visibility toggles, keyed by element name.
    pub visibility: IndexMap<String, bool>,
    /// Operator-tunable settings shared across clients.
    pub advanced: AdvancedSettings,
    /// Correlation token of the writer that produced this snapshot; lets a
    /// process recognize echoes of its own writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Uuid>,
    /// Server-assigned write timestamp (epoch ms). Writers send `None` as the
    /// sentinel and the store substitutes its clock; opaque to the core and
    /// never used in timer math.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<i64>,
}

impl Default for GameStateDoc {
    fn default() -> Self {
        let advanced = AdvancedSettings::default();
        Self {
            timer_seconds: advanced.default_period_minutes * 60,
            timer_running: false,
            timer_started_at_ms: None,
            timer_initial_seconds: None,
            period: 1,
            game_phase: "REG".into(),
            team_a: TeamSide::home_default(),
            team_b: TeamSide::away_default(),
            league_name: "House League".into(),
            league_logo: String::new(),
            theme: Theme::default(),
            visibility: default_visibility(),
            advanced,
            origin: None,
            last_update: None,
        }
    }
}

impl GameStateDoc {
    /// The anchor pair, when both halves are present.
    pub fn anchor(&self) -> Option<(i64, u32)> {
        self.timer_started_at_ms.zip(self.timer_initial_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_decodes_to_defaults() {
        let doc: GameStateDoc = serde_json::from_str("{}").unwrap();
        assert_eq!(doc, GameStateDoc::default());
        assert_eq!(doc.timer_seconds, 18 * 60);
        assert_eq!(doc.period, 1);
        assert_eq!(doc.game_phase, "REG");
        assert_eq!(doc.visibility.len(), 12);
    }

    #[test]
    fn zero_timer_seconds_survives_decoding() {
        let doc: GameStateDoc = serde_json::from_str(r#"{"timerSeconds":0}"#).unwrap();
        assert_eq!(doc.timer_seconds, 0);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let doc: GameStateDoc =
            serde_json::from_str(r#"{"timerSeconds":90,"somethingNew":{"nested":true}}"#).unwrap();
        assert_eq!(doc.timer_seconds, 90);
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(GameStateDoc::default()).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("timerSeconds"));
        assert!(object.contains_key("gamePhase"));
        assert!(object.contains_key("teamA"));
        assert!(object.contains_key("leagueName"));
        // Sentinel fields are absent, not null.
        assert!(!object.contains_key("lastUpdate"));
        assert!(!object.contains_key("timerStartedAtMs"));
    }

    #[test]
    fn document_round_trips() {
        let mut doc = GameStateDoc::default();
        doc.timer_seconds = 0;
        doc.timer_running = true;
        doc.timer_started_at_ms = Some(1_700_000_000_000);
        doc.timer_initial_seconds = Some(300);
        doc.origin = Some(Uuid::new_v4());

        let json = serde_json::to_string(&doc).unwrap();
        let back: GameStateDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
