//! Canonical game state: the owned session aggregate and the phase machine.

pub mod phase;
mod session;

pub use self::phase::{GamePhase, REGULATION_PERIODS};
pub use self::session::{
    AdvancedSettings, GameSession, RemoteOutcome, ResetOptions, Team, TeamSide, Theme,
    VISIBILITY_KEYS, default_visibility,
};
