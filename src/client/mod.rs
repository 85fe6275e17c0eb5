//! Ready-made client roles: the controller (read/write) and the viewer
//! (display only), plus the display projection both render from.

mod controller;
mod viewer;

pub use controller::Controller;
pub use viewer::Viewer;

use crate::{
    engine::format_clock,
    state::{GameSession, Team, Theme},
    sync::LinkState,
};

/// Everything a display surface needs to paint one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    /// `MM:SS` clock text.
    pub clock_text: String,
    /// Whether the countdown is running.
    pub running: bool,
    /// Phase label, e.g. `Period 2` or `Overtime`.
    pub phase_label: String,
    /// Home team name.
    pub team_a_name: String,
    /// Away team name.
    pub team_b_name: String,
    /// Home score.
    pub score_a: u32,
    /// Away score.
    pub score_b: u32,
    /// League branding line.
    pub league_name: String,
    /// Display theme.
    pub theme: Theme,
    /// Store link state, for a connectivity badge.
    pub link: LinkState,
}

impl DisplayState {
    /// Project a session into its rendered form.
    pub fn project(session: &GameSession, link: LinkState) -> Self {
        Self {
            clock_text: format_clock(session.engine().remaining()),
            running: session.engine().is_running(),
            phase_label: session.phase().label(),
            team_a_name: session.team(Team::A).name.clone(),
            team_b_name: session.team(Team::B).name.clone(),
            score_a: session.team(Team::A).score,
            score_b: session.team(Team::B).score,
            league_name: session.league_name().to_string(),
            theme: session.theme(),
            link,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_formats_the_clock() {
        let mut session = GameSession::new();
        session.set_timer_text("7:05", 0);
        session.add_score(Team::B, 2);

        let display = DisplayState::project(&session, LinkState::Synced);
        assert_eq!(display.clock_text, "07:05");
        assert!(!display.running);
        assert_eq!(display.phase_label, "Period 1");
        assert_eq!(display.score_b, 2);
        assert_eq!(display.link, LinkState::Synced);
    }
}
