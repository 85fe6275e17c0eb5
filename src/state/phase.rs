/// Number of periods in regulation play.
pub const REGULATION_PERIODS: u8 = 3;

/// Coarse game stage, orthogonal to the clock.
///
/// Forward-only: regulation periods advance into overtime, overtime into a
/// shootout, and a shootout has no further transition. Only an explicit reset
/// returns to regulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Regulation play in the given period, always within
    /// `[1, REGULATION_PERIODS]`.
    Regulation(u8),
    /// Sudden-death overtime.
    Overtime,
    /// Shootout; terminal.
    Shootout,
}

impl Default for GamePhase {
    fn default() -> Self {
        GamePhase::Regulation(1)
    }
}

impl GamePhase {
    /// Move to the next stage: period+1 within regulation, then overtime,
    /// then shootout. No-op once in a shootout.
    pub fn advance(&mut self) {
        *self = match *self {
            GamePhase::Regulation(p) if p < REGULATION_PERIODS => GamePhase::Regulation(p + 1),
            GamePhase::Regulation(_) => GamePhase::Overtime,
            GamePhase::Overtime => GamePhase::Shootout,
            GamePhase::Shootout => GamePhase::Shootout,
        };
    }

    /// Adjust the period number; only meaningful in regulation, clamped to
    /// `[1, REGULATION_PERIODS]`. Silent no-op in other phases.
    pub fn change_period(&mut self, delta: i32) {
        if let GamePhase::Regulation(p) = *self {
            let next = (i32::from(p) + delta).clamp(1, i32::from(REGULATION_PERIODS));
            *self = GamePhase::Regulation(next as u8);
        }
    }

    /// Force regulation period 1, from any phase.
    pub fn reset(&mut self) {
        *self = GamePhase::Regulation(1);
    }

    /// The period number while in regulation.
    pub fn period(&self) -> Option<u8> {
        match *self {
            GamePhase::Regulation(p) => Some(p),
            _ => None,
        }
    }

    /// Short wire code persisted in the shared document.
    pub fn wire_code(&self) -> &'static str {
        match self {
            GamePhase::Regulation(_) => "REG",
            GamePhase::Overtime => "OT",
            GamePhase::Shootout => "SO",
        }
    }

    /// Rebuild a phase from its wire code plus the separately-stored period
    /// number. Unknown codes and out-of-range periods coerce to valid values.
    pub fn from_wire(code: &str, period: u8) -> Self {
        match code {
            "OT" => GamePhase::Overtime,
            "SO" => GamePhase::Shootout,
            _ => GamePhase::Regulation(period.clamp(1, REGULATION_PERIODS)),
        }
    }

    /// Human-readable label ("Period 2", "Overtime", "Shootout").
    pub fn label(&self) -> String {
        match self {
            GamePhase::Regulation(p) => format!("Period {p}"),
            GamePhase::Overtime => "Overtime".into(),
            GamePhase::Shootout => "Shootout".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_phase_is_regulation_one() {
        assert_eq!(GamePhase::default(), GamePhase::Regulation(1));
    }

    #[test]
    fn advance_walks_the_full_chain() {
        let mut phase = GamePhase::default();
        phase.advance();
        assert_eq!(phase, GamePhase::Regulation(2));
        phase.advance();
        assert_eq!(phase, GamePhase::Regulation(3));
        phase.advance();
        assert_eq!(phase, GamePhase::Overtime);
        phase.advance();
        assert_eq!(phase, GamePhase::Shootout);
        // Shootout is terminal.
        phase.advance();
        assert_eq!(phase, GamePhase::Shootout);
    }

    #[test]
    fn change_period_clamps_and_ignores_other_phases() {
        let mut phase = GamePhase::Regulation(1);
        phase.change_period(-5);
        assert_eq!(phase, GamePhase::Regulation(1));
        phase.change_period(10);
        assert_eq!(phase, GamePhase::Regulation(3));

        let mut overtime = GamePhase::Overtime;
        overtime.change_period(1);
        assert_eq!(overtime, GamePhase::Overtime);
    }

    #[test]
    fn reset_forces_regulation_one() {
        let mut phase = GamePhase::Shootout;
        phase.reset();
        assert_eq!(phase, GamePhase::Regulation(1));
    }

    #[test]
    fn wire_round_trip() {
        for phase in [
            GamePhase::Regulation(2),
            GamePhase::Overtime,
            GamePhase::Shootout,
        ] {
            let rebuilt = GamePhase::from_wire(phase.wire_code(), phase.period().unwrap_or(1));
            assert_eq!(rebuilt, phase);
        }
        // Unknown code coerces to regulation with a clamped period.
        assert_eq!(GamePhase::from_wire("??", 9), GamePhase::Regulation(3));
        assert_eq!(GamePhase::from_wire("REG", 0), GamePhase::Regulation(1));
    }
}
