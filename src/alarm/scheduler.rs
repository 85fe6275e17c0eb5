/// Offsets of the three end-of-period horn pulses, in milliseconds from the
/// zero crossing.
pub const END_PULSE_OFFSETS_MS: [u64; 3] = [0, 1500, 3000];

/// An alarm the scheduler decided to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEvent {
    /// The countdown crossed a 60-second boundary with this many seconds left.
    MinuteMark(u32),
    /// The countdown reached zero; fire the three-pulse horn sequence.
    PeriodEnd,
}

/// Decides when alarms fire, with de-duplication across repeated recomputes.
///
/// The engine recomputes many times per second, so the same remaining value is
/// observed over and over. A minute mark fires only when the observed boundary
/// differs from the last one fired, and the end sequence fires once per armed
/// cycle. Both guards are cleared on reset, manual edit, and restart;
/// otherwise restarting exactly on a minute boundary would skip (or re-fire)
/// that boundary's alarm.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmScheduler {
    last_mark: Option<u32>,
    end_fired: bool,
}

impl AlarmScheduler {
    /// Fresh scheduler with no alarm history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the de-duplication state, re-arming every alarm.
    pub fn arm(&mut self) {
        self.last_mark = None;
        self.end_fired = false;
    }

    /// Observe one recomputed remaining value and decide whether to fire.
    pub fn observe(&mut self, remaining: u32, running: bool) -> Option<AlarmEvent> {
        if remaining == 0 {
            if self.end_fired {
                return None;
            }
            self.end_fired = true;
            return Some(AlarmEvent::PeriodEnd);
        }

        if !running {
            return None;
        }

        if remaining % 60 == 0 && self.last_mark != Some(remaining) {
            self.last_mark = Some(remaining);
            return Some(AlarmEvent::MinuteMark(remaining));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_mark_fires_once_per_boundary() {
        let mut alarms = AlarmScheduler::new();
        assert_eq!(alarms.observe(120, true), Some(AlarmEvent::MinuteMark(120)));
        // Same boundary observed again on subsequent recomputes: silent.
        assert_eq!(alarms.observe(120, true), None);
        assert_eq!(alarms.observe(119, true), None);
        assert_eq!(alarms.observe(60, true), Some(AlarmEvent::MinuteMark(60)));
    }

    #[test]
    fn minute_mark_requires_running() {
        let mut alarms = AlarmScheduler::new();
        assert_eq!(alarms.observe(180, false), None);
    }

    #[test]
    fn rearming_lets_the_same_boundary_fire_again() {
        let mut alarms = AlarmScheduler::new();
        assert!(alarms.observe(60, true).is_some());
        assert_eq!(alarms.observe(60, true), None);

        // Timer reset / manual edit / restart re-arms the scheduler.
        alarms.arm();
        assert_eq!(alarms.observe(60, true), Some(AlarmEvent::MinuteMark(60)));
    }

    #[test]
    fn end_sequence_fires_exactly_once_per_cycle() {
        let mut alarms = AlarmScheduler::new();
        assert_eq!(alarms.observe(0, false), Some(AlarmEvent::PeriodEnd));
        // Zero keeps being observed after the engine stopped.
        assert_eq!(alarms.observe(0, false), None);
        assert_eq!(alarms.observe(0, true), None);

        alarms.arm();
        assert_eq!(alarms.observe(0, false), Some(AlarmEvent::PeriodEnd));
    }

    #[test]
    fn zero_is_never_a_minute_mark() {
        let mut alarms = AlarmScheduler::new();
        assert_eq!(alarms.observe(0, true), Some(AlarmEvent::PeriodEnd));
        alarms.arm();
        alarms.end_fired = true;
        assert_eq!(alarms.observe(0, true), None);
    }
}
