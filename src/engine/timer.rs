use tracing::debug;

/// Largest representable countdown (`99:59`).
pub const MAX_TIMER_SECONDS: u32 = 99 * 60 + 59;

/// Outcome of one recompute pass over the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Timer is not running; nothing to recompute.
    Idle,
    /// Timer is running with this many seconds left.
    Running(u32),
    /// The countdown crossed zero during this pass and the engine stopped
    /// itself. Reported exactly once per countdown.
    Expired,
}

/// Drift-free countdown engine.
///
/// The engine never decrements a counter on a schedule. While running it keeps
/// an anchor pair (the wall-clock instant the countdown started and the
/// seconds that were on the clock at that instant) and every recompute derives
/// the remaining value from the anchor:
///
/// `remaining = max(0, initial - floor((now - started_at) / 1000))`
///
/// A process that is suspended and resumes later therefore jumps straight to
/// the correct value instead of replaying missed ticks, and a client that
/// receives the anchor pair over the wire reconstructs the same countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEngine {
    remaining: u32,
    running: bool,
    started_at_ms: Option<i64>,
    initial_seconds: Option<u32>,
}

impl TimerEngine {
    /// Create a stopped engine showing `remaining` seconds.
    pub fn new(remaining: u32) -> Self {
        Self {
            remaining: remaining.min(MAX_TIMER_SECONDS),
            running: false,
            started_at_ms: None,
            initial_seconds: None,
        }
    }

    /// Seconds currently on the clock (as of the last recompute).
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Whether the countdown is running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The anchor pair, present exactly while the countdown runs.
    pub fn anchor(&self) -> Option<(i64, u32)> {
        self.started_at_ms.zip(self.initial_seconds)
    }

    /// Start the countdown at `now_ms`.
    ///
    /// No-op (returning `false`) when already running or when the clock reads
    /// zero; a finished period has to be reset before it can run again.
    pub fn start(&mut self, now_ms: i64) -> bool {
        if self.running || self.remaining == 0 {
            debug!(
                running = self.running,
                remaining = self.remaining,
                "ignoring start request"
            );
            return false;
        }

        self.started_at_ms = Some(now_ms);
        self.initial_seconds = Some(self.remaining);
        self.running = true;
        true
    }

    /// Recompute the remaining value from the anchor pair.
    ///
    /// Idempotent under repeated polling: the result depends only on `now_ms`
    /// and the anchor, never on how many intermediate calls happened.
    pub fn tick(&mut self, now_ms: i64) -> Tick {
        if !self.running {
            return Tick::Idle;
        }

        self.remaining = self.compute_remaining(now_ms);
        if self.remaining == 0 {
            self.clear_anchor();
            return Tick::Expired;
        }

        Tick::Running(self.remaining)
    }

    /// Stop the countdown, capturing the exact remaining value at `now_ms`.
    pub fn stop(&mut self, now_ms: i64) {
        if !self.running {
            return;
        }

        self.remaining = self.compute_remaining(now_ms);
        self.clear_anchor();
    }

    /// Stop and put `to_seconds` on the clock.
    pub fn reset(&mut self, to_seconds: u32) {
        self.clear_anchor();
        self.remaining = to_seconds.min(MAX_TIMER_SECONDS);
    }

    /// Adopt a running countdown received from a remote writer.
    ///
    /// The remote anchor pair becomes authoritative so this process lands on
    /// the same remaining value as the writer. A payload claiming to run
    /// without an anchor is re-anchored locally at `now_ms`, so the countdown
    /// proceeds from the claimed remaining value instead of being rejected.
    pub fn adopt_running(&mut self, anchor: Option<(i64, u32)>, remaining: u32, now_ms: i64) {
        let (started_at_ms, initial_seconds) =
            anchor.unwrap_or((now_ms, remaining.min(MAX_TIMER_SECONDS)));
        self.started_at_ms = Some(started_at_ms);
        self.initial_seconds = Some(initial_seconds.min(MAX_TIMER_SECONDS));
        self.running = true;
        self.remaining = self.compute_remaining(now_ms);
    }

    /// Adopt a stopped remote value.
    pub fn adopt_stopped(&mut self, remaining: u32) {
        self.clear_anchor();
        self.remaining = remaining.min(MAX_TIMER_SECONDS);
    }

    fn compute_remaining(&self, now_ms: i64) -> u32 {
        let (Some(started_at_ms), Some(initial)) = (self.started_at_ms, self.initial_seconds)
        else {
            return self.remaining;
        };

        let elapsed = (now_ms - started_at_ms).max(0) / 1000;
        initial.saturating_sub(elapsed.min(u32::MAX as i64) as u32)
    }

    fn clear_anchor(&mut self) {
        self.running = false;
        self.started_at_ms = None;
        self.initial_seconds = None;
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_is_anchor_based_and_idempotent() {
        let mut engine = TimerEngine::new(1200);
        assert!(engine.start(0));

        // Many intermediate polls do not change the eventual result.
        for now in [100, 900, 950] {
            engine.tick(now);
        }
        assert_eq!(engine.tick(60_000), Tick::Running(1140));

        // Polling the same instant twice yields the same value.
        assert_eq!(engine.tick(60_000), Tick::Running(1140));
    }

    #[test]
    fn suspended_process_jumps_to_correct_value() {
        let mut engine = TimerEngine::new(600);
        engine.start(1_000);
        // No polls at all for five minutes.
        assert_eq!(engine.tick(301_000), Tick::Running(300));
    }

    #[test]
    fn start_at_zero_is_a_no_op() {
        let mut engine = TimerEngine::new(0);
        assert!(!engine.start(0));
        assert!(!engine.is_running());
        assert!(engine.anchor().is_none());
    }

    #[test]
    fn start_while_running_is_a_no_op() {
        let mut engine = TimerEngine::new(60);
        assert!(engine.start(0));
        let anchor = engine.anchor();
        assert!(!engine.start(5_000));
        assert_eq!(engine.anchor(), anchor);
    }

    #[test]
    fn running_iff_anchor_present() {
        let mut engine = TimerEngine::new(120);
        assert!(engine.anchor().is_none());

        engine.start(0);
        assert!(engine.is_running() && engine.anchor().is_some());

        engine.stop(4_000);
        assert!(!engine.is_running() && engine.anchor().is_none());

        engine.start(10_000);
        engine.reset(300);
        assert!(!engine.is_running() && engine.anchor().is_none());
        assert_eq!(engine.remaining(), 300);
    }

    #[test]
    fn stop_captures_exact_remaining() {
        let mut engine = TimerEngine::new(100);
        engine.start(0);
        engine.stop(42_999);
        assert_eq!(engine.remaining(), 58);
    }

    #[test]
    fn expiry_reported_exactly_once() {
        let mut engine = TimerEngine::new(3);
        engine.start(0);
        assert_eq!(engine.tick(1_000), Tick::Running(2));
        assert_eq!(engine.tick(3_000), Tick::Expired);
        assert!(!engine.is_running());
        assert_eq!(engine.tick(4_000), Tick::Idle);
        assert_eq!(engine.remaining(), 0);
    }

    #[test]
    fn expiry_on_late_wakeup_does_not_underflow() {
        let mut engine = TimerEngine::new(10);
        engine.start(0);
        assert_eq!(engine.tick(3_600_000), Tick::Expired);
        assert_eq!(engine.remaining(), 0);
    }

    #[test]
    fn backwards_clock_reads_clamp_to_initial() {
        let mut engine = TimerEngine::new(60);
        engine.start(10_000);
        assert_eq!(engine.tick(9_000), Tick::Running(60));
    }

    #[test]
    fn adopt_running_lands_on_writer_value() {
        // Fresh subscriber at t=60s of a 1200s countdown must show 19:00.
        let mut engine = TimerEngine::new(18 * 60);
        engine.adopt_running(Some((0, 1200)), 1200, 60_000);
        assert!(engine.is_running());
        assert_eq!(engine.remaining(), 1140);
    }

    #[test]
    fn adopt_running_without_anchor_reanchors_locally() {
        let mut engine = TimerEngine::new(0);
        engine.adopt_running(None, 90, 500_000);
        assert_eq!(engine.remaining(), 90);
        assert_eq!(engine.tick(530_000), Tick::Running(60));
    }
}
