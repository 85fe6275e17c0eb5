//! Countdown timer engine: anchor-based recompute plus clock text parsing.

mod input;
mod timer;

pub use self::input::{format_clock, parse_timer_text};
pub use self::timer::{MAX_TIMER_SECONDS, Tick, TimerEngine};
