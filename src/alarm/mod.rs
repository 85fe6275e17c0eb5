//! Audio alarms layered onto the ticking clock: one beep per minute boundary
//! and a three-horn sequence when a period ends.

mod scheduler;
mod sound;

pub use self::scheduler::{AlarmEvent, AlarmScheduler, END_PULSE_OFFSETS_MS};
pub use self::sound::{
    AlarmSound, AudioClip, AudioSink, ClipFormat, NullSink, PlaybackError, SoundBank,
    spawn_end_sequence,
};
