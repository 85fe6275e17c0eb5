use std::{f32::consts::TAU, path::Path, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::scheduler::END_PULSE_OFFSETS_MS;

/// Container format of a pre-recorded clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFormat {
    /// RIFF/WAVE bytes.
    Wav,
    /// MPEG audio bytes.
    Mp3,
}

/// One renderable piece of audio handed to the host's output device.
#[derive(Debug, Clone)]
pub enum AudioClip {
    /// Pre-recorded clip loaded from disk.
    Encoded {
        /// Container format of the bytes.
        format: ClipFormat,
        /// The raw file contents.
        bytes: Arc<[u8]>,
    },
    /// Mono PCM generated in-process; always available, no asset dependency.
    Pcm {
        /// Samples per second.
        sample_rate: u32,
        /// Signed 16-bit samples.
        samples: Arc<[i16]>,
    },
}

/// Failure reported by an audio output device.
#[derive(Debug, Error)]
#[error("audio output rejected clip: {0}")]
pub struct PlaybackError(pub String);

/// Capability interface for whatever actually produces sound: a speaker
/// device in the host application, or a recording buffer in tests.
pub trait AudioSink: Send + Sync {
    /// Play one clip to completion.
    fn play(&self, clip: AudioClip) -> BoxFuture<'static, Result<(), PlaybackError>>;
}

/// Sink that discards audio, for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, clip: AudioClip) -> BoxFuture<'static, Result<(), PlaybackError>> {
        debug!(?clip, "discarding alarm audio (no output device)");
        Box::pin(async { Ok(()) })
    }
}

/// A sound the alarm scheduler can ask to be played.
pub trait AlarmSound: Send + Sync {
    /// Play this sound on the given sink.
    fn play(&self, sink: Arc<dyn AudioSink>) -> BoxFuture<'static, Result<(), PlaybackError>>;
}

/// Synthesized tone, the ever-available fallback variant.
struct SynthSound {
    clip: AudioClip,
}

impl SynthSound {
    fn horn() -> Self {
        Self { clip: synth_horn() }
    }

    fn minute_beep() -> Self {
        Self { clip: synth_beep() }
    }
}

impl AlarmSound for SynthSound {
    fn play(&self, sink: Arc<dyn AudioSink>) -> BoxFuture<'static, Result<(), PlaybackError>> {
        let clip = self.clip.clone();
        Box::pin(async move { sink.play(clip).await })
    }
}

/// Pre-recorded clip variant with transparent fallback to synthesis.
struct ClipSound {
    format: ClipFormat,
    bytes: Arc<[u8]>,
    fallback: SynthSound,
}

impl AlarmSound for ClipSound {
    fn play(&self, sink: Arc<dyn AudioSink>) -> BoxFuture<'static, Result<(), PlaybackError>> {
        let clip = AudioClip::Encoded {
            format: self.format,
            bytes: Arc::clone(&self.bytes),
        };
        let fallback = self.fallback.clip.clone();
        Box::pin(async move {
            if let Err(err) = sink.play(clip).await {
                warn!(error = %err, "clip playback failed; falling back to synthesized tone");
                return sink.play(fallback).await;
            }
            Ok(())
        })
    }
}

/// The two sounds the scoreboard plays, selected once at startup.
#[derive(Clone)]
pub struct SoundBank {
    horn: Arc<dyn AlarmSound>,
    minute_beep: Arc<dyn AlarmSound>,
}

impl SoundBank {
    /// Load clip files from `dir`, preferring WAV over MP3, and fall back to
    /// synthesis per sound when no usable file exists. Never fails.
    pub fn load(dir: &Path) -> Self {
        Self {
            horn: load_sound(dir, "hockey-buzzer", SynthSound::horn),
            minute_beep: load_sound(dir, "minute-beep", SynthSound::minute_beep),
        }
    }

    /// Bank using only synthesized tones.
    pub fn synthesized() -> Self {
        Self {
            horn: Arc::new(SynthSound::horn()),
            minute_beep: Arc::new(SynthSound::minute_beep()),
        }
    }

    /// The end-of-period / minute-boundary horn.
    pub fn horn(&self) -> Arc<dyn AlarmSound> {
        Arc::clone(&self.horn)
    }

    /// The minute-boundary beep.
    pub fn minute_beep(&self) -> Arc<dyn AlarmSound> {
        Arc::clone(&self.minute_beep)
    }
}

fn load_sound(dir: &Path, stem: &str, synth: fn() -> SynthSound) -> Arc<dyn AlarmSound> {
    for (extension, format) in [("wav", ClipFormat::Wav), ("mp3", ClipFormat::Mp3)] {
        let path = dir.join(format!("{stem}.{extension}"));
        match std::fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => {
                info!(path = %path.display(), "loaded alarm clip");
                return Arc::new(ClipSound {
                    format,
                    bytes: bytes.into(),
                    fallback: synth(),
                });
            }
            Ok(_) => warn!(path = %path.display(), "ignoring empty alarm clip"),
            Err(_) => {}
        }
    }

    debug!(stem, "no alarm clip found; using synthesized tone");
    Arc::new(synth())
}

/// Fire the three-pulse end-of-period horn sequence.
///
/// The pulses run on their own task at fixed offsets from the zero crossing,
/// independent of the timer engine's lifecycle; the engine has already
/// stopped by the time the later pulses fire.
pub fn spawn_end_sequence(bank: &SoundBank, sink: Arc<dyn AudioSink>) -> JoinHandle<()> {
    let horn = bank.horn();
    tokio::spawn(async move {
        let mut elapsed = 0u64;
        for offset in END_PULSE_OFFSETS_MS {
            if offset > elapsed {
                tokio::time::sleep(Duration::from_millis(offset - elapsed)).await;
                elapsed = offset;
            }
            if let Err(err) = horn.play(Arc::clone(&sink)).await {
                warn!(error = %err, "end-of-period horn pulse failed");
            }
        }
    })
}

// Arena-horn style blast: low sawtooth drifting from 110 Hz down to 100 Hz
// with a fast attack, a sustained body, and a short decay.
fn synth_horn() -> AudioClip {
    const SAMPLE_RATE: u32 = 16_000;
    const DURATION_S: f32 = 1.2;

    let total = (SAMPLE_RATE as f32 * DURATION_S) as usize;
    let mut samples = Vec::with_capacity(total);
    let mut phase = 0.0f32;
    for i in 0..total {
        let t = i as f32 / SAMPLE_RATE as f32;
        let frequency = 110.0 - 10.0 * (t / DURATION_S);
        phase = (phase + frequency / SAMPLE_RATE as f32).fract();

        let envelope = if t < 0.05 {
            0.6 * (t / 0.05)
        } else if t < 1.0 {
            0.6
        } else {
            0.6 * (1.0 - (t - 1.0) / (DURATION_S - 1.0))
        };

        let sawtooth = 2.0 * phase - 1.0;
        samples.push((sawtooth * envelope * i16::MAX as f32) as i16);
    }

    AudioClip::Pcm {
        sample_rate: SAMPLE_RATE,
        samples: samples.into(),
    }
}

// Short 1 kHz sine beep with exponential decay.
fn synth_beep() -> AudioClip {
    const SAMPLE_RATE: u32 = 16_000;
    const DURATION_S: f32 = 0.2;

    let total = (SAMPLE_RATE as f32 * DURATION_S) as usize;
    let mut samples = Vec::with_capacity(total);
    for i in 0..total {
        let t = i as f32 / SAMPLE_RATE as f32;
        let envelope = 0.3 * (-t * 20.0).exp();
        let sine = (TAU * 1000.0 * t).sin();
        samples.push((sine * envelope * i16::MAX as f32) as i16);
    }

    AudioClip::Pcm {
        sample_rate: SAMPLE_RATE,
        samples: samples.into(),
    }
}
