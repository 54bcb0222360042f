//! Cue sounds as plain tone sequences.
//!
//! [`tones`] is the whole sound design: a table from cue kind and sound to
//! sine tones. Sinks only render them, and every sink is best-effort: a
//! missing output device is logged and ignored.

use std::time::Duration;

use crate::alarm::AlarmSound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueKind {
    /// short tick in the last seconds of the away countdown
    Warning,
    /// an alarm ringing
    Terminal,
    /// the away countdown running out
    TimeUp,
}

/// One sine tone, relative to the start of the cue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub start: Duration,
    pub duration: Duration,
    pub gain: f32,
}

const DEFAULT_GAIN: f32 = 0.22;

const fn tone(frequency_hz: f32, start_ms: u64, duration_ms: u64, gain: f32) -> Tone {
    Tone {
        frequency_hz,
        start: Duration::from_millis(start_ms),
        duration: Duration::from_millis(duration_ms),
        gain,
    }
}

const BEEP: [Tone; 3] = [
    tone(880.0, 0, 180, DEFAULT_GAIN),
    tone(880.0, 220, 180, DEFAULT_GAIN),
    tone(880.0, 440, 180, DEFAULT_GAIN),
];

const CHIME: [Tone; 3] = [
    tone(784.0, 0, 160, DEFAULT_GAIN),
    tone(988.0, 200, 160, DEFAULT_GAIN),
    tone(1175.0, 400, 220, DEFAULT_GAIN),
];

const BELL: [Tone; 4] = [
    tone(1200.0, 0, 100, 0.18),
    tone(1320.0, 0, 100, 0.14),
    tone(1200.0, 160, 100, 0.18),
    tone(1320.0, 160, 100, 0.14),
];

const DIGITAL: [Tone; 4] = [
    tone(900.0, 0, 80, 0.18),
    tone(1100.0, 120, 80, 0.18),
    tone(1300.0, 240, 80, 0.18),
    tone(1500.0, 360, 80, 0.18),
];

const BEEP_TIME_UP: [Tone; 1] = [tone(600.0, 0, 900, 0.25)];

const CHIME_TIME_UP: [Tone; 3] = [
    tone(784.0, 0, 180, DEFAULT_GAIN),
    tone(988.0, 220, 180, DEFAULT_GAIN),
    tone(1175.0, 440, 220, DEFAULT_GAIN),
];

const SIREN_LOW_HZ: f32 = 600.0;
const SIREN_HIGH_HZ: f32 = 1400.0;
const SIREN_STEPS: u16 = 7;
const SIREN_STEP_MS: u64 = 50;

/// 600 Hz up to 1400 Hz and back down in short steps.
fn siren() -> Vec<Tone> {
    let span = SIREN_HIGH_HZ - SIREN_LOW_HZ;
    let rising = (0..SIREN_STEPS).map(|step| f32::from(step) / f32::from(SIREN_STEPS));
    let falling = (0..=SIREN_STEPS)
        .rev()
        .map(|step| f32::from(step) / f32::from(SIREN_STEPS));
    rising
        .chain(falling)
        .zip(0_u64..)
        .map(|(fraction, index)| {
            tone(
                span.mul_add(fraction, SIREN_LOW_HZ),
                index * SIREN_STEP_MS,
                SIREN_STEP_MS,
                DEFAULT_GAIN,
            )
        })
        .collect()
}

fn warning(sound: AlarmSound, seconds_left: Option<u64>) -> Vec<Tone> {
    match sound {
        AlarmSound::Beep => vec![tone(1100.0, 0, 120, 0.18)],
        AlarmSound::Chime => {
            // pitch rises as the countdown runs out: 3 -> 880 Hz, 1 -> 1120 Hz
            let step = 3_u16.saturating_sub(
                seconds_left
                    .and_then(|s| u16::try_from(s).ok())
                    .unwrap_or(3)
                    .min(3),
            );
            vec![tone(120.0f32.mul_add(f32::from(step), 880.0), 0, 100, 0.16)]
        }
        AlarmSound::Siren => vec![tone(1400.0, 0, 80, 0.14)],
        AlarmSound::Bell => vec![tone(1200.0, 0, 100, 0.16)],
        AlarmSound::Digital => vec![tone(1500.0, 0, 60, 0.16)],
        AlarmSound::None => Vec::new(),
    }
}

fn terminal(sound: AlarmSound) -> Vec<Tone> {
    match sound {
        AlarmSound::Beep => BEEP.to_vec(),
        AlarmSound::Chime => CHIME.to_vec(),
        AlarmSound::Siren => siren(),
        AlarmSound::Bell => BELL.to_vec(),
        AlarmSound::Digital => DIGITAL.to_vec(),
        AlarmSound::None => Vec::new(),
    }
}

/// Beep and chime have their own end-of-countdown sound, the rest ring.
fn time_up(sound: AlarmSound) -> Vec<Tone> {
    match sound {
        AlarmSound::Beep => BEEP_TIME_UP.to_vec(),
        AlarmSound::Chime => CHIME_TIME_UP.to_vec(),
        sound => terminal(sound),
    }
}

/// The tones for a cue. `AlarmSound::None` is always silent.
#[must_use]
pub fn tones(kind: CueKind, sound: AlarmSound, seconds_left: Option<u64>) -> Vec<Tone> {
    match kind {
        CueKind::Warning => warning(sound, seconds_left),
        CueKind::Terminal => terminal(sound),
        CueKind::TimeUp => time_up(sound),
    }
}

/// Renders tone sequences somewhere. Implementations never fail loudly.
pub trait CueSink {
    fn play(&self, tones: &[Tone]);
}

/// Used when no output device is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl CueSink for NullSink {
    fn play(&self, _tones: &[Tone]) {}
}

/// Looks up and plays a cue on `sink`.
pub fn play(sink: &dyn CueSink, kind: CueKind, sound: AlarmSound, seconds_left: Option<u64>) {
    let tones = tones(kind, sound, seconds_left);
    if tones.is_empty() {
        return;
    }
    log::debug!("playing {kind:?} cue with sound {sound}");
    sink.play(&tones);
}

#[cfg(feature = "audio")]
pub use self::rodio_sink::RodioSink;

#[cfg(feature = "audio")]
mod rodio_sink {
    use std::time::Duration;

    use rodio::{source::SineWave, OutputStream, OutputStreamHandle, Source};

    use super::{CueSink, Tone};

    const FADE_IN: Duration = Duration::from_millis(10);

    /// Plays cues on the default output device.
    pub struct RodioSink {
        // dropping the stream silences everything played through the handle
        _stream: OutputStream,
        handle: OutputStreamHandle,
        volume: f32,
    }

    impl std::fmt::Debug for RodioSink {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RodioSink")
                .field("volume", &self.volume)
                .finish_non_exhaustive()
        }
    }

    impl RodioSink {
        /// `volume` is in percent. Returns `None` when there is no output device.
        #[must_use]
        pub fn open(volume: f32) -> Option<Self> {
            match OutputStream::try_default() {
                Ok((stream, handle)) => Some(Self {
                    _stream: stream,
                    handle,
                    volume: volume.clamp(0.0, 100.0) / 100.0,
                }),
                Err(e) => {
                    log::warn!("no audio output available, cues will be silent: {e}");
                    None
                }
            }
        }
    }

    impl CueSink for RodioSink {
        fn play(&self, tones: &[Tone]) {
            for tone in tones {
                let source = SineWave::new(tone.frequency_hz)
                    .take_duration(tone.duration)
                    .fade_in(FADE_IN)
                    .amplify(tone.gain * self.volume)
                    .delay(tone.start);
                if let Err(e) = self.handle.play_raw(source) {
                    log::warn!("couldn't play tone: {e}");
                    return;
                }
            }
        }
    }
}
