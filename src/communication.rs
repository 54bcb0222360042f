use crate::{
    alarm::{AlarmId, AlarmSound},
    away::CountdownCue,
    scheduler::FireEvent,
    sound::CueKind,
};

/// Requests from the display side to the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// presence changed, `away` is true when the user left
    Presence { away: bool },
    /// stop the ringing alarm
    Stop,
    /// snooze the ringing alarm for the configured time
    Snooze,
    /// enable or disable the away countdown
    AwayTimer { enabled: bool },
    Quit,
}

impl Message {
    /// Parses one line typed on the control input, case-insensitively.
    ///
    /// `away`, `back`, `stop`, `snooze`, `timer on`, `timer off`, `quit`.
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        let words: Vec<String> = line
            .split_whitespace()
            .map(str::to_ascii_lowercase)
            .collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        match words.as_slice() {
            ["away"] => Some(Self::Presence { away: true }),
            ["back"] => Some(Self::Presence { away: false }),
            ["stop"] => Some(Self::Stop),
            ["snooze"] => Some(Self::Snooze),
            ["timer", "on"] => Some(Self::AwayTimer { enabled: true }),
            ["timer", "off"] => Some(Self::AwayTimer { enabled: false }),
            ["quit" | "exit"] => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Something the display should show and the sound sink should play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueEvent {
    pub kind: CueKind,
    pub alarm_id: Option<AlarmId>,
    pub label: Option<String>,
    pub sound: AlarmSound,
    pub seconds_left: Option<u64>,
}

impl CueEvent {
    #[must_use]
    pub fn from_fire(fire: &FireEvent) -> Self {
        Self {
            kind: CueKind::Terminal,
            alarm_id: Some(fire.alarm_id),
            label: Some(fire.label.clone()),
            sound: fire.sound,
            seconds_left: None,
        }
    }

    #[must_use]
    pub const fn from_countdown(cue: CountdownCue, sound: AlarmSound) -> Self {
        let (kind, seconds_left) = match cue {
            CountdownCue::Warning { seconds_left } => (CueKind::Warning, Some(seconds_left)),
            CountdownCue::Terminal => (CueKind::TimeUp, None),
        };
        Self {
            kind,
            alarm_id: None,
            label: None,
            sound,
            seconds_left,
        }
    }
}
