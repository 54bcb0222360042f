use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AlarmId = u64;

/// A civil time of day with minute resolution.
///
/// Construction never fails: out of range input is clamped to `23:59`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    #[must_use]
    pub fn new(hour: u32, minute: u32) -> Self {
        Self(NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0).unwrap_or_default())
    }

    /// Parses `HH:MM`, clamping each part and treating unparseable parts as 0.
    #[must_use]
    pub fn parse_hhmm(value: &str) -> Self {
        let mut parts = value.trim().splitn(2, ':');
        let mut next_part = || {
            parts
                .next()
                .and_then(|part| part.trim().parse::<i64>().ok())
                .map_or(0, |n| u32::try_from(n.max(0)).unwrap_or(u32::MAX))
        };
        let hour = next_part();
        let minute = next_part();
        Self::new(hour, minute)
    }

    /// drops seconds and below
    #[must_use]
    pub fn from_naive(time: NaiveTime) -> Self {
        Self::new(time.hour(), time.minute())
    }

    #[must_use]
    pub const fn as_naive(self) -> NaiveTime {
        self.0
    }

    #[must_use]
    pub fn hour(self) -> u32 {
        self.0.hour()
    }

    #[must_use]
    pub fn minute(self) -> u32 {
        self.0.minute()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmSound {
    Beep,
    #[default]
    Chime,
    Siren,
    Bell,
    Digital,
    None,
}

impl AlarmSound {
    pub const ALL: [Self; 6] = [
        Self::Beep,
        Self::Chime,
        Self::Siren,
        Self::Bell,
        Self::Digital,
        Self::None,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Beep => "beep",
            Self::Chime => "chime",
            Self::Siren => "siren",
            Self::Bell => "bell",
            Self::Digital => "digital",
            Self::None => "none",
        }
    }
}

impl fmt::Display for AlarmSound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown sound `{0}`, expected one of beep, chime, siren, bell, digital, none")]
pub struct UnknownSound(String);

impl FromStr for AlarmSound {
    type Err = UnknownSound;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|sound| sound.name() == wanted)
            .ok_or_else(|| UnknownSound(s.to_string()))
    }
}

/// Identity of one due occurrence of an alarm.
///
/// An alarm fires at most once per distinct key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FireKey {
    ByTime {
        date: NaiveDate,
        alarm_id: AlarmId,
        time: String,
    },
    Snooze {
        alarm_id: AlarmId,
        until: DateTime<Utc>,
    },
}

impl FireKey {
    #[must_use]
    pub fn by_time(date: NaiveDate, alarm_id: AlarmId, time: TimeOfDay) -> Self {
        Self::ByTime {
            date,
            alarm_id,
            time: time.to_string(),
        }
    }

    #[must_use]
    pub const fn snooze(alarm_id: AlarmId, until: DateTime<Utc>) -> Self {
        Self::Snooze { alarm_id, until }
    }
}

impl fmt::Display for FireKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByTime {
                date,
                alarm_id,
                time,
            } => write!(f, "{date}-{alarm_id}-{time}"),
            Self::Snooze { alarm_id, until } => {
                write!(f, "SNOOZE-{alarm_id}-{}", until.timestamp_millis())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmDefinition {
    pub id: AlarmId,
    pub label: String,
    pub time: TimeOfDay,
    pub enabled: bool,
    pub sound: AlarmSound,
    pub snooze_until: Option<DateTime<Utc>>,
    /// key of the most recent fire, by time or by snooze
    pub last_fired: Option<FireKey>,
    /// the most recent scheduled occurrence that has been rung
    pub last_by_time: Option<FireKey>,
}

impl AlarmDefinition {
    /// A fresh alarm with no snooze or fire history.
    ///
    /// A blank label falls back to `"Alarm"`.
    #[must_use]
    pub fn new(id: AlarmId, label: &str, time: TimeOfDay, sound: AlarmSound, enabled: bool) -> Self {
        Self {
            id,
            label: normalize_label(label),
            time,
            enabled,
            sound,
            snooze_until: None,
            last_fired: None,
            last_by_time: None,
        }
    }

    pub(crate) fn apply(&mut self, edit: &AlarmEdit) {
        match edit {
            AlarmEdit::Label(label) => self.label = normalize_label(label),
            AlarmEdit::Time(time) => self.time = *time,
            AlarmEdit::Sound(sound) => self.sound = *sound,
            AlarmEdit::Enable(enabled) => self.enabled = *enabled,
        }
    }
}

fn normalize_label(label: &str) -> String {
    let label = label.trim();
    if label.is_empty() {
        "Alarm".to_string()
    } else {
        label.to_string()
    }
}

/// A single user edit to an existing alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmEdit {
    Label(String),
    Time(TimeOfDay),
    Sound(AlarmSound),
    Enable(bool),
}
