use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{
    format::{Item, StrftimeItems},
    DateTime, NaiveTime, Utc,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    alarm::{AlarmDefinition, AlarmId, AlarmSound, FireKey, TimeOfDay},
    away::AwayCountdown,
    clock::{CivilClock, DEFAULT_UTC_OFFSET_MINUTES},
};

const APP_NAME: &str = "roosty_alarm";

/// Slowest tick that still sees every alarm minute and every warning second.
pub const MAX_TICK_INTERVAL_MS: u64 = 1000;
pub const MIN_TICK_INTERVAL_MS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't find a home directory for roosty_alarm")]
    NoProjectDirs,
    #[error("couldn't read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("couldn't serialize: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("couldn't write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn project_dirs() -> Result<directories::ProjectDirs, ConfigError> {
    directories::ProjectDirs::from("", "", APP_NAME).ok_or(ConfigError::NoProjectDirs)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let write_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, contents).map_err(write_error)
}

/// Whether `format` can be rendered by chrono without failing.
#[must_use]
pub fn is_valid_time_format(format: &str) -> bool {
    StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

#[inline]
#[must_use]
pub const fn always_true() -> bool {
    true
}

fn default_time_format() -> String {
    "%H:%M:%S".to_string()
}
const fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}
const fn default_tick_interval_ms() -> u64 {
    250
}
const fn default_snooze_minutes() -> u32 {
    5
}
const fn default_ring_interval_ms() -> u64 {
    1300
}
const fn default_volume() -> f32 {
    100.0
}
const fn default_away_duration_ms() -> u64 {
    30_000
}
const fn default_warning_seconds() -> u64 {
    3
}
const fn default_away_sound() -> AlarmSound {
    AlarmSound::Beep
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwayConfig {
    #[serde(default = "always_true")]
    pub enabled: bool,
    #[serde(default = "default_away_duration_ms")]
    pub duration_ms: u64,
    #[serde(default = "default_warning_seconds")]
    pub warning_seconds: u64,
    #[serde(default = "default_away_sound")]
    pub sound: AlarmSound,
}

impl Default for AwayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_ms: default_away_duration_ms(),
            warning_seconds: default_warning_seconds(),
            sound: default_away_sound(),
        }
    }
}

/// Settings, stored as `config.toml` in the config dir.
///
/// Every field has a default so a partial or empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_time_format")]
    pub time_format: String,
    /// minutes east of UTC for all civil time
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: u32,
    #[serde(default = "default_ring_interval_ms")]
    pub ring_interval_ms: u64,
    /// percent
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub away: AwayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_format: default_time_format(),
            utc_offset_minutes: default_utc_offset_minutes(),
            tick_interval_ms: default_tick_interval_ms(),
            snooze_minutes: default_snooze_minutes(),
            ring_interval_ms: default_ring_interval_ms(),
            volume: default_volume(),
            away: AwayConfig::default(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads settings from `path`, using the defaults when it doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match fs::read_to_string(path) {
            Ok(config) => config,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut config: Self = toml::from_str(&config).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if !is_valid_time_format(&config.time_format) {
            log::warn!(
                "time format {:?} is not a valid strftime string, using the default",
                config.time_format
            );
            config.time_format = default_time_format();
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        write_file(path, &toml::to_string(self)?)
    }

    /// Writes the default settings unless a file exists and `force` is false.
    /// Returns whether anything was written.
    pub fn init(path: &Path, force: bool) -> Result<bool, ConfigError> {
        if path.exists() && !force {
            return Ok(false);
        }
        Self::new().save(path)?;
        Ok(true)
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    pub fn alarms_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.data_dir().join("alarms.toml"))
    }

    /// The tick interval, bounded so that no alarm minute can be skipped.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        let clamped = self
            .tick_interval_ms
            .clamp(MIN_TICK_INTERVAL_MS, MAX_TICK_INTERVAL_MS);
        if clamped != self.tick_interval_ms {
            log::warn!(
                "tick interval of {}ms is out of range, using {clamped}ms",
                self.tick_interval_ms
            );
        }
        Duration::from_millis(clamped)
    }

    /// At least one minute; a zero snooze would ring again on the next tick.
    #[must_use]
    pub fn snooze(&self) -> chrono::Duration {
        if self.snooze_minutes == 0 {
            log::warn!("snooze of 0 minutes is too short, using 1 minute");
        }
        chrono::Duration::minutes(i64::from(self.snooze_minutes.max(1)))
    }

    #[must_use]
    pub fn ring_interval(&self) -> chrono::Duration {
        let millis = self.ring_interval_ms.clamp(100, 60_000);
        chrono::Duration::milliseconds(i64::try_from(millis).unwrap_or(1300))
    }

    #[must_use]
    pub fn civil_clock(&self) -> CivilClock {
        CivilClock::from_offset_minutes(self.utc_offset_minutes)
    }

    #[must_use]
    pub fn away_countdown(&self) -> AwayCountdown {
        let mut countdown = AwayCountdown::new(
            Duration::from_millis(self.away.duration_ms),
            self.away.warning_seconds,
        );
        if !self.away.enabled {
            countdown.set_enabled(false, std::time::Instant::now());
        }
        countdown
    }
}

/// Layout version written by [`AlarmStore::save`].
///
/// Version 0 is a file without a `version` key; it has the same fields.
pub const ALARMS_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct StoredAlarms {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    alarms: Vec<toml::Value>,
}

#[derive(Debug, Serialize)]
struct AlarmsFile<'a> {
    version: u32,
    alarms: Vec<AlarmRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct AlarmRecord<'a> {
    id: AlarmId,
    label: &'a str,
    #[serde(with = "toml_datetime_compat")]
    time: NaiveTime,
    enabled: bool,
    sound: AlarmSound,
    #[serde(skip_serializing_if = "Option::is_none")]
    snooze_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_fired: Option<&'a FireKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_by_time: Option<&'a FireKey>,
}

impl<'a> From<&'a AlarmDefinition> for AlarmRecord<'a> {
    fn from(alarm: &'a AlarmDefinition) -> Self {
        Self {
            id: alarm.id,
            label: &alarm.label,
            time: alarm.time.as_naive(),
            enabled: alarm.enabled,
            sound: alarm.sound,
            snooze_until: alarm.snooze_until,
            last_fired: alarm.last_fired.as_ref(),
            last_by_time: alarm.last_by_time.as_ref(),
        }
    }
}

/// One stored record, with every field but the time optional.
#[derive(Debug, Deserialize)]
struct LoadedRecord {
    #[serde(default)]
    id: Option<AlarmId>,
    #[serde(default)]
    label: String,
    #[serde(with = "toml_datetime_compat")]
    time: NaiveTime,
    #[serde(default = "always_true")]
    enabled: bool,
    #[serde(default)]
    sound: Option<String>,
    #[serde(default)]
    snooze_until: Option<DateTime<Utc>>,
    #[serde(default)]
    last_fired: Option<FireKey>,
    #[serde(default)]
    last_by_time: Option<FireKey>,
}

impl LoadedRecord {
    fn into_alarm(self, id: AlarmId) -> AlarmDefinition {
        let sound = self.sound.map_or_else(AlarmSound::default, |sound| {
            sound.parse().unwrap_or_else(|e| {
                log::warn!("alarm {id}: {e}, using the default sound");
                AlarmSound::default()
            })
        });
        // records written before `last_by_time` existed only kept `last_fired`
        let last_by_time = self.last_by_time.or_else(|| {
            self.last_fired
                .clone()
                .filter(|key| matches!(key, FireKey::ByTime { .. }))
        });
        AlarmDefinition {
            snooze_until: self.snooze_until,
            last_fired: self.last_fired,
            last_by_time,
            ..AlarmDefinition::new(
                id,
                &self.label,
                TimeOfDay::from_naive(self.time),
                sound,
                self.enabled,
            )
        }
    }
}

/// The persisted alarm list.
///
/// Loading never fails: a missing or unreadable file is an empty list and a
/// malformed record is skipped.
#[derive(Debug, Clone)]
pub struct AlarmStore {
    path: PathBuf,
}

impl AlarmStore {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn load(&self) -> Vec<AlarmDefinition> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => parse_alarms(&raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                log::warn!("couldn't read {}: {e}", self.path.display());
                Vec::new()
            }
        }
    }

    pub fn save(&self, alarms: &[AlarmDefinition]) -> Result<(), ConfigError> {
        let file = AlarmsFile {
            version: ALARMS_VERSION,
            alarms: alarms.iter().map(AlarmRecord::from).collect(),
        };
        write_file(&self.path, &toml::to_string(&file)?)
    }
}

/// Parses a stored alarm list, filling defaults and assigning ids to records
/// without one.
#[must_use]
pub fn parse_alarms(raw: &str) -> Vec<AlarmDefinition> {
    let stored: StoredAlarms = match toml::from_str(raw) {
        Ok(stored) => stored,
        Err(e) => {
            log::warn!("stored alarms are corrupt, starting empty: {e}");
            return Vec::new();
        }
    };
    if stored.version > ALARMS_VERSION {
        log::warn!(
            "stored alarms have version {}, newer than {ALARMS_VERSION}, starting empty",
            stored.version
        );
        return Vec::new();
    }

    let records: Vec<LoadedRecord> = stored
        .alarms
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match LoadedRecord::deserialize(value) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("skipping stored alarm #{index}: {e}");
                None
            }
        })
        .collect();

    let mut next_id = records
        .iter()
        .filter_map(|record| record.id)
        .max()
        .map_or(1, |max| max.saturating_add(1));
    records
        .into_iter()
        .map(|record| {
            let id = record.id.unwrap_or_else(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            record.into_alarm(id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.snooze(), chrono::Duration::minutes(5));
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config: Config = toml::from_str(
            "utc_offset_minutes = -300\n[away]\nduration_ms = 10000\nsound = \"siren\"\n",
        )
        .unwrap();
        assert_eq!(config.utc_offset_minutes, -300);
        assert_eq!(config.away.duration_ms, 10_000);
        assert_eq!(config.away.sound, AlarmSound::Siren);
        assert!(config.away.enabled);
        assert_eq!(config.away.warning_seconds, 3);
    }

    #[test]
    fn tick_interval_is_bounded() {
        let config = Config {
            tick_interval_ms: 90_000,
            ..Config::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        let config = Config {
            tick_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(10));
    }

    #[test]
    fn snooze_is_at_least_a_minute() {
        let config = Config {
            snooze_minutes: 0,
            ..Config::default()
        };
        assert_eq!(config.snooze(), chrono::Duration::minutes(1));
    }

    #[test]
    fn broken_time_format_falls_back_to_default() {
        assert!(is_valid_time_format("%H:%M:%S"));
        assert!(!is_valid_time_format("%H:%"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "time_format = \"%H:%\"\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().time_format, "%H:%M:%S");
    }

    #[test]
    fn config_init_respects_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert!(Config::init(&path, false).unwrap());
        fs::write(&path, "volume = 40.0\n").unwrap();
        assert!(!Config::init(&path, false).unwrap());
        assert!((Config::load(&path).unwrap().volume - 40.0).abs() < f32::EPSILON);
        assert!(Config::init(&path, true).unwrap());
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn missing_config_is_default_but_broken_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        fs::write(&path, "volume = [").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn alarms_survive_a_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlarmStore::new(dir.path().join("alarms.toml"));
        let until = DateTime::from_timestamp(1_800_000_000, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let mut snoozed =
            AlarmDefinition::new(2, "Snoozed", TimeOfDay::new(6, 45), AlarmSound::Siren, true);
        snoozed.snooze_until = Some(until);
        snoozed.last_fired = Some(FireKey::by_time(date, 2, TimeOfDay::new(6, 45)));
        snoozed.last_by_time = snoozed.last_fired.clone();
        let mut after_snooze =
            AlarmDefinition::new(5, "Tea", TimeOfDay::new(16, 0), AlarmSound::None, false);
        after_snooze.last_fired = Some(FireKey::snooze(5, until));
        after_snooze.last_by_time = Some(FireKey::by_time(date, 5, TimeOfDay::new(16, 0)));
        let alarms = vec![snoozed, after_snooze];

        store.save(&alarms).unwrap();
        assert_eq!(store.load(), alarms);
    }

    #[test]
    fn missing_or_corrupt_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AlarmStore::new(dir.path().join("alarms.toml"));
        assert!(store.load().is_empty());
        fs::write(store.path(), "this is { not toml").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn newer_layouts_are_not_trusted() {
        let raw = "version = 2\n[[alarms]]\nid = 1\ntime = 08:00:00\n";
        assert!(parse_alarms(raw).is_empty());
    }

    #[test]
    fn records_are_migrated_one_by_one() {
        let raw = r#"
[[alarms]]
id = 4
label = "Work"
time = 07:30:00
sound = "bell"

[[alarms]]
label = "  "
time = 09:00:45
sound = "kazoo"
enabled = false

[[alarms]]
id = 6
time = "not a time"
"#;
        let alarms = parse_alarms(raw);
        assert_eq!(alarms.len(), 2);

        assert_eq!(alarms[0].id, 4);
        assert_eq!(alarms[0].label, "Work");
        assert_eq!(alarms[0].time, TimeOfDay::new(7, 30));
        assert_eq!(alarms[0].sound, AlarmSound::Bell);
        assert!(alarms[0].enabled);

        assert_eq!(alarms[1].id, 5);
        assert_eq!(alarms[1].label, "Alarm");
        assert_eq!(alarms[1].time, TimeOfDay::new(9, 0));
        assert_eq!(alarms[1].sound, AlarmSound::default());
        assert!(!alarms[1].enabled);
        assert_eq!(alarms[1].last_fired, None);
    }

    #[test]
    fn old_records_seed_the_scheduled_fire_from_last_fired() {
        let raw = r#"
version = 1

[[alarms]]
id = 1
time = 08:00:00

[alarms.last_fired]
kind = "by_time"
date = "2026-10-19"
alarm_id = 1
time = "08:00"
"#;
        let alarms = parse_alarms(raw);
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let key = FireKey::by_time(date, 1, TimeOfDay::new(8, 0));
        assert_eq!(alarms[0].last_fired, Some(key.clone()));
        assert_eq!(alarms[0].last_by_time, Some(key));
    }
}
