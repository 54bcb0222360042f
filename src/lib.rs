#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! Alarm clock and away timer core.
//!
//! [`Clock`] is driven by one periodic tick. Each tick evaluates the alarms
//! against the wall clock in a fixed civil timezone and advances the away
//! countdown by the measured time since the previous tick. Everything that
//! should be shown or heard comes back as [`CueEvent`]s.

use std::time::Instant;

use chrono::{DateTime, Utc};

use alarm::{AlarmDefinition, AlarmEdit, AlarmId, AlarmSound, TimeOfDay};
use away::AwayCountdown;
use config::{AlarmStore, Config};
use scheduler::{AlarmScheduler, NextUp, SchedulerError};
use sound::{CueKind, CueSink};

pub mod alarm;
pub mod away;
pub mod clock;
pub mod config;
pub mod ring;
pub mod scheduler;
pub mod sound;

/// messages into the tick loop and cue events out of it
pub mod communication;

pub use communication::{CueEvent, Message};

/// What one tick produced.
#[derive(Debug, Default)]
pub struct TickReport {
    pub cues: Vec<CueEvent>,
    pub next_up: Option<NextUp>,
}

/// Owns the alarms, the away countdown and the sound output.
///
/// Every alarm mutation, including fires and snoozes, is written to the store
/// right away. Dropping the clock releases any ringing alarm.
pub struct Clock {
    config: Config,
    scheduler: AlarmScheduler,
    countdown: AwayCountdown,
    store: Option<AlarmStore>,
    sink: Box<dyn CueSink>,
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .field("countdown", &self.countdown)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Clock {
    /// Loads the alarms from `store`, if any. Without a store nothing is saved.
    #[must_use]
    pub fn new(config: Config, store: Option<AlarmStore>, sink: Box<dyn CueSink>) -> Self {
        let alarms = store.as_ref().map(AlarmStore::load).unwrap_or_default();
        log::info!("loaded {} alarms", alarms.len());
        let scheduler = AlarmScheduler::with_alarms(config.civil_clock(), alarms)
            .with_ring_interval(config.ring_interval());
        Self {
            countdown: config.away_countdown(),
            config,
            scheduler,
            store,
            sink,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    #[must_use]
    pub const fn countdown(&self) -> &AwayCountdown {
        &self.countdown
    }

    fn save(&self) {
        let Some(store) = &self.store else {
            return;
        };
        // the alarms stay live in memory, so a failed write is not fatal
        if let Err(e) = store.save(self.scheduler.alarms()) {
            log::warn!("couldn't save alarms: {e}");
        }
    }

    fn emit(&self, cue: &CueEvent) {
        sound::play(self.sink.as_ref(), cue.kind, cue.sound, cue.seconds_left);
    }

    pub fn add_alarm(
        &mut self,
        label: &str,
        time: TimeOfDay,
        sound: AlarmSound,
        enabled: bool,
    ) -> Result<AlarmId, SchedulerError> {
        let id = self.scheduler.add(label, time, sound, enabled)?;
        self.save();
        Ok(id)
    }

    pub fn remove_alarm(&mut self, id: AlarmId) -> Result<AlarmDefinition, SchedulerError> {
        let removed = self.scheduler.remove(id)?;
        self.save();
        Ok(removed)
    }

    pub fn update_alarm(&mut self, id: AlarmId, edits: &[AlarmEdit]) -> Result<(), SchedulerError> {
        self.scheduler.update(id, edits)?;
        self.save();
        Ok(())
    }

    pub fn set_alarm_enabled(&mut self, id: AlarmId, enabled: bool) -> Result<(), SchedulerError> {
        self.update_alarm(id, &[AlarmEdit::Enable(enabled)])
    }

    /// Snoozes whatever alarm is ringing for the configured snooze time.
    ///
    /// Returns `Ok(None)` when nothing is ringing.
    pub fn snooze(&mut self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        let Some(id) = self.scheduler.ringing().map(ring::RingHandle::alarm_id) else {
            return Ok(None);
        };
        let until = self.scheduler.set_snooze(id, self.config.snooze(), now)?;
        self.save();
        Ok(Some(until))
    }

    pub fn stop_ringing(&mut self) -> Option<AlarmId> {
        let stopped = self.scheduler.stop();
        if let Some(id) = stopped {
            log::info!("alarm {id} stopped");
        }
        stopped
    }

    /// Applies a message from the display side. Returns `false` on quit.
    pub fn handle(&mut self, message: Message, now: DateTime<Utc>, instant: Instant) -> bool {
        match message {
            Message::Presence { away } => self.countdown.set_away(away, instant),
            Message::AwayTimer { enabled } => self.countdown.set_enabled(enabled, instant),
            Message::Stop => {
                self.stop_ringing();
            }
            Message::Snooze => match self.snooze(now) {
                Ok(Some(until)) => log::debug!("snoozed until {until}"),
                Ok(None) => log::debug!("snooze requested but nothing is ringing"),
                Err(e) => log::warn!("couldn't snooze: {e}"),
            },
            Message::Quit => return false,
        }
        true
    }

    /// One pass of the tick loop.
    ///
    /// `now` is the wall clock used for alarms, `instant` the monotonic sample
    /// used for the countdown.
    pub fn tick(&mut self, now: DateTime<Utc>, instant: Instant) -> TickReport {
        let evaluation = self.scheduler.evaluate(now);
        if !evaluation.due_fires.is_empty() {
            self.save();
        }

        let mut cues: Vec<CueEvent> = evaluation
            .due_fires
            .iter()
            .map(CueEvent::from_fire)
            .collect();
        if let Some(sound) = evaluation.repeat {
            sound::play(self.sink.as_ref(), CueKind::Terminal, sound, None);
        }

        let away_sound = self.config.away.sound;
        cues.extend(
            self.countdown
                .tick(instant)
                .into_iter()
                .map(|cue| CueEvent::from_countdown(cue, away_sound)),
        );

        for cue in &cues {
            self.emit(cue);
        }
        TickReport {
            cues,
            next_up: evaluation.next_up,
        }
    }
}
