//! The alarm set and its due detection.
//!
//! [`AlarmScheduler::evaluate`] runs on every tick, typically several times a
//! second. An alarm stays "due" for its whole scheduled minute, so firing is
//! made idempotent by comparing a [`FireKey`] against the alarm's
//! `last_fired` key.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    alarm::{AlarmDefinition, AlarmEdit, AlarmId, AlarmSound, FireKey, TimeOfDay},
    clock::CivilClock,
    ring::RingHandle,
};

/// Ring repeat interval used when none is configured.
pub const DEFAULT_RING_INTERVAL_MS: i64 = 1300;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("no alarm with id {0}")]
    NotFound(AlarmId),
    #[error("alarm {0} is not ringing")]
    NotRinging(AlarmId),
    #[error("no alarm ids left")]
    IdsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireReason {
    ByTime,
    BySnooze,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireEvent {
    pub alarm_id: AlarmId,
    pub label: String,
    pub sound: AlarmSound,
    pub reason: FireReason,
    pub key: FireKey,
}

/// The soonest enabled alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextUp {
    pub alarm: AlarmDefinition,
    pub next: DateTime<Utc>,
    /// never negative
    pub until: Duration,
}

#[derive(Debug, Default)]
pub struct Evaluation {
    pub due_fires: Vec<FireEvent>,
    pub next_up: Option<NextUp>,
    /// Sound of the ringing alarm when its repeat interval elapsed this tick.
    pub repeat: Option<AlarmSound>,
}

#[derive(Debug)]
pub struct AlarmScheduler {
    clock: CivilClock,
    alarms: Vec<AlarmDefinition>,
    /// `None` once `AlarmId::MAX` has been handed out
    next_id: Option<AlarmId>,
    ring: Option<RingHandle>,
    ring_interval: Duration,
}

impl Default for AlarmScheduler {
    fn default() -> Self {
        Self::new(CivilClock::default())
    }
}

impl AlarmScheduler {
    #[must_use]
    pub fn new(clock: CivilClock) -> Self {
        Self {
            clock,
            alarms: Vec::new(),
            next_id: Some(1),
            ring: None,
            ring_interval: Duration::milliseconds(DEFAULT_RING_INTERVAL_MS),
        }
    }

    /// Seeds the scheduler with previously stored alarms, in stored order.
    ///
    /// Duplicate ids keep their first occurrence.
    #[must_use]
    pub fn with_alarms(clock: CivilClock, alarms: Vec<AlarmDefinition>) -> Self {
        let mut scheduler = Self::new(clock);
        for alarm in alarms {
            if scheduler.get(alarm.id).is_some() {
                log::warn!("dropping duplicate alarm id {}", alarm.id);
                continue;
            }
            scheduler.next_id = scheduler
                .next_id
                .zip(alarm.id.checked_add(1))
                .map(|(next, after)| next.max(after));
            scheduler.alarms.push(alarm);
        }
        scheduler
    }

    #[must_use]
    pub fn with_ring_interval(mut self, interval: Duration) -> Self {
        self.ring_interval = interval;
        self
    }

    #[must_use]
    pub const fn clock(&self) -> &CivilClock {
        &self.clock
    }

    #[must_use]
    pub fn alarms(&self) -> &[AlarmDefinition] {
        &self.alarms
    }

    #[must_use]
    pub fn get(&self, id: AlarmId) -> Option<&AlarmDefinition> {
        self.alarms.iter().find(|alarm| alarm.id == id)
    }

    fn get_mut(&mut self, id: AlarmId) -> Result<&mut AlarmDefinition, SchedulerError> {
        self.alarms
            .iter_mut()
            .find(|alarm| alarm.id == id)
            .ok_or(SchedulerError::NotFound(id))
    }

    #[must_use]
    pub const fn ringing(&self) -> Option<&RingHandle> {
        self.ring.as_ref()
    }

    pub fn add(
        &mut self,
        label: &str,
        time: TimeOfDay,
        sound: AlarmSound,
        enabled: bool,
    ) -> Result<AlarmId, SchedulerError> {
        let id = self.next_id.ok_or(SchedulerError::IdsExhausted)?;
        self.next_id = id.checked_add(1);
        self.alarms
            .push(AlarmDefinition::new(id, label, time, sound, enabled));
        log::info!("added alarm {id} at {time}");
        Ok(id)
    }

    pub fn remove(&mut self, id: AlarmId) -> Result<AlarmDefinition, SchedulerError> {
        let index = self
            .alarms
            .iter()
            .position(|alarm| alarm.id == id)
            .ok_or(SchedulerError::NotFound(id))?;
        if self.ring.as_ref().is_some_and(|ring| ring.alarm_id() == id) {
            self.ring = None;
        }
        log::info!("removed alarm {id}");
        Ok(self.alarms.remove(index))
    }

    pub fn update(&mut self, id: AlarmId, edits: &[AlarmEdit]) -> Result<(), SchedulerError> {
        let alarm = self.get_mut(id)?;
        for edit in edits {
            alarm.apply(edit);
        }
        log::debug!("updated alarm {id} with {edits:?}");
        Ok(())
    }

    pub fn set_enabled(&mut self, id: AlarmId, enabled: bool) -> Result<(), SchedulerError> {
        self.update(id, &[AlarmEdit::Enable(enabled)])
    }

    /// Snoozes the ringing alarm `id` until `now + duration` and ends the ring.
    pub fn set_snooze(
        &mut self,
        id: AlarmId,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SchedulerError> {
        if self.get(id).is_none() {
            return Err(SchedulerError::NotFound(id));
        }
        if !self.ring.as_ref().is_some_and(|ring| ring.alarm_id() == id) {
            return Err(SchedulerError::NotRinging(id));
        }
        let until = now + duration;
        self.get_mut(id)?.snooze_until = Some(until);
        self.ring = None;
        log::info!("alarm {id} snoozed until {until}");
        Ok(until)
    }

    /// Ends the current ring, returning the id of the alarm that was ringing.
    pub fn stop(&mut self) -> Option<AlarmId> {
        self.ring.take().map(|ring| ring.alarm_id())
    }

    /// Next due instant for `alarm`: a pending snooze wins over the natural
    /// next occurrence of its time of day.
    #[must_use]
    pub fn next_due(&self, alarm: &AlarmDefinition, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match alarm.snooze_until {
            Some(until) if until > now => Some(until),
            _ => self.clock.next_occurrence(now, alarm.time),
        }
    }

    /// Every alarm with its next due instant, soonest first.
    ///
    /// Disabled alarms are included; the sort is stable so ties keep
    /// insertion order.
    #[must_use]
    pub fn queue(&self, now: DateTime<Utc>) -> Vec<(&AlarmDefinition, DateTime<Utc>)> {
        let mut queue: Vec<_> = self
            .alarms
            .iter()
            .filter_map(|alarm| self.next_due(alarm, now).map(|next| (alarm, next)))
            .collect();
        queue.sort_by_key(|(_, next)| *next);
        queue
    }

    #[must_use]
    pub fn next_up(&self, now: DateTime<Utc>) -> Option<NextUp> {
        self.alarms
            .iter()
            .filter(|alarm| alarm.enabled)
            .filter_map(|alarm| match self.next_due(alarm, now) {
                Some(next) => Some((alarm, next)),
                None => {
                    log::warn!("alarm {} has no representable next occurrence", alarm.id);
                    None
                }
            })
            .min_by_key(|(_, next)| *next)
            .map(|(alarm, next)| NextUp {
                alarm: alarm.clone(),
                next,
                until: (next - now).max(Duration::zero()),
            })
    }

    /// Runs one evaluation pass.
    ///
    /// Calling this repeatedly with the same `now` fires each due alarm at
    /// most once.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Evaluation {
        let repeat = self
            .ring
            .as_mut()
            .and_then(|ring| ring.repeat_due(now).then(|| ring.sound()));

        let civil = self.clock.to_civil(now);
        let today = self.clock.civil_date(now);
        let mut due_fires = Vec::new();

        for alarm in self.alarms.iter_mut().filter(|alarm| alarm.enabled) {
            let by_snooze = alarm.snooze_until.is_some_and(|until| until <= now);
            let occurrence = civil
                .is_at(alarm.time)
                .then(|| FireKey::by_time(today, alarm.id, alarm.time));
            let (key, reason) = match (alarm.snooze_until, &occurrence) {
                (Some(until), _) if by_snooze => {
                    (FireKey::snooze(alarm.id, until), FireReason::BySnooze)
                }
                (_, Some(occurrence)) => (occurrence.clone(), FireReason::ByTime),
                _ => continue,
            };
            let already_fired = match reason {
                FireReason::BySnooze => alarm.last_fired.as_ref() == Some(&key),
                FireReason::ByTime => alarm.last_by_time.as_ref() == Some(&key),
            };
            if already_fired {
                continue;
            }
            log::info!("alarm {} ({}) fired: {key}", alarm.id, alarm.label);
            // a snooze ending inside the scheduled minute stands in for it
            if occurrence.is_some() {
                alarm.last_by_time = occurrence;
            }
            alarm.last_fired = Some(key.clone());
            alarm.snooze_until = None;
            due_fires.push(FireEvent {
                alarm_id: alarm.id,
                label: alarm.label.clone(),
                sound: alarm.sound,
                reason,
                key,
            });
        }

        if let Some(fire) = due_fires.last() {
            self.ring = Some(RingHandle::start(
                fire.alarm_id,
                fire.label.clone(),
                fire.sound,
                self.ring_interval,
                now,
            ));
        }

        Evaluation {
            due_fires,
            next_up: self.next_up(now),
            repeat,
        }
    }
}
