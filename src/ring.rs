use chrono::{DateTime, Duration, Utc};

use crate::alarm::{AlarmId, AlarmSound};

/// An alarm that is currently ringing.
///
/// The handle is the only thing that keeps a ring repeating. Dropping it
/// (stop, snooze, remove, or tearing down the owner) ends the ring.
#[derive(Debug)]
pub struct RingHandle {
    alarm_id: AlarmId,
    label: String,
    sound: AlarmSound,
    interval: Duration,
    next_repeat: DateTime<Utc>,
}

impl RingHandle {
    pub(crate) fn start(
        alarm_id: AlarmId,
        label: String,
        sound: AlarmSound,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        log::debug!("ring started for alarm {alarm_id}");
        Self {
            alarm_id,
            label,
            sound,
            interval,
            next_repeat: now + interval,
        }
    }

    #[must_use]
    pub const fn alarm_id(&self) -> AlarmId {
        self.alarm_id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub const fn sound(&self) -> AlarmSound {
        self.sound
    }

    /// true once per elapsed interval; late polls do not queue up repeats
    pub(crate) fn repeat_due(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.next_repeat {
            return false;
        }
        self.next_repeat = now + self.interval;
        true
    }
}

impl Drop for RingHandle {
    fn drop(&mut self) {
        log::debug!("ring released for alarm {}", self.alarm_id);
    }
}
