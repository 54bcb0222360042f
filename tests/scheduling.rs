use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use roosty_alarm::{
    alarm::{AlarmSound, TimeOfDay},
    away::{AwayCountdown, CountdownCue, CountdownPhase},
    clock::CivilClock,
    scheduler::{AlarmScheduler, FireReason},
};

fn at(h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    CivilClock::default()
        .offset()
        .with_ymd_and_hms(2026, 10, 19, h, mi, s)
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn eight_oclock_alarm_fires_once_in_its_minute() {
    let mut scheduler = AlarmScheduler::default();
    let id = scheduler.add("Wake", TimeOfDay::new(8, 0), AlarmSound::Chime, true).unwrap();

    let before = scheduler.evaluate(at(7, 59, 59));
    assert!(before.due_fires.is_empty());
    let next = before.next_up.unwrap();
    assert_eq!(next.alarm.id, id);
    assert_eq!(next.until, Duration::seconds(1));

    let fired = scheduler.evaluate(at(8, 0, 0)).due_fires;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].reason, FireReason::ByTime);
    assert_eq!(fired[0].key.to_string(), format!("2026-10-19-{id}-08:00"));

    let later = at(8, 0, 0) + Duration::milliseconds(100);
    assert!(scheduler.evaluate(later).due_fires.is_empty());
    assert!(scheduler.evaluate(at(8, 0, 59)).due_fires.is_empty());

    // once the minute is over the alarm points at tomorrow
    let next = scheduler.evaluate(at(8, 1, 0)).next_up.unwrap();
    assert_eq!(next.next, at(8, 0, 0) + Duration::days(1));
}

#[test]
fn fires_again_the_next_day() {
    let mut scheduler = AlarmScheduler::default();
    scheduler.add("Wake", TimeOfDay::new(8, 0), AlarmSound::Beep, true).unwrap();
    assert_eq!(scheduler.evaluate(at(8, 0, 0)).due_fires.len(), 1);
    let tomorrow = at(8, 0, 0) + Duration::days(1);
    assert_eq!(scheduler.evaluate(tomorrow).due_fires.len(), 1);
}

#[test]
fn alarms_in_the_same_minute_all_fire() {
    let mut scheduler = AlarmScheduler::default();
    let a = scheduler.add("a", TimeOfDay::new(6, 30), AlarmSound::Beep, true).unwrap();
    let b = scheduler.add("b", TimeOfDay::new(6, 30), AlarmSound::Bell, true).unwrap();
    let fired: Vec<_> = scheduler
        .evaluate(at(6, 30, 20))
        .due_fires
        .into_iter()
        .map(|fire| fire.alarm_id)
        .collect();
    assert_eq!(fired, vec![a, b]);
    // the last one fired owns the ring
    assert_eq!(scheduler.ringing().unwrap().alarm_id(), b);
}

#[test]
fn away_countdown_in_hundred_ms_ticks() {
    let mut countdown = AwayCountdown::default();
    let start = std::time::Instant::now();
    countdown.set_away(true, start);

    let mut cues = Vec::new();
    for tick in 1..=300_u64 {
        let now = start + StdDuration::from_millis(tick * 100);
        cues.extend(countdown.tick(now).into_iter().map(|cue| (tick, cue)));
    }
    assert_eq!(
        cues,
        vec![
            (270, CountdownCue::Warning { seconds_left: 3 }),
            (280, CountdownCue::Warning { seconds_left: 2 }),
            (290, CountdownCue::Warning { seconds_left: 1 }),
            (300, CountdownCue::Terminal),
        ]
    );
    assert_eq!(countdown.phase(), CountdownPhase::Finished);
}

#[test]
fn returning_mid_countdown_resets_it() {
    let mut countdown = AwayCountdown::default();
    let start = std::time::Instant::now();
    countdown.set_away(true, start);
    countdown.tick(start + StdDuration::from_millis(18_000));
    assert_eq!(countdown.remaining(), StdDuration::from_millis(12_000));

    countdown.set_away(false, start + StdDuration::from_millis(18_000));
    assert_eq!(countdown.remaining(), StdDuration::from_secs(30));
    assert_eq!(countdown.phase(), CountdownPhase::Idle);
}

proptest! {
    #[test]
    fn next_occurrence_is_within_a_day(
        secs in 0_i64..4_000_000_000,
        hour in 0_u32..24,
        minute in 0_u32..60,
        offset in -720_i32..=840,
    ) {
        let clock = CivilClock::from_offset_minutes(offset);
        let now = DateTime::from_timestamp(secs, 0).unwrap();
        let time = TimeOfDay::new(hour, minute);
        let next = clock.next_occurrence(now, time).unwrap();

        prop_assert!(next >= now);
        prop_assert!(next - now < Duration::days(1));
        let civil = clock.to_civil(next);
        prop_assert_eq!((civil.hour, civil.minute, civil.second), (hour, minute, 0));

        // tomorrow exactly when hh:mm:00 is already behind us today
        let current = clock.to_civil(now);
        let passed = (hour, minute, 0) < (current.hour, current.minute, current.second);
        prop_assert_eq!(clock.civil_date(next) != clock.civil_date(now), passed);
    }

    #[test]
    fn evaluating_twice_never_fires_twice(
        secs in 0_i64..4_000_000_000,
        hour in 0_u32..24,
        minute in 0_u32..60,
    ) {
        let mut scheduler = AlarmScheduler::default();
        scheduler.add("p", TimeOfDay::new(hour, minute), AlarmSound::None, true).unwrap();
        let now = DateTime::from_timestamp(secs, 0).unwrap();
        let first = scheduler.evaluate(now).due_fires.len();
        prop_assert!(first <= 1);
        prop_assert!(scheduler.evaluate(now).due_fires.is_empty());
    }
}
