//! Countdown that runs while the user is away.
//!
//! ```text
//!            away = true                 remaining <= warning
//!  Idle ─────────────────► Running ──────────────────────────► Warning
//!   ▲                        │                                   │
//!   │   away = false         │                   remaining = 0   │
//!   └────────────────────────┴───────────── Finished ◄───────────┘
//!   ▲                                          │
//!   └──────────────── away = false ────────────┘
//!
//!  enabled = false from anywhere ──► Disabled (full duration)
//! ```
//!
//! The countdown is decremented by the measured time between tick samples,
//! not by the nominal tick interval, so late or missed ticks neither stall
//! nor speed it up.

use std::time::{Duration, Instant};

pub const DEFAULT_DURATION: Duration = Duration::from_secs(30);
pub const DEFAULT_WARNING_SECONDS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    Disabled,
    Idle,
    Running,
    Warning { seconds_left: u64 },
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownCue {
    Warning { seconds_left: u64 },
    Terminal,
}

#[derive(Debug, Clone)]
pub struct AwayCountdown {
    duration: Duration,
    warning_seconds: u64,
    enabled: bool,
    away: bool,
    finished: bool,
    remaining: Duration,
    last_warned: Option<u64>,
    last_sample: Option<Instant>,
}

impl Default for AwayCountdown {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION, DEFAULT_WARNING_SECONDS)
    }
}

impl AwayCountdown {
    #[must_use]
    pub const fn new(duration: Duration, warning_seconds: u64) -> Self {
        Self {
            duration,
            warning_seconds,
            enabled: true,
            away: false,
            finished: false,
            remaining: duration,
            last_warned: None,
            last_sample: None,
        }
    }

    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub const fn remaining(&self) -> Duration {
        self.remaining
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn is_away(&self) -> bool {
        self.away
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub const fn last_warned(&self) -> Option<u64> {
        self.last_warned
    }

    const fn is_running(&self) -> bool {
        self.enabled && self.away && !self.finished
    }

    /// remaining time in whole seconds, rounded up
    #[must_use]
    pub fn seconds_left(&self) -> u64 {
        let millis = self.remaining.as_millis();
        u64::try_from(millis.div_ceil(1000)).unwrap_or(u64::MAX)
    }

    #[must_use]
    pub fn phase(&self) -> CountdownPhase {
        if !self.enabled {
            return CountdownPhase::Disabled;
        }
        if !self.away {
            return CountdownPhase::Idle;
        }
        if self.finished {
            return CountdownPhase::Finished;
        }
        let seconds_left = self.seconds_left();
        if seconds_left > 0 && seconds_left <= self.warning_seconds {
            CountdownPhase::Warning { seconds_left }
        } else {
            CountdownPhase::Running
        }
    }

    fn reset(&mut self) {
        self.remaining = self.duration;
        self.finished = false;
        self.last_warned = None;
        self.last_sample = None;
    }

    /// Feeds the external presence signal.
    ///
    /// Coming back resets the countdown. Leaving starts it, sampling `now` as
    /// the base of the first decrement.
    pub fn set_away(&mut self, away: bool, now: Instant) {
        if away == self.away {
            return;
        }
        self.away = away;
        if away {
            log::debug!("away, countdown started");
            self.last_sample = Some(now);
        } else {
            log::debug!("back, countdown reset");
            self.reset();
        }
    }

    pub fn set_enabled(&mut self, enabled: bool, now: Instant) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        self.reset();
        if enabled && self.away {
            self.last_sample = Some(now);
        }
    }

    /// Drift-corrected tick: decrements by the time elapsed since the previous
    /// sample.
    pub fn tick(&mut self, now: Instant) -> Vec<CountdownCue> {
        if !self.is_running() {
            self.last_sample = None;
            return Vec::new();
        }
        let delta = self
            .last_sample
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.last_sample = Some(now);
        self.advance(delta)
    }

    /// Decrements by `delta` and reports the cues crossed.
    ///
    /// One warning per whole second inside the warning window, in falling
    /// order, even when a single late delta skips over several of them. One
    /// terminal cue when the countdown reaches zero, which replaces any
    /// warnings skipped on the way there.
    pub fn advance(&mut self, delta: Duration) -> Vec<CountdownCue> {
        if !self.is_running() {
            return Vec::new();
        }
        self.remaining = self.remaining.saturating_sub(delta);

        let seconds_left = self.seconds_left();
        if seconds_left == 0 {
            self.finished = true;
            log::info!("away countdown finished");
            return vec![CountdownCue::Terminal];
        }

        // seconds above the last warned one have already been announced
        let highest = self
            .last_warned
            .map_or(self.warning_seconds, |warned| warned.saturating_sub(1))
            .min(self.warning_seconds);
        if seconds_left > highest {
            return Vec::new();
        }
        self.last_warned = Some(seconds_left);
        (seconds_left..=highest)
            .rev()
            .map(|seconds_left| CountdownCue::Warning { seconds_left })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn away_countdown() -> (AwayCountdown, Instant) {
        let start = Instant::now();
        let mut countdown = AwayCountdown::default();
        countdown.set_away(true, start);
        (countdown, start)
    }

    #[test]
    fn starts_idle_with_full_duration() {
        let countdown = AwayCountdown::default();
        assert_eq!(countdown.phase(), CountdownPhase::Idle);
        assert_eq!(countdown.remaining(), DEFAULT_DURATION);
        assert_eq!(countdown.seconds_left(), 30);
    }

    #[test]
    fn only_runs_while_away() {
        let mut countdown = AwayCountdown::default();
        assert!(countdown.advance(Duration::from_secs(5)).is_empty());
        assert_eq!(countdown.remaining(), DEFAULT_DURATION);
    }

    #[test]
    fn hundred_ms_steps_finish_at_tick_300() {
        let (mut countdown, _) = away_countdown();
        let mut warnings = Vec::new();
        let mut terminal_at = Vec::new();
        for tick in 1..=400 {
            let before = countdown.remaining();
            for cue in countdown.advance(Duration::from_millis(100)) {
                match cue {
                    CountdownCue::Warning { seconds_left } => warnings.push(seconds_left),
                    CountdownCue::Terminal => terminal_at.push(tick),
                }
            }
            assert!(countdown.remaining() <= before);
        }
        assert_eq!(warnings, vec![3, 2, 1]);
        assert_eq!(terminal_at, vec![300]);
        assert_eq!(countdown.phase(), CountdownPhase::Finished);
        assert_eq!(countdown.remaining(), Duration::ZERO);
    }

    #[test]
    fn warning_phase_reports_seconds_left() {
        let (mut countdown, _) = away_countdown();
        countdown.advance(Duration::from_millis(27_500));
        assert_eq!(countdown.phase(), CountdownPhase::Warning { seconds_left: 3 });
        assert_eq!(countdown.last_warned(), Some(3));
    }

    #[test]
    fn coming_back_resets_everything() {
        let (mut countdown, start) = away_countdown();
        countdown.advance(Duration::from_millis(18_000));
        assert_eq!(countdown.remaining(), Duration::from_millis(12_000));

        countdown.set_away(false, start);
        assert_eq!(countdown.remaining(), DEFAULT_DURATION);
        assert!(!countdown.is_finished());
        assert_eq!(countdown.last_warned(), None);
        assert_eq!(countdown.phase(), CountdownPhase::Idle);
    }

    #[test]
    fn finished_latches_until_reset() {
        let (mut countdown, start) = away_countdown();
        assert_eq!(
            countdown.advance(Duration::from_secs(45)),
            vec![CountdownCue::Terminal]
        );
        assert!(countdown.advance(Duration::from_secs(1)).is_empty());
        assert!(countdown.tick(start + Duration::from_secs(60)).is_empty());
        assert!(countdown.is_finished());

        countdown.set_away(false, start);
        countdown.set_away(true, start);
        assert_eq!(countdown.phase(), CountdownPhase::Running);
    }

    #[test]
    fn disabling_forces_full_duration() {
        let (mut countdown, start) = away_countdown();
        countdown.advance(Duration::from_secs(10));
        countdown.set_enabled(false, start);
        assert_eq!(countdown.phase(), CountdownPhase::Disabled);
        assert_eq!(countdown.remaining(), DEFAULT_DURATION);
        assert!(countdown.advance(Duration::from_secs(10)).is_empty());
        assert_eq!(countdown.remaining(), DEFAULT_DURATION);

        // still away, so enabling again starts counting immediately
        countdown.set_enabled(true, start);
        assert_eq!(countdown.phase(), CountdownPhase::Running);
    }

    #[test]
    fn tick_uses_measured_delta_not_nominal_interval() {
        let (mut countdown, start) = away_countdown();
        // one late tick after 2.5s and one on time
        countdown.tick(start + Duration::from_millis(2_500));
        countdown.tick(start + Duration::from_millis(2_600));
        assert_eq!(countdown.remaining(), Duration::from_millis(27_400));
    }

    #[test]
    fn late_ticks_still_warn_for_every_second() {
        let (mut countdown, start) = away_countdown();
        let mut cues = countdown.tick(start + Duration::from_millis(26_999));
        for step in 1..=4 {
            cues.extend(countdown.tick(start + Duration::from_millis(26_999 + step * 1001)));
        }
        assert_eq!(
            cues,
            vec![
                CountdownCue::Warning { seconds_left: 3 },
                CountdownCue::Warning { seconds_left: 2 },
                CountdownCue::Warning { seconds_left: 1 },
                CountdownCue::Terminal,
            ]
        );
    }

    #[test]
    fn uneven_deltas_warn_once_per_second() {
        let (mut countdown, _) = away_countdown();
        let deltas = [26_000, 1_500, 100, 1_700, 50, 10, 600, 39];
        let cues: Vec<_> = deltas
            .into_iter()
            .flat_map(|ms| countdown.advance(Duration::from_millis(ms)))
            .collect();
        assert_eq!(
            cues,
            vec![
                CountdownCue::Warning { seconds_left: 3 },
                CountdownCue::Warning { seconds_left: 2 },
                CountdownCue::Warning { seconds_left: 1 },
            ]
        );
        assert_eq!(countdown.remaining(), Duration::from_millis(1));
        assert_eq!(
            countdown.advance(Duration::from_millis(1)),
            vec![CountdownCue::Terminal]
        );
    }

    #[test]
    fn a_long_stall_jumps_straight_to_terminal() {
        let (mut countdown, start) = away_countdown();
        let cues = countdown.tick(start + Duration::from_secs(31));
        assert_eq!(cues, vec![CountdownCue::Terminal]);
    }
}
