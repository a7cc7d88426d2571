//! Pausable elapsed-time tracker driven by host frame timestamps.
//!
//! Timestamps are offsets from an arbitrary host origin (see
//! `runtime::MonotonicClock`). The timer never schedules anything itself: the
//! host calls [`RoundTimer::tick`] once per frame and reads back the progress.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Expired,
    Cancelled,
}

/// What one tick observed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerReading {
    /// elapsed / duration, clamped to [0,1]
    pub progress: f64,
    /// `ceil(duration - elapsed)`, floored at zero
    pub seconds_remaining: u64,
    /// true only on the tick that first saturated progress
    pub arrived: bool,
}

#[derive(Debug, Clone)]
pub struct RoundTimer {
    duration: Duration,
    elapsed: Duration,
    anchor: Option<Duration>,
    state: TimerState,
}

impl Default for RoundTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundTimer {
    pub fn new() -> Self {
        Self {
            duration: Duration::ZERO,
            elapsed: Duration::ZERO,
            anchor: None,
            state: TimerState::Idle,
        }
    }

    /// Reset to zero progress and start counting from `now`
    pub fn start(&mut self, duration: Duration, now: Duration) {
        self.duration = duration;
        self.elapsed = Duration::ZERO;
        self.anchor = Some(now);
        self.state = TimerState::Running;
    }

    /// Freeze elapsed time at `now`. No-op unless running.
    pub fn pause(&mut self, now: Duration) {
        if self.state != TimerState::Running {
            return;
        }
        self.accumulate(now);
        self.anchor = None;
        self.state = TimerState::Paused;
    }

    /// Re-anchor at `now`; time spent paused is never counted
    pub fn resume(&mut self, now: Duration) {
        if self.state != TimerState::Paused {
            return;
        }
        self.anchor = Some(now);
        self.state = TimerState::Running;
    }

    pub fn cancel(&mut self) {
        self.anchor = None;
        self.state = TimerState::Cancelled;
    }

    pub fn tick(&mut self, now: Duration) -> TimerReading {
        let mut arrived = false;
        if self.state == TimerState::Running {
            self.accumulate(now);
            if self.elapsed >= self.duration {
                self.elapsed = self.duration;
                self.anchor = None;
                self.state = TimerState::Expired;
                arrived = true;
            }
        }
        TimerReading {
            progress: self.progress(),
            seconds_remaining: self.seconds_remaining(),
            arrived,
        }
    }

    fn accumulate(&mut self, now: Duration) {
        if let Some(anchor) = self.anchor {
            // timestamps older than the anchor count as zero elapsed
            self.elapsed += now.saturating_sub(anchor);
            self.anchor = Some(anchor.max(now));
        }
    }

    pub fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return if self.state == TimerState::Idle { 0.0 } else { 1.0 };
        }
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn seconds_remaining(&self) -> u64 {
        self.duration
            .saturating_sub(self.elapsed)
            .as_secs_f64()
            .ceil() as u64
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == TimerState::Paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_progress_follows_elapsed_over_duration() {
        let mut timer = RoundTimer::new();
        timer.start(ms(5000), ms(1000));

        let reading = timer.tick(ms(2000));
        assert!((reading.progress - 0.2).abs() < 1e-9);
        assert_eq!(reading.seconds_remaining, 4);
        assert!(!reading.arrived);

        let reading = timer.tick(ms(3500));
        assert!((reading.progress - 0.5).abs() < 1e-9);
        // ceil(2.5)
        assert_eq!(reading.seconds_remaining, 3);
    }

    #[test]
    fn test_many_small_ticks_match_formula() {
        let mut timer = RoundTimer::new();
        timer.start(ms(3000), Duration::ZERO);

        let mut now = Duration::ZERO;
        for _ in 0..100 {
            now += ms(16);
            timer.tick(now);
        }

        let e = 1.6_f64;
        assert!((timer.progress() - e / 3.0).abs() < 1e-9);
        assert_eq!(timer.seconds_remaining(), (3.0_f64 - e).ceil() as u64);
    }

    #[test]
    fn test_arrival_reported_exactly_once() {
        let mut timer = RoundTimer::new();
        timer.start(ms(1000), Duration::ZERO);

        assert!(!timer.tick(ms(999)).arrived);
        let reading = timer.tick(ms(1200));
        assert!(reading.arrived);
        assert_eq!(reading.progress, 1.0);
        assert_eq!(reading.seconds_remaining, 0);

        for t in [1300, 5000, 9000] {
            let again = timer.tick(ms(t));
            assert!(!again.arrived);
            assert_eq!(again.progress, 1.0);
        }
        assert_eq!(timer.state(), TimerState::Expired);
    }

    #[test]
    fn test_pause_resume_preserves_elapsed() {
        let mut continuous = RoundTimer::new();
        continuous.start(ms(10_000), Duration::ZERO);
        continuous.tick(ms(5000));

        let mut split = RoundTimer::new();
        split.start(ms(10_000), Duration::ZERO);
        split.tick(ms(2000));
        split.pause(ms(2000));
        // wall-clock keeps running while paused
        split.tick(ms(60_000));
        split.resume(ms(60_000));
        split.tick(ms(63_000));

        assert_eq!(split.elapsed(), continuous.elapsed());
        assert_eq!(split.progress(), continuous.progress());
    }

    #[test]
    fn test_pause_mid_frame_counts_up_to_pause() {
        let mut timer = RoundTimer::new();
        timer.start(ms(4000), Duration::ZERO);
        timer.tick(ms(1000));
        timer.pause(ms(1500));

        assert_eq!(timer.elapsed(), ms(1500));
        assert!(timer.is_paused());
    }

    #[test]
    fn test_double_toggle_returns_to_prior_progress() {
        let mut timer = RoundTimer::new();
        timer.start(ms(4000), Duration::ZERO);
        timer.tick(ms(1000));
        let before = timer.progress();

        timer.pause(ms(1000));
        timer.pause(ms(1500));
        timer.resume(ms(3000));
        timer.resume(ms(3500));

        assert_eq!(timer.tick(ms(3000)).progress, before);
    }

    #[test]
    fn test_backwards_timestamp_is_zero_elapsed() {
        let mut timer = RoundTimer::new();
        timer.start(ms(4000), ms(1000));
        timer.tick(ms(2000));

        let reading = timer.tick(ms(500));
        assert!((reading.progress - 0.25).abs() < 1e-9);

        // the anchor does not move backwards either
        timer.tick(ms(2500));
        assert_eq!(timer.elapsed(), ms(1500));
    }

    #[test]
    fn test_cancel_stops_accumulation() {
        let mut timer = RoundTimer::new();
        timer.start(ms(4000), Duration::ZERO);
        timer.tick(ms(1000));
        timer.cancel();

        let reading = timer.tick(ms(9000));
        assert!(!reading.arrived);
        assert_eq!(timer.elapsed(), ms(1000));
        assert_eq!(timer.state(), TimerState::Cancelled);
    }

    #[test]
    fn test_zero_duration_arrives_on_first_tick() {
        let mut timer = RoundTimer::new();
        timer.start(Duration::ZERO, Duration::ZERO);

        assert!(timer.tick(Duration::ZERO).arrived);
    }

    #[test]
    fn test_start_resets_previous_round() {
        let mut timer = RoundTimer::new();
        timer.start(ms(1000), Duration::ZERO);
        timer.tick(ms(2000));

        timer.start(ms(1000), ms(2000));
        assert_eq!(timer.progress(), 0.0);
        assert!(timer.is_running());
    }
}
