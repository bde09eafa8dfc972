use time::{Duration, OffsetDateTime};
use tokio::time::Instant;

/// Seconds shown on the countdown when an attempt is loaded.
///
/// The end time is the server `end_time`, else `start_time + duration`, else `now` plus the
/// duration (or the fallback). A non-positive result resets the display to the full
/// duration; the server still decides the real expiry.
pub(crate) fn initial_remaining_seconds(
    start_time: Option<OffsetDateTime>,
    end_time: Option<OffsetDateTime>,
    duration_minutes: Option<u32>,
    fallback_minutes: u32,
    now: OffsetDateTime,
) -> u64 {
    let full_minutes = duration_minutes.filter(|minutes| *minutes > 0).unwrap_or(fallback_minutes);
    let full = Duration::minutes(i64::from(full_minutes));

    let end = match (end_time, start_time, duration_minutes) {
        (Some(end), _, _) => end,
        (None, Some(start), Some(minutes)) if minutes > 0 => {
            start + Duration::minutes(i64::from(minutes))
        }
        _ => now + full,
    };

    let remaining = (end - now).whole_seconds();
    if remaining <= 0 {
        full.whole_seconds().max(0) as u64
    } else {
        remaining as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Running(u64),
    /// Emitted exactly once, on the tick that reaches zero.
    Expired,
    Stopped,
}

#[derive(Debug, Clone)]
pub(crate) struct Countdown {
    remaining: u64,
    expired: bool,
}

impl Countdown {
    pub(crate) fn new(remaining: u64) -> Self {
        Self { remaining, expired: remaining == 0 }
    }

    pub(crate) fn remaining(&self) -> u64 {
        self.remaining
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    pub(crate) fn tick(&mut self) -> TickOutcome {
        if self.expired {
            return TickOutcome::Stopped;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            return TickOutcome::Expired;
        }
        TickOutcome::Running(self.remaining)
    }
}

/// Monotonic time actually spent, independent of the countdown display.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ElapsedClock {
    started: Instant,
}

impl ElapsedClock {
    pub(crate) fn start() -> Self {
        Self { started: Instant::now() }
    }

    pub(crate) fn elapsed_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-06-01 12:00:00 UTC);

    #[test]
    fn server_end_time_wins() {
        let remaining = initial_remaining_seconds(
            Some(NOW - Duration::minutes(5)),
            Some(NOW + Duration::minutes(10)),
            Some(60),
            60,
            NOW,
        );
        assert_eq!(remaining, 600);
    }

    #[test]
    fn start_plus_duration_is_used_without_end_time() {
        let remaining =
            initial_remaining_seconds(Some(NOW - Duration::minutes(15)), None, Some(45), 60, NOW);
        assert_eq!(remaining, 30 * 60);
    }

    #[test]
    fn fallback_applies_without_timing_data() {
        assert_eq!(initial_remaining_seconds(None, None, None, 60, NOW), 3600);
        assert_eq!(initial_remaining_seconds(None, None, Some(20), 60, NOW), 1200);
    }

    #[test]
    fn stale_attempt_resets_to_full_duration() {
        let remaining =
            initial_remaining_seconds(Some(NOW - Duration::minutes(61)), None, Some(60), 60, NOW);
        assert_eq!(remaining, 3600);
    }

    #[test]
    fn past_end_time_resets_to_fallback_when_duration_missing() {
        let remaining =
            initial_remaining_seconds(None, Some(NOW - Duration::seconds(1)), None, 60, NOW);
        assert_eq!(remaining, 3600);
    }

    #[test]
    fn countdown_expires_exactly_once_and_never_goes_negative() {
        let mut countdown = Countdown::new(2);
        assert_eq!(countdown.tick(), TickOutcome::Running(1));
        assert_eq!(countdown.tick(), TickOutcome::Expired);
        assert_eq!(countdown.tick(), TickOutcome::Stopped);
        assert_eq!(countdown.tick(), TickOutcome::Stopped);
        assert_eq!(countdown.remaining(), 0);
        assert!(countdown.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_clock_follows_monotonic_time() {
        let clock = ElapsedClock::start();
        tokio::time::advance(std::time::Duration::from_secs(95)).await;
        assert_eq!(clock.elapsed_seconds(), 95);
    }
}
