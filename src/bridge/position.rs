//! Position extrapolation between polls.
//!
//! LMS reports the elapsed time only when polled. Between polls the exported
//! position is derived from the last authoritative value and the instant it
//! was anchored, so readers see a smoothly advancing position without any
//! drift accumulating from repeated rounding.

use tokio::time::Instant;

use crate::data::PlaybackStatus;

pub const MICROSECONDS_PER_SECOND: i64 = 1_000_000;

/// The target player has no variable-rate transport
pub const DEFAULT_RATE: f64 = 1.0;

/// Convert LMS seconds to MPRIS microseconds, rounding down
pub fn seconds_to_micros(seconds: f64) -> i64 {
    (seconds * MICROSECONDS_PER_SECOND as f64).floor() as i64
}

/// Convert MPRIS microseconds to LMS seconds
pub fn micros_to_seconds(micros: i64) -> f64 {
    micros as f64 / MICROSECONDS_PER_SECOND as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionClock {
    /// Authoritative position at `anchor`, in microseconds
    stored_us: i64,
    /// When `stored_us` was last set or collapsed; `None` until the first update
    anchor: Option<Instant>,
    rate: f64,
}

impl PositionClock {
    pub fn new() -> Self {
        Self {
            stored_us: 0,
            anchor: None,
            rate: DEFAULT_RATE,
        }
    }

    /// Position at `now`. Only advances while `status` is playing.
    pub fn extrapolate(&self, status: PlaybackStatus, now: Instant) -> i64 {
        if status != PlaybackStatus::Playing {
            return self.stored_us;
        }
        let anchor = match self.anchor {
            Some(anchor) => anchor,
            None => return self.stored_us,
        };
        let elapsed_us = now.saturating_duration_since(anchor).as_micros() as f64;
        let advanced = (elapsed_us * self.rate).floor() as i64;
        self.stored_us.saturating_add(advanced).max(0)
    }

    /// Fold the extrapolated progress into the stored position and re-anchor at `now`.
    ///
    /// Must be called with the status that was in effect up to `now`, before a
    /// status or rate change takes effect.
    pub fn reanchor(&mut self, status: PlaybackStatus, now: Instant) {
        self.stored_us = self.extrapolate(status, now);
        self.anchor = Some(now);
    }

    /// Replace the position with an authoritative value measured at `now`
    pub fn set_position(&mut self, position_us: i64, now: Instant) {
        self.stored_us = position_us.max(0);
        self.anchor = Some(now);
    }

    /// Change the playback rate without a visible jump in position
    pub fn set_rate(&mut self, rate: f64, status: PlaybackStatus, now: Instant) {
        self.reanchor(status, now);
        self.rate = rate;
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Stored position without extrapolation
    pub fn stored(&self) -> i64 {
        self.stored_us
    }
}

impl Default for PositionClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_extrapolates_while_playing() {
        let t0 = Instant::now();
        let mut clock = PositionClock::new();
        clock.set_position(10_000_000, t0);

        let later = t0 + Duration::from_secs(5);
        assert_eq!(clock.extrapolate(PlaybackStatus::Playing, later), 15_000_000);
    }

    #[test]
    fn test_frozen_unless_playing() {
        let t0 = Instant::now();
        let mut clock = PositionClock::new();
        clock.set_position(3_000_000, t0);

        let later = t0 + Duration::from_secs(60);
        assert_eq!(clock.extrapolate(PlaybackStatus::Paused, later), 3_000_000);
        assert_eq!(clock.extrapolate(PlaybackStatus::Stopped, later), 3_000_000);
    }

    #[test]
    fn test_reanchor_has_no_discontinuity() {
        let t0 = Instant::now();
        let mut clock = PositionClock::new();
        clock.set_position(1_000_000, t0);

        // Playing for 2s, then paused: the position freezes where it was
        let t1 = t0 + Duration::from_secs(2);
        let before = clock.extrapolate(PlaybackStatus::Playing, t1);
        clock.reanchor(PlaybackStatus::Playing, t1);
        assert_eq!(clock.stored(), before);
        assert_eq!(clock.extrapolate(PlaybackStatus::Paused, t1 + Duration::from_secs(10)), 3_000_000);

        // Resuming continues from the frozen value
        let t2 = t1 + Duration::from_secs(10);
        clock.reanchor(PlaybackStatus::Paused, t2);
        assert_eq!(clock.extrapolate(PlaybackStatus::Playing, t2 + Duration::from_millis(500)), 3_500_000);
    }

    #[test]
    fn test_rate_change_keeps_position() {
        let t0 = Instant::now();
        let mut clock = PositionClock::new();
        clock.set_position(0, t0);

        let t1 = t0 + Duration::from_secs(4);
        clock.set_rate(0.5, PlaybackStatus::Playing, t1);
        assert_eq!(clock.stored(), 4_000_000);
        assert_eq!(clock.extrapolate(PlaybackStatus::Playing, t1 + Duration::from_secs(2)), 5_000_000);
        assert_eq!(clock.rate(), 0.5);
    }

    #[test]
    fn test_never_negative() {
        let t0 = Instant::now();
        let mut clock = PositionClock::new();
        clock.set_position(-42, t0);
        assert_eq!(clock.stored(), 0);
        assert_eq!(clock.extrapolate(PlaybackStatus::Playing, t0), 0);
    }

    #[test]
    fn test_unanchored_clock_does_not_advance() {
        let clock = PositionClock::new();
        assert_eq!(clock.extrapolate(PlaybackStatus::Playing, Instant::now()), 0);
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(seconds_to_micros(1.5), 1_500_000);
        assert_eq!(seconds_to_micros(0.0000015), 1);
        assert_eq!(micros_to_seconds(2_500_000), 2.5);
    }
}
