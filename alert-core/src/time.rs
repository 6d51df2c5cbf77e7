//! Wrapping millisecond timestamps.
//!
//! The station clock is a free-running `u32` millisecond counter that wraps
//! roughly every 49.7 days. Every comparison goes through the signed
//! difference of two readings, never a direct `<`, so deadlines that straddle
//! the wrap still order correctly as long as they are less than ~24.8 days
//! apart.

use core::ops::Add;
use core::time::Duration;

/// Reading of the monotonic millisecond clock.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant(u32);

impl Instant {
    /// Timestamp for clock value zero.
    pub const ZERO: Self = Self(0);

    /// Wraps a raw millisecond counter value.
    #[must_use]
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Signed distance in milliseconds from `earlier` to `self`.
    ///
    /// Positive when `self` lies after `earlier` on the wrapping timeline.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn signed_millis_since(self, earlier: Self) -> i32 {
        self.0.wrapping_sub(earlier.0) as i32
    }

    /// Unsigned elapsed time from `earlier` to `self`, modulo the counter width.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn wrapping_duration_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.wrapping_sub(earlier.0) as u64)
    }

    /// Returns `true` once `self` has reached or passed `deadline`.
    #[must_use]
    pub const fn has_reached(self, deadline: Self) -> bool {
        self.signed_millis_since(deadline) >= 0
    }

    /// Time left until `deadline`, or `None` when it has already been reached.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn until(self, deadline: Self) -> Option<Duration> {
        let remaining = deadline.signed_millis_since(self);
        if remaining > 0 {
            Some(Duration::from_millis(remaining as u64))
        } else {
            None
        }
    }

    /// Adds `duration`, wrapping at the counter width.
    #[must_use]
    pub const fn wrapping_add(self, duration: Duration) -> Self {
        Self(self.0.wrapping_add(millis_u32(duration)))
    }
}

impl Add<Duration> for Instant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        self.wrapping_add(rhs)
    }
}

impl From<u32> for Instant {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Clamps a [`Duration`] into the `u32` millisecond domain of the clock.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn millis_u32(duration: Duration) -> u32 {
    let millis = duration.as_millis();
    if millis > u32::MAX as u128 {
        u32::MAX
    } else {
        millis as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_difference_survives_wraparound() {
        let before = Instant::from_millis(u32::MAX - 99);
        let after = before + Duration::from_millis(300);

        assert_eq!(after.as_millis(), 200);
        assert_eq!(after.signed_millis_since(before), 300);
        assert_eq!(before.signed_millis_since(after), -300);
        assert!(after.has_reached(before));
        assert!(!before.has_reached(after));
    }

    #[test]
    fn until_reports_remaining_time_only_before_deadline() {
        let now = Instant::from_millis(u32::MAX - 10);
        let deadline = now + Duration::from_millis(50);

        assert_eq!(now.until(deadline), Some(Duration::from_millis(50)));
        assert_eq!(deadline.until(deadline), None);
        assert_eq!((deadline + Duration::from_millis(1)).until(deadline), None);
    }

    #[test]
    fn wrapping_duration_counts_across_the_wrap() {
        let earlier = Instant::from_millis(u32::MAX);
        let later = Instant::from_millis(9);

        assert_eq!(
            later.wrapping_duration_since(earlier),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn oversized_durations_clamp_to_counter_width() {
        assert_eq!(millis_u32(Duration::from_secs(u64::MAX)), u32::MAX);
        assert_eq!(millis_u32(Duration::from_millis(1_500)), 1_500);
    }
}
